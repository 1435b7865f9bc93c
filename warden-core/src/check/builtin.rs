use twilight_model::guild::Permissions;
use twilight_model::id::Id;
use twilight_model::id::marker::{RoleMarker, UserMarker};

use super::Check;

pub fn guild_only() -> Check {
    Check::from_fn("guild_only", |ctxt| ctxt.guild_id().is_some()).allow_dm(false)
}

pub fn dm_only() -> Check {
    Check::from_fn("dm_only", |ctxt| ctxt.guild_id().is_none())
}

/// Passes for the given user IDs only, typically `dev.owner_ids` from the config.
pub fn owner_only(owners: impl IntoIterator<Item = u64>) -> Check {
    let owners = owners
        .into_iter()
        .filter_map(Id::<UserMarker>::new_checked)
        .collect::<Vec<_>>();

    Check::from_fn("owner_only", move |ctxt| owners.contains(&ctxt.author_id()))
}

/// Passes if the invoking member holds every one of `permissions`. Always fails outside guilds.
pub fn has_permissions(permissions: Permissions) -> Check {
    Check::from_fn("has_permissions", move |ctxt| {
        ctxt.member().is_some_and(|member| {
            member.permissions.contains(Permissions::ADMINISTRATOR) || member.permissions.contains(permissions)
        })
    })
    .require_permissions(permissions)
    .allow_dm(false)
}

/// Passes if the invoking member holds at least one of `roles`. Always fails outside guilds.
pub fn has_any_role(roles: Vec<Id<RoleMarker>>) -> Check {
    Check::from_fn("has_any_role", move |ctxt| {
        ctxt.member().is_some_and(|member| roles.iter().any(|&role| member.has_role(role)))
    })
    .allow_dm(false)
}

pub fn age_restricted_channel() -> Check {
    Check::from_fn("age_restricted_channel", |ctxt| ctxt.origin.channel_age_restricted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MemberData, RoleData};
    use crate::testing::{context, origin};

    fn member(permissions: Permissions, roles: &[u64]) -> MemberData {
        MemberData {
            roles: roles
                .iter()
                .map(|&id| RoleData {
                    id: Id::new(id),
                    position: 1,
                })
                .collect(),
            permissions,
        }
    }

    #[tokio::test]
    async fn guild_and_dm_checks() {
        let dm = context(origin());
        let guild = context(origin().in_guild(Id::new(9), member(Permissions::empty(), &[])));

        assert!(!guild_only().passes(&dm).await);
        assert!(guild_only().passes(&guild).await);
        assert!(dm_only().passes(&dm).await);
        assert!(!dm_only().passes(&guild).await);
        assert!(!guild_only().allows_dm());
    }

    #[tokio::test]
    async fn owners_only() {
        let ctxt = context(origin());
        let author = ctxt.author_id().get();

        assert!(owner_only([author]).passes(&ctxt).await);
        assert!(!owner_only([author + 1, 0]).passes(&ctxt).await);
    }

    #[tokio::test]
    async fn permissions_and_roles() {
        let moderator = context(origin().in_guild(Id::new(9), member(Permissions::KICK_MEMBERS, &[5, 6])));
        let admin = context(origin().in_guild(Id::new(9), member(Permissions::ADMINISTRATOR, &[])));
        let dm = context(origin());

        let kick = has_permissions(Permissions::KICK_MEMBERS);
        assert!(kick.passes(&moderator).await);
        assert!(kick.passes(&admin).await);
        assert!(!kick.passes(&dm).await);
        assert_eq!(kick.required_permissions(), Some(Permissions::KICK_MEMBERS));
        assert!(!has_permissions(Permissions::BAN_MEMBERS).passes(&moderator).await);

        assert!(has_any_role(vec![Id::new(6), Id::new(7)]).passes(&moderator).await);
        assert!(!has_any_role(vec![Id::new(7)]).passes(&moderator).await);
        assert!(!has_any_role(vec![Id::new(6)]).passes(&dm).await);
    }

    #[tokio::test]
    async fn age_restriction() {
        assert!(!age_restricted_channel().passes(&context(origin())).await);
        assert!(
            age_restricted_channel()
                .passes(&context(origin().age_restricted(true)))
                .await
        );
    }
}
