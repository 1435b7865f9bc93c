//! Sliding-window rate limiting, exposed as a [`Check`].
//!
//! Every bucket key gets a window that starts at its first use and lasts `duration`. Within a
//! window at most `tokens` invocations go ahead. Entries live in two generations: when a
//! generation is older than `duration`, the current map becomes the previous one and a fresh map
//! is started. Entries still inside their window keep counting from the previous generation, and
//! anything older than that is dropped wholesale. Memory is therefore bounded by the keys seen in
//! roughly the last two windows.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bitflags::bitflags;
use tokio::time::Instant;

use crate::check::{Check, Hook, Predicate};
use crate::context::{InvocationContext, Origin};

bitflags! {
    /// Dimensions that partition the rate limit. Combined dimensions are keyed in the order they
    /// are declared here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BucketType: u8 {
        /// The channel's category, or the channel itself if it has none.
        const CATEGORY = 1 << 0;
        const CHANNEL = 1 << 1;
        const COMMAND = 1 << 2;
        const GLOBAL = 1 << 3;
        /// The guild, or the channel outside guilds.
        const GUILD = 1 << 4;
        /// The member's highest role. See [`role_dimension`].
        const ROLE = 1 << 5;
        const USER = 1 << 6;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BucketKey(u64);

#[derive(Clone, Copy, Debug)]
struct Entry {
    window_start: Instant,
    count: u32,
}

#[derive(Debug)]
struct Generations {
    started: Instant,
    current: HashMap<BucketKey, Entry>,
    previous: HashMap<BucketKey, Entry>,
}

impl Generations {
    fn roll(&mut self, now: Instant, duration: Duration) {
        if now > self.started + duration {
            self.previous = std::mem::take(&mut self.current);
            self.started = now;
        }
    }
}

#[derive(Debug)]
pub struct Cooldown {
    buckets: BucketType,
    duration: Duration,
    tokens: u32,
    generations: Mutex<Generations>,
}

impl Cooldown {
    /// A cooldown allowing one invocation per `duration` in each bucket.
    pub fn new(buckets: BucketType, duration: Duration) -> Self {
        Self {
            buckets,
            duration,
            tokens: 1,
            generations: Mutex::new(Generations {
                started: Instant::now(),
                current: HashMap::new(),
                previous: HashMap::new(),
            }),
        }
    }

    /// Invocations allowed per window. At least one.
    pub fn tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens.max(1);
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self, entry: &Entry, now: Instant) -> bool {
        entry.window_start + self.duration > now
    }

    /// The bucket an invocation falls into.
    pub fn key(&self, ctxt: &InvocationContext) -> BucketKey {
        let origin = &ctxt.origin;
        let mut hasher = DefaultHasher::new();
        let mut dimension = |tag: BucketType, value: u64| {
            if self.buckets.contains(tag) {
                hasher.write_u8(tag.bits());
                hasher.write_u64(value);
            }
        };

        dimension(
            BucketType::CATEGORY,
            origin.category_id.unwrap_or(origin.channel_id).get(),
        );
        dimension(BucketType::CHANNEL, origin.channel_id.get());
        dimension(BucketType::COMMAND, command_dimension(ctxt.command.qualified_name()));
        dimension(BucketType::GLOBAL, 0);
        dimension(
            BucketType::GUILD,
            origin.guild_id.map_or(origin.channel_id.get(), |id| id.get()),
        );
        dimension(BucketType::ROLE, role_dimension(origin));
        dimension(BucketType::USER, origin.author_id.get());

        BucketKey(hasher.finish())
    }

    pub fn is_ready(&self, ctxt: &InvocationContext) -> bool {
        self.is_ready_key(self.key(ctxt))
    }

    pub fn consume(&self, ctxt: &InvocationContext) {
        self.consume_key(self.key(ctxt));
    }

    pub fn remaining(&self, ctxt: &InvocationContext) -> Duration {
        self.remaining_key(self.key(ctxt))
    }

    pub fn is_ready_key(&self, key: BucketKey) -> bool {
        let now = Instant::now();
        let mut generations = self.generations();
        generations.roll(now, self.duration);

        if let Some(entry) = generations.current.get(&key) {
            return entry.count < self.tokens;
        }

        match generations.previous.get(&key) {
            Some(entry) => !self.is_active(entry, now) || entry.count < self.tokens,
            None => true,
        }
    }

    /// Records one invocation against `key`.
    pub fn consume_key(&self, key: BucketKey) {
        let now = Instant::now();
        let mut generations = self.generations();
        generations.roll(now, self.duration);

        if let Some(entry) = generations.previous.get_mut(&key)
            && entry.window_start + self.duration > now
        {
            entry.count += 1;
        } else if let Some(entry) = generations.current.get_mut(&key) {
            entry.count += 1;
        } else {
            generations.current.insert(key, Entry {
                window_start: now,
                count: 1,
            });
        }
    }

    /// How long until `key` is ready again. Zero if it already is.
    pub fn remaining_key(&self, key: BucketKey) -> Duration {
        let now = Instant::now();
        let mut generations = self.generations();
        generations.roll(now, self.duration);

        [generations.current.get(&key), generations.previous.get(&key)]
            .into_iter()
            .flatten()
            .filter(|entry| self.is_active(entry, now) && entry.count >= self.tokens)
            .map(|entry| (entry.window_start + self.duration).saturating_duration_since(now))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// A check that passes while the bucket has tokens left and consumes one when the command
    /// goes ahead.
    pub fn into_check(self) -> Check {
        let cooldown = Arc::new(self);
        Check::from_predicate("cooldown", cooldown.clone()).with_pre_call(cooldown)
    }
}

fn command_dimension(qualified_name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(qualified_name.as_bytes());
    hasher.finish()
}

/// The member's highest role. Members without roles fall back to the guild ID, which is also the
/// ID of the implicit `@everyone` role. Outside guilds the channel stands in.
fn role_dimension(origin: &Origin) -> u64 {
    origin
        .member
        .as_ref()
        .and_then(|member| member.highest_role())
        .map(|role| role.id.get())
        .or(origin.guild_id.map(|id| id.get()))
        .unwrap_or(origin.channel_id.get())
}

#[async_trait]
impl Predicate for Cooldown {
    async fn test(&self, ctxt: &InvocationContext) -> anyhow::Result<bool> {
        Ok(self.is_ready(ctxt))
    }

    fn failure_reason(&self, ctxt: &InvocationContext) -> Option<String> {
        let remaining = self.remaining(ctxt);
        Some(format!(
            "This command is on cooldown. Try again in {:.1} seconds.",
            remaining.as_secs_f64()
        ))
    }
}

#[async_trait]
impl Hook for Cooldown {
    async fn call(&self, ctxt: &InvocationContext) -> anyhow::Result<()> {
        self.consume(ctxt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;
    use twilight_model::guild::Permissions;
    use twilight_model::id::Id;

    use super::*;
    use crate::context::{MemberData, RoleData};
    use crate::testing::{context, origin};

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_after_the_window() {
        let cooldown = Cooldown::new(BucketType::USER, MINUTE).tokens(2);
        let key = cooldown.key(&context(origin()));

        assert!(cooldown.is_ready_key(key));
        cooldown.consume_key(key);

        advance(Duration::from_secs(10)).await;
        assert!(cooldown.is_ready_key(key));
        cooldown.consume_key(key);

        advance(Duration::from_secs(10)).await;
        assert!(!cooldown.is_ready_key(key));
        assert_eq!(cooldown.remaining_key(key), Duration::from_secs(40));

        advance(Duration::from_secs(41)).await;
        assert!(cooldown.is_ready_key(key));
        assert_eq!(cooldown.remaining_key(key), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn windows_survive_a_generation_rollover() {
        let cooldown = Cooldown::new(BucketType::USER, MINUTE);
        let key = cooldown.key(&context(origin()));

        advance(Duration::from_secs(50)).await;
        cooldown.consume_key(key);

        // the generation rolls over here, but the window opened at 50s is still running
        advance(Duration::from_secs(20)).await;
        assert!(!cooldown.is_ready_key(key));
        assert_eq!(cooldown.remaining_key(key), Duration::from_secs(40));

        advance(Duration::from_secs(41)).await;
        assert!(cooldown.is_ready_key(key));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_previous_entries_restart_in_the_current_generation() {
        let cooldown = Cooldown::new(BucketType::USER, MINUTE);
        let key = cooldown.key(&context(origin()));

        cooldown.consume_key(key);
        advance(Duration::from_secs(61)).await;
        assert!(cooldown.is_ready_key(key));

        cooldown.consume_key(key);
        assert!(!cooldown.is_ready_key(key));
        assert_eq!(cooldown.remaining_key(key), MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn check_consumes_through_its_hook() {
        let check = Cooldown::new(BucketType::USER, MINUTE).into_check();
        let ctxt = context(origin());

        let result = check.evaluate(&ctxt).await;
        assert!(result.passed());
        result.fire_pre_call(&ctxt).await.unwrap();

        assert!(!check.passes(&ctxt).await);
        assert_eq!(
            check.failure_reason(&ctxt).as_deref(),
            Some("This command is on cooldown. Try again in 60.0 seconds.")
        );
    }

    #[test]
    fn keys_follow_the_selected_dimensions() {
        let mut other_channel = origin();
        other_channel.channel_id = Id::new(999);
        let mut other_user = origin();
        other_user.author_id = Id::new(998);

        let (base, other_channel, other_user) = (context(origin()), context(other_channel), context(other_user));

        let per_user = Cooldown::new(BucketType::USER, MINUTE);
        assert_eq!(per_user.key(&base), per_user.key(&other_channel));
        assert_ne!(per_user.key(&base), per_user.key(&other_user));

        let per_channel_user = Cooldown::new(BucketType::CHANNEL | BucketType::USER, MINUTE);
        assert_ne!(per_channel_user.key(&base), per_channel_user.key(&other_channel));
        assert_ne!(per_channel_user.key(&base), per_channel_user.key(&other_user));

        let global = Cooldown::new(BucketType::GLOBAL, MINUTE);
        assert_eq!(global.key(&base), global.key(&other_user));
    }

    #[test]
    fn dimensions_are_tagged() {
        let mut same_ids = origin();
        same_ids.channel_id = Id::new(5);
        same_ids.author_id = Id::new(5);
        let ctxt = context(same_ids);

        let by_channel = Cooldown::new(BucketType::CHANNEL, MINUTE);
        let by_user = Cooldown::new(BucketType::USER, MINUTE);
        assert_ne!(by_channel.key(&ctxt), by_user.key(&ctxt));
    }

    #[test]
    fn role_dimension_falls_back() {
        let member = |roles: Vec<RoleData>| MemberData {
            roles,
            permissions: Permissions::empty(),
        };

        let dm = origin();
        assert_eq!(role_dimension(&dm), dm.channel_id.get());

        let bare = origin().in_guild(Id::new(77), member(vec![]));
        assert_eq!(role_dimension(&bare), 77);

        let ranked = origin().in_guild(
            Id::new(77),
            member(vec![
                RoleData { id: Id::new(1), position: 1 },
                RoleData { id: Id::new(2), position: 4 },
            ]),
        );
        assert_eq!(role_dimension(&ranked), 2);
    }
}
