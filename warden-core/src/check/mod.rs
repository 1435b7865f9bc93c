//! Composable predicates that gate command execution.
//!
//! A [`Check`] is either a leaf wrapping a [`Predicate`] or one of three combinators: [`Check::any`],
//! [`Check::all`] and [`Check::deny`]. Every check carries optional metadata (whether it may run in
//! DMs, which permissions it requires) that combinators derive from their children, and pre-call
//! and post-call [`Hook`]s that fire around the command body when the whole check passes.
//!
//! Evaluation never mutates a check. It produces a [`CheckResult`] naming the checks whose hooks
//! belong to this particular invocation, so concurrent invocations sharing one check stay
//! independent.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, warn};
use twilight_model::guild::Permissions;

use crate::command::errors::CommandRegistrationError;
use crate::context::InvocationContext;

pub mod builtin;

#[async_trait]
pub trait Predicate: Send + Sync {
    /// An `Err` counts as a failure.
    async fn test(&self, ctxt: &InvocationContext) -> anyhow::Result<bool>;

    /// Optional explanation for the invoking user, e.g. how long a cooldown has left.
    fn failure_reason(&self, _ctxt: &InvocationContext) -> Option<String> {
        None
    }
}

#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctxt: &InvocationContext) -> anyhow::Result<()>;
}

pub type HookRef = Arc<dyn Hook>;

struct FnPredicate<F>(F);

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&InvocationContext) -> bool + Send + Sync,
{
    async fn test(&self, ctxt: &InvocationContext) -> anyhow::Result<bool> {
        Ok((self.0)(ctxt))
    }
}

struct FnHook<F>(F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&InvocationContext) + Send + Sync,
{
    async fn call(&self, ctxt: &InvocationContext) -> anyhow::Result<()> {
        (self.0)(ctxt);
        Ok(())
    }
}

/// Wraps a synchronous closure as a hook.
pub fn hook_fn<F>(f: F) -> HookRef
where
    F: Fn(&InvocationContext) + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

#[derive(Clone)]
pub enum CheckKind {
    Leaf(Arc<dyn Predicate>),
    /// Passes if at least one child passes. Children run concurrently and the first success wins.
    /// Children still pending at that point are dropped, so a predicate must not rely on running
    /// to completion.
    Any(Vec<Check>),
    /// Passes if every child passes. Children run in order and the first failure short-circuits.
    All(Vec<Check>),
    /// Passes if the child fails.
    Deny(Box<Check>),
}

#[derive(Clone)]
pub struct Check {
    name: String,
    kind: CheckKind,
    dm_allowed: Option<bool>,
    required_permissions: Option<Permissions>,
    pre_call: Vec<HookRef>,
    post_call: Vec<HookRef>,
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            CheckKind::Leaf(_) => "leaf",
            CheckKind::Any(_) => "any",
            CheckKind::All(_) => "all",
            CheckKind::Deny(_) => "deny",
        };

        f.debug_struct("Check")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("allows_dm", &self.allows_dm())
            .field("required_permissions", &self.required_permissions())
            .finish_non_exhaustive()
    }
}

impl Check {
    fn with_kind(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            kind,
            dm_allowed: None,
            required_permissions: None,
            pre_call: Vec::new(),
            post_call: Vec::new(),
        }
    }

    pub fn new(name: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        Self::from_predicate(name, Arc::new(predicate))
    }

    pub fn from_predicate(name: impl Into<String>, predicate: Arc<dyn Predicate>) -> Self {
        Self::with_kind(name, CheckKind::Leaf(predicate))
    }

    /// A leaf check from a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&InvocationContext) -> bool + Send + Sync + 'static,
    {
        Self::new(name, FnPredicate(f))
    }

    pub fn any(checks: Vec<Check>) -> Result<Self, CommandRegistrationError> {
        if checks.is_empty() {
            return Err(CommandRegistrationError::EmptyCombinator("any"));
        }

        let name = format!("any({})", join_names(&checks));
        Ok(Self::with_kind(name, CheckKind::Any(checks)))
    }

    pub fn all(checks: Vec<Check>) -> Result<Self, CommandRegistrationError> {
        if checks.is_empty() {
            return Err(CommandRegistrationError::EmptyCombinator("all"));
        }

        let name = format!("all({})", join_names(&checks));
        Ok(Self::with_kind(name, CheckKind::All(checks)))
    }

    pub fn deny(check: Check) -> Self {
        let name = format!("deny({})", check.name);
        Self::with_kind(name, CheckKind::Deny(Box::new(check)))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides whether this check may run in DMs. Combinators otherwise derive it from their
    /// children.
    pub fn allow_dm(mut self, allowed: bool) -> Self {
        self.dm_allowed = Some(allowed);
        self
    }

    /// Overrides the permissions this check requires. Combinators otherwise derive them from
    /// their children.
    pub fn require_permissions(mut self, permissions: Permissions) -> Self {
        self.required_permissions = Some(permissions);
        self
    }

    pub fn with_pre_call(mut self, hook: HookRef) -> Self {
        self.pre_call.push(hook);
        self
    }

    pub fn with_post_call(mut self, hook: HookRef) -> Self {
        self.post_call.push(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    /// Whether the command may be offered in DMs. Unset leaves default to `true`.
    ///
    /// `any` allows DMs if some child does, `all` only if every child does. `deny` exports no
    /// metadata, since the inverse of a requirement is not a requirement.
    pub fn allows_dm(&self) -> bool {
        if let Some(allowed) = self.dm_allowed {
            return allowed;
        }

        match &self.kind {
            CheckKind::Leaf(_) | CheckKind::Deny(_) => true,
            CheckKind::Any(children) => children.iter().any(Check::allows_dm),
            CheckKind::All(children) => children.iter().all(Check::allows_dm),
        }
    }

    /// The permissions the command should require up front, if any.
    ///
    /// `any` takes the union of its children and `all` the intersection. Either yields `None` as
    /// soon as one child declares no permissions.
    pub fn required_permissions(&self) -> Option<Permissions> {
        if let Some(permissions) = self.required_permissions {
            return Some(permissions);
        }

        match &self.kind {
            CheckKind::Leaf(_) | CheckKind::Deny(_) => None,
            CheckKind::Any(children) => children
                .iter()
                .map(Check::required_permissions)
                .try_fold(Permissions::empty(), |acc, p| Some(acc | p?)),
            CheckKind::All(children) => children
                .iter()
                .map(Check::required_permissions)
                .try_fold(Permissions::all(), |acc, p| Some(acc & p?)),
        }
    }

    /// A user facing reason for a failure, from the leaf predicate if there is one.
    pub fn failure_reason(&self, ctxt: &InvocationContext) -> Option<String> {
        match &self.kind {
            CheckKind::Leaf(predicate) => predicate.failure_reason(ctxt),
            _ => None,
        }
    }

    /// All checks in this subtree, outermost first.
    fn subtree(&self) -> Vec<&Check> {
        let mut nodes = vec![self];
        match &self.kind {
            CheckKind::Leaf(_) => {},
            CheckKind::Any(children) | CheckKind::All(children) => {
                nodes.extend(children.iter().flat_map(Check::subtree));
            },
            CheckKind::Deny(child) => nodes.extend(child.subtree()),
        }
        nodes
    }

    pub async fn passes(&self, ctxt: &InvocationContext) -> bool {
        self.evaluate(ctxt).await.passed()
    }

    /// Evaluates the check for one invocation.
    ///
    /// The result records which checks' hooks should fire if the invocation goes ahead: a leaf
    /// contributes itself; `any` contributes itself and the child that satisfied it; `all`
    /// contributes itself and every child; `deny` contributes itself and its child's whole
    /// subtree.
    pub fn evaluate<'c>(&'c self, ctxt: &'c InvocationContext) -> BoxFuture<'c, CheckResult<'c>> {
        Box::pin(async move {
            match &self.kind {
                CheckKind::Leaf(predicate) => {
                    let passed = match predicate.test(ctxt).await {
                        Ok(passed) => passed,
                        Err(e) => {
                            debug!("check '{}' errored, treating as failed: {e:#}", self.name);
                            false
                        },
                    };

                    CheckResult::new(passed, None, vec![self])
                },
                CheckKind::Any(children) => {
                    let mut pending = children
                        .iter()
                        .map(|child| async move { (child, child.evaluate(ctxt).await) })
                        .collect::<FuturesUnordered<_>>();

                    while let Some((child, result)) = pending.next().await {
                        if result.passed {
                            let mut hooks = vec![self];
                            hooks.extend(result.hooks);
                            return CheckResult::new(true, Some(child), hooks);
                        }
                    }

                    CheckResult::new(false, None, vec![self])
                },
                CheckKind::All(children) => {
                    let mut hooks = vec![self];
                    for child in children {
                        let result = child.evaluate(ctxt).await;
                        if !result.passed {
                            return CheckResult::new(false, None, hooks);
                        }
                        hooks.extend(result.hooks);
                    }

                    CheckResult::new(true, None, hooks)
                },
                CheckKind::Deny(child) => {
                    let result = child.evaluate(ctxt).await;
                    let mut hooks = vec![self];
                    hooks.extend(child.subtree());

                    CheckResult::new(!result.passed, None, hooks)
                },
            }
        })
    }
}

fn join_names(checks: &[Check]) -> String {
    checks.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// The outcome of evaluating a [`Check`] for one invocation.
#[derive(Debug)]
pub struct CheckResult<'c> {
    passed: bool,
    matched: Option<&'c Check>,
    hooks: Vec<&'c Check>,
}

impl<'c> CheckResult<'c> {
    fn new(passed: bool, matched: Option<&'c Check>, hooks: Vec<&'c Check>) -> Self {
        Self { passed, matched, hooks }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// For a passing `any`, the child that satisfied it.
    pub fn matched(&self) -> Option<&'c Check> {
        self.matched
    }

    /// Names of the checks whose hooks fire for this invocation, outermost first.
    pub fn hook_owners(&self) -> impl Iterator<Item = &'c str> + '_ {
        self.hooks.iter().map(|&check| check.name())
    }

    /// Runs pre-call hooks outermost first, stopping at the first error.
    pub async fn fire_pre_call(&self, ctxt: &InvocationContext) -> anyhow::Result<()> {
        for check in &self.hooks {
            for hook in &check.pre_call {
                hook.call(ctxt).await?;
            }
        }

        Ok(())
    }

    /// Runs every post-call hook. Errors are logged and do not stop later hooks.
    pub async fn fire_post_call(&self, ctxt: &InvocationContext) {
        for check in &self.hooks {
            for hook in &check.post_call {
                if let Err(e) = hook.call(ctxt).await {
                    warn!("post-call hook of check '{}' failed: {e:#}", check.name);
                }
            }
        }
    }
}
