//! # Hooks
//!
//! Externally registered interceptors, held by an explicit [`HookRegistry`]
//! that the router passes down to every navigation.
//!
//! | Extension point | Signature | Veto effect |
//! |-----------------|-----------|-------------|
//! | `before_navigation` | async, navigation | navigation cancelled |
//! | `transform_from_url` | sync, text | navigation cancelled |
//! | `transform_to_url` | sync, text | value kept |
//! | `transform_title` | sync, text | value kept |
//! | `can_load` / `can_unload` / `loading` / `unloading` | async, [`LifecycleContext`] | endpoint transition aborted |
//!
//! Lifecycle interceptors run in registration order before the component's
//! own hook; the first non-`Allow` outcome wins.

use crate::domain::navigation::Navigation;
use crate::error::RouterResult;
use crate::ports::outbound::{GuardOutcome, LifecycleContext};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Handle for removing a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Result of an interceptor: carry on (possibly with a rewritten value) or stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision<T> {
    Proceed(T),
    Veto,
}

impl<T> HookDecision<T> {
    pub fn is_veto(&self) -> bool {
        matches!(self, Self::Veto)
    }
}

impl From<bool> for HookDecision<()> {
    fn from(proceed: bool) -> Self {
        if proceed {
            Self::Proceed(())
        } else {
            Self::Veto
        }
    }
}

/// Lifecycle extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHookKind {
    CanLoad,
    CanUnload,
    Loading,
    Unloading,
}

impl LifecycleHookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CanLoad => "can_load",
            Self::CanUnload => "can_unload",
            Self::Loading => "loading",
            Self::Unloading => "unloading",
        }
    }
}

impl fmt::Display for LifecycleHookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which components or endpoints a lifecycle hook applies to.
///
/// Names are compared with both the component and the endpoint name. An
/// empty include list means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookTarget {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl HookTarget {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: names.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn except<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, context: &LifecycleContext) -> bool {
        let named = |name: &String| *name == context.component || *name == context.endpoint_name;
        (self.include.is_empty() || self.include.iter().any(named))
            && !self.exclude.iter().any(named)
    }
}

pub type NavigationHook =
    Arc<dyn Fn(Arc<Navigation>) -> BoxFuture<'static, RouterResult<HookDecision<()>>> + Send + Sync>;
pub type TransformHook = Arc<dyn Fn(String) -> HookDecision<String> + Send + Sync>;
pub type LifecycleHook =
    Arc<dyn Fn(LifecycleContext) -> BoxFuture<'static, RouterResult<GuardOutcome>> + Send + Sync>;

struct Registered<H> {
    id: HookId,
    hook: H,
}

struct RegisteredLifecycle {
    id: HookId,
    kind: LifecycleHookKind,
    target: HookTarget,
    hook: LifecycleHook,
}

#[derive(Default)]
struct Hooks {
    next_id: u64,
    before_navigation: Vec<Registered<NavigationHook>>,
    transform_from_url: Vec<Registered<TransformHook>>,
    transform_to_url: Vec<Registered<TransformHook>>,
    transform_title: Vec<Registered<TransformHook>>,
    lifecycle: Vec<RegisteredLifecycle>,
}

impl Hooks {
    fn allocate(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }
}

/// Registry of interceptors. Cloning shares the registrations.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<RwLock<Hooks>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.read();
        f.debug_struct("HookRegistry")
            .field("before_navigation", &hooks.before_navigation.len())
            .field("transform_from_url", &hooks.transform_from_url.len())
            .field("transform_to_url", &hooks.transform_to_url.len())
            .field("transform_title", &hooks.transform_title.len())
            .field("lifecycle", &hooks.lifecycle.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    pub fn add_before_navigation<F, Fut>(&self, hook: F) -> HookId
    where
        F: Fn(Arc<Navigation>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<HookDecision<()>>> + Send + 'static,
    {
        let mut hooks = self.hooks.write();
        let id = hooks.allocate();
        hooks.before_navigation.push(Registered {
            id,
            hook: Arc::new(move |navigation| hook(navigation).boxed()),
        });
        id
    }

    pub fn add_transform_from_url<F>(&self, hook: F) -> HookId
    where
        F: Fn(String) -> HookDecision<String> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write();
        let id = hooks.allocate();
        hooks.transform_from_url.push(Registered {
            id,
            hook: Arc::new(hook),
        });
        id
    }

    pub fn add_transform_to_url<F>(&self, hook: F) -> HookId
    where
        F: Fn(String) -> HookDecision<String> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write();
        let id = hooks.allocate();
        hooks.transform_to_url.push(Registered {
            id,
            hook: Arc::new(hook),
        });
        id
    }

    pub fn add_transform_title<F>(&self, hook: F) -> HookId
    where
        F: Fn(String) -> HookDecision<String> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write();
        let id = hooks.allocate();
        hooks.transform_title.push(Registered {
            id,
            hook: Arc::new(hook),
        });
        id
    }

    /// Register a lifecycle interceptor.
    pub fn add_lifecycle<F, Fut>(&self, kind: LifecycleHookKind, target: HookTarget, hook: F) -> HookId
    where
        F: Fn(LifecycleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<GuardOutcome>> + Send + 'static,
    {
        let mut hooks = self.hooks.write();
        let id = hooks.allocate();
        hooks.lifecycle.push(RegisteredLifecycle {
            id,
            kind,
            target,
            hook: Arc::new(move |context| hook(context).boxed()),
        });
        id
    }

    pub fn add_can_load<F, Fut>(&self, target: HookTarget, hook: F) -> HookId
    where
        F: Fn(LifecycleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<GuardOutcome>> + Send + 'static,
    {
        self.add_lifecycle(LifecycleHookKind::CanLoad, target, hook)
    }

    pub fn add_can_unload<F, Fut>(&self, target: HookTarget, hook: F) -> HookId
    where
        F: Fn(LifecycleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouterResult<GuardOutcome>> + Send + 'static,
    {
        self.add_lifecycle(LifecycleHookKind::CanUnload, target, hook)
    }

    /// Remove a hook of any kind. `false` when the id is unknown.
    pub fn remove(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.before_navigation.len()
            + hooks.transform_from_url.len()
            + hooks.transform_to_url.len()
            + hooks.transform_title.len()
            + hooks.lifecycle.len();
        hooks.before_navigation.retain(|h| h.id != id);
        hooks.transform_from_url.retain(|h| h.id != id);
        hooks.transform_to_url.retain(|h| h.id != id);
        hooks.transform_title.retain(|h| h.id != id);
        hooks.lifecycle.retain(|h| h.id != id);
        let after = hooks.before_navigation.len()
            + hooks.transform_from_url.len()
            + hooks.transform_to_url.len()
            + hooks.transform_title.len()
            + hooks.lifecycle.len();
        after < before
    }

    // =========================================================================
    // INVOCATION
    // =========================================================================

    /// `false` when a hook vetoed the navigation.
    pub async fn before_navigation(&self, navigation: &Arc<Navigation>) -> RouterResult<bool> {
        let snapshot: Vec<NavigationHook> = self
            .hooks
            .read()
            .before_navigation
            .iter()
            .map(|h| h.hook.clone())
            .collect();
        for hook in snapshot {
            if hook(navigation.clone()).await?.is_veto() {
                debug!(navigation_id = navigation.id, "Navigation vetoed by before_navigation hook");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Rewrite incoming text. `None` when a hook vetoed it.
    pub fn transform_from_url(&self, text: String) -> Option<String> {
        let hooks = self.hooks.read();
        let mut current = text;
        for registered in &hooks.transform_from_url {
            match (registered.hook)(current) {
                HookDecision::Proceed(next) => current = next,
                HookDecision::Veto => return None,
            }
        }
        Some(current)
    }

    /// Rewrite an outgoing path; a veto keeps the value so far.
    pub fn transform_to_url(&self, text: String) -> String {
        Self::rewrite(&self.hooks.read().transform_to_url, text)
    }

    /// Rewrite a title; a veto keeps the value so far.
    pub fn transform_title(&self, title: String) -> String {
        Self::rewrite(&self.hooks.read().transform_title, title)
    }

    fn rewrite(hooks: &[Registered<TransformHook>], text: String) -> String {
        hooks.iter().fold(text, |current, registered| {
            match (registered.hook)(current.clone()) {
                HookDecision::Proceed(next) => next,
                HookDecision::Veto => current,
            }
        })
    }

    /// Run the interceptors of `kind` matching `context`.
    pub async fn run_lifecycle(
        &self,
        kind: LifecycleHookKind,
        context: &LifecycleContext,
    ) -> RouterResult<GuardOutcome> {
        let snapshot: Vec<LifecycleHook> = self
            .hooks
            .read()
            .lifecycle
            .iter()
            .filter(|h| h.kind == kind && h.target.matches(context))
            .map(|h| h.hook.clone())
            .collect();
        for hook in snapshot {
            let outcome = hook(context.clone()).await?;
            if !outcome.is_allowed() {
                debug!(
                    navigation_id = context.navigation_id,
                    endpoint = %context.endpoint_name,
                    component = %context.component,
                    hook = %kind,
                    "Lifecycle interceptor stopped the transition"
                );
                return Ok(outcome);
            }
        }
        Ok(GuardOutcome::Allow)
    }

    pub fn has_lifecycle(&self, kind: LifecycleHookKind) -> bool {
        self.hooks.read().lifecycle.iter().any(|h| h.kind == kind)
    }
}
