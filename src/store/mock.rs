//! In-memory agent for tests.
//!
//! Targets answer according to how they were registered: [`MockAgent::serve`]
//! returns a profile list, [`MockAgent::hang`] never answers, and anything
//! else is refused. Every call is recorded. A push takes effect when its
//! future completes, so [`MockAgent::held`] reflects completion order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tokio::sync::Notify;

use super::agent::AgentClient;
use crate::connection::Target;
use crate::error::{RdError, Result};
use crate::model::Profile;

#[derive(Default)]
struct Inner {
    configs: HashMap<Target, Vec<Profile>>,
    hanging: HashSet<Target>,
    fail_pushes: bool,
    push_delays: VecDeque<Duration>,
    held: HashMap<Target, Vec<Profile>>,
    fetches: Vec<Target>,
    pushes: Vec<(Target, Vec<Profile>)>,
}

/// Agent double with recorded fetches and pushes.
#[derive(Clone, Default)]
pub struct MockAgent {
    inner: Arc<Mutex<Inner>>,
    pushed: Arc<Notify>,
}

impl MockAgent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Answer fetches for `target` with `profiles`.
    pub fn serve(&self, target: Target, profiles: Vec<Profile>) {
        self.lock().configs.insert(target, profiles);
    }

    /// Never answer fetches for `target`.
    pub fn hang(&self, target: Target) {
        self.lock().hanging.insert(target);
    }

    /// Make every subsequent push fail.
    pub fn fail_pushes(&self, fail: bool) {
        self.lock().fail_pushes = fail;
    }

    /// Delay the next pushes, one entry per push in call order. Pushes past
    /// the end of the list complete immediately.
    pub fn delay_pushes(&self, delays: impl IntoIterator<Item = Duration>) {
        self.lock().push_delays.extend(delays);
    }

    /// Profiles the agent holds for `target` after its last completed push.
    #[must_use]
    pub fn held(&self, target: &Target) -> Option<Vec<Profile>> {
        self.lock().held.get(target).cloned()
    }

    #[must_use]
    pub fn fetches(&self) -> Vec<Target> {
        self.lock().fetches.clone()
    }

    /// Pushes received so far, including failed ones.
    #[must_use]
    pub fn pushes(&self) -> Vec<(Target, Vec<Profile>)> {
        self.lock().pushes.clone()
    }

    /// Wait until at least `count` pushes were received, up to `timeout`.
    pub async fn wait_for_pushes(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.pushed.notified();
                if self.lock().pushes.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl AgentClient for MockAgent {
    fn fetch_config(&self, target: &Target) -> BoxFuture<'static, Result<Vec<Profile>>> {
        let mut inner = self.lock();
        inner.fetches.push(target.clone());
        if inner.hanging.contains(target) {
            return future::pending().boxed();
        }
        let result = inner
            .configs
            .get(target)
            .cloned()
            .ok_or_else(|| RdError::Agent(format!("{target} refused the connection")));
        future::ready(result).boxed()
    }

    fn push_config(&self, target: &Target, profiles: Vec<Profile>) -> BoxFuture<'static, Result<()>> {
        let (delay, fail) = {
            let mut inner = self.lock();
            inner.pushes.push((target.clone(), profiles.clone()));
            (inner.push_delays.pop_front(), inner.fail_pushes)
        };
        self.pushed.notify_waiters();
        if fail {
            return future::ready(Err(RdError::Agent(format!("{target} rejected the push")))).boxed();
        }

        let agent = self.clone();
        let target = target.clone();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            agent.lock().held.insert(target, profiles);
            Ok(())
        }
        .boxed()
    }
}
