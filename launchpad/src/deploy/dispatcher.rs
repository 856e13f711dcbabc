//! Fire-and-forget handoff of deployments to the executor

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, error};

/// Runs one deployment attempt to completion
#[async_trait]
pub trait DeploymentRunner: Send + Sync {
    async fn run(&self, deployment_id: &str);
}

#[derive(Default)]
struct InFlight {
    ids: Mutex<HashSet<String>>,
    changed: Notify,
}

impl InFlight {
    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: &str) -> bool {
        self.ids().insert(id.to_string())
    }

    fn remove(&self, id: &str) {
        self.ids().remove(id);
        self.changed.notify_waiters();
    }

    fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids().iter().cloned().collect();
        ids.sort();
        ids
    }

    fn contains(&self, id: &str) -> bool {
        self.ids().contains(id)
    }

    fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // register before checking so a removal in between is not missed
            notified.as_mut().enable();
            if done(self) {
                return;
            }
            notified.await;
        }
    }
}

/// Spawns executor tasks and tracks which deployments are in flight
pub struct Dispatcher {
    runner: Arc<dyn DeploymentRunner>,
    in_flight: Arc<InFlight>,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn DeploymentRunner>) -> Self {
        Self {
            runner,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Start executing a deployment in the background. Submitting an id
    /// that is already in flight is a no-op.
    pub fn submit(&self, deployment_id: &str) {
        if !self.in_flight.insert(deployment_id) {
            debug!(deployment_id = %deployment_id, "Deployment already in flight");
            return;
        }

        let runner = self.runner.clone();
        let in_flight = self.in_flight.clone();
        let id = deployment_id.to_string();

        tokio::spawn(async move {
            let task_id = id.clone();
            let result = tokio::spawn(async move { runner.run(&task_id).await }).await;
            if let Err(e) = result {
                error!(deployment_id = %id, "Executor task failed: {}", e);
            }
            in_flight.remove(&id);
        });
    }

    /// Ids of deployments currently executing, sorted
    pub fn in_flight(&self) -> Vec<String> {
        self.in_flight.snapshot()
    }

    pub fn is_in_flight(&self, deployment_id: &str) -> bool {
        self.in_flight.contains(deployment_id)
    }

    /// Wait until the given deployment is no longer executing
    pub async fn wait_for(&self, deployment_id: &str) {
        self.in_flight
            .wait_until(|in_flight| !in_flight.contains(deployment_id))
            .await;
    }

    /// Wait until nothing is executing
    pub async fn wait_idle(&self) {
        self.in_flight.wait_until(InFlight::is_empty).await;
    }
}
