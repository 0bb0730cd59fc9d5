//! Deployment lifecycle events
//!
//! Observers are notified exactly once per deployment invocation: before
//! the run, after the run, and when the task ends with its success flag
//! and elapsed wall-clock time. The trailing two fire even when the run
//! fails, so observers can record failed deployments.

use std::sync::Arc;

use async_trait::async_trait;

use crate::session::Session;

/// Context handed to before/after-deploy observers.
#[derive(Clone)]
pub struct DeployContext {
    /// Tag correlating every Change of this invocation
    pub tag: String,
    /// Project being deployed
    pub project: String,
    /// Simulation mode flag
    pub dry_run: bool,
    /// The open target session
    pub session: Arc<dyn Session>,
}

/// Observer of deployment lifecycle events. All methods default to no-ops.
#[async_trait]
pub trait DeployObserver: Send + Sync {
    async fn before_deploy(&self, _context: &DeployContext) {}

    async fn after_deploy(&self, _context: &DeployContext) {}

    /// Fired last, with sub-millisecond elapsed precision, whether the run
    /// succeeded or not.
    async fn task_ended(&self, _success: bool, _elapsed_seconds: f64) {}
}
