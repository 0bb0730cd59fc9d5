//! Shared deployment orchestration
//!
//! `Deployment` supplies what both directions need: session, history, and
//! store wiring, the observer list, dry-run support, and the lifecycle
//! around a run. Direction-specific handlers implement `DeploymentTask`
//! and are driven through `Deployment::deploy`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use migratory_core::{template, EnvironmentResolver};

use crate::deploy::events::{DeployContext, DeployObserver};
use crate::error::EngineResult;
use crate::history::postgres::PgHistory;
use crate::history::{ChangeStatus, History};
use crate::location::Location;
use crate::session::{PgSession, Session};
use crate::store::{DirectoryStore, MigrationStore};

/// Why a candidate migration was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Current script policy is NEVER
    PolicyNever,
    /// Recorded policy ONCE and already satisfied
    AlreadyApplied,
    /// Recorded policy ONCHANGE and the content is unchanged
    Unchanged,
    /// Latest Change is ROLLBACKED and the content is unchanged
    RollbackedUnchanged,
}

/// One executed migration within a run.
#[derive(Debug, Clone)]
pub struct ExecutedMigration {
    pub location: Location,
    pub status: ChangeStatus,
}

/// One skipped migration within a run.
#[derive(Debug, Clone)]
pub struct SkippedMigration {
    pub location: Location,
    pub reason: SkipReason,
}

/// Outcome of one deployment invocation.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Executed (or, in dry-run, would-be-executed) migrations in order
    pub executed: Vec<ExecutedMigration>,
    /// Skipped migrations with their reason
    pub skipped: Vec<SkippedMigration>,
    /// Whether this was a simulation
    pub dry_run: bool,
    /// Wall-clock time of the whole invocation
    pub elapsed_seconds: f64,
}

/// Direction-specific run body.
#[async_trait]
pub trait DeploymentTask: Send + Sync {
    async fn run(
        &self,
        deployment: &Deployment,
        tag: &str,
        deployer: &str,
    ) -> EngineResult<DeployReport>;
}

/// Session, history, and store wiring shared by both handlers.
pub struct Deployment {
    project: String,
    session: Arc<dyn Session>,
    history: Arc<dyn History>,
    store: Arc<dyn MigrationStore>,
    observers: Vec<Arc<dyn DeployObserver>>,
    dry_run: bool,
}

impl Deployment {
    /// Wire a deployment directly from its collaborators.
    pub fn new(
        project: impl Into<String>,
        session: Arc<dyn Session>,
        history: Arc<dyn History>,
        store: Arc<dyn MigrationStore>,
    ) -> Self {
        Self {
            project: project.into(),
            session,
            history,
            store,
            observers: Vec::new(),
            dry_run: false,
        }
    }

    /// Resolve a project's environment and open everything it names:
    /// target session, history ledger (bootstrapping its storage), and
    /// migration store. Fails fast on connectivity errors.
    pub async fn prepare(
        resolver: &dyn EnvironmentResolver,
        project: &str,
        environment: Option<&str>,
        environment_variables: &std::collections::HashMap<String, String>,
    ) -> EngineResult<Self> {
        let resolved = resolver.resolve(project)?;
        let env = resolved.environment(environment)?;

        let session = PgSession::connect(&env.target_dsn).await?;
        let history = PgHistory::connect(&env.history_dsn).await?;
        history.ensure_storage().await?;

        let variables = template::merge_variables(&env.variables, environment_variables);
        let store = DirectoryStore::new(env.store_path.clone()).with_variables(variables);

        Ok(Self::new(
            project,
            Arc::new(session),
            Arc::new(history),
            Arc::new(store),
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn DeployObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Classification and reporting only; no script execution, no ledger
    /// appends.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.history
    }

    pub fn store(&self) -> &Arc<dyn MigrationStore> {
        &self.store
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Drive one deployment invocation through its lifecycle: before-deploy,
    /// the task body, after-deploy, then task-ended with the success flag
    /// and elapsed time. The trailing notifications fire even when the body
    /// errors.
    pub(crate) async fn deploy(
        &self,
        task: &dyn DeploymentTask,
        tag: &str,
        deployer: &str,
    ) -> EngineResult<DeployReport> {
        let context = DeployContext {
            tag: tag.to_string(),
            project: self.project.clone(),
            dry_run: self.dry_run,
            session: Arc::clone(&self.session),
        };

        let started = Instant::now();
        for observer in &self.observers {
            observer.before_deploy(&context).await;
        }

        let result = task.run(self, tag, deployer).await;

        for observer in &self.observers {
            observer.after_deploy(&context).await;
        }
        let elapsed = started.elapsed().as_secs_f64();
        for observer in &self.observers {
            observer.task_ended(result.is_ok(), elapsed).await;
        }

        let mut report = result?;
        report.dry_run = self.dry_run;
        report.elapsed_seconds = elapsed;
        Ok(report)
    }
}
