//! Rollback selection and execution
//!
//! Rollback targets are resolved from exactly one `RollbackBy` variant,
//! then processed most-recent-first. Unlike forward selection there is no
//! policy-based override anywhere on this path: any checksum drift between
//! the store and the recorded Change is fatal, because reversing content
//! that no longer matches what history claims ran is exactly the corruption
//! this engine exists to prevent.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::deploy::handler::{Deployment, DeploymentTask, DeployReport, ExecutedMigration};
use crate::deploy::options::RollbackBy;
use crate::error::{EngineError, EngineResult};
use crate::history::{Change, ChangeStatus};

/// Backward deployment handler.
pub struct RollbackHandler {
    deployment: Deployment,
    by: RollbackBy,
}

impl RollbackHandler {
    pub fn new(deployment: Deployment, by: RollbackBy) -> Self {
        Self { deployment, by }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Run one rollback invocation.
    ///
    /// An empty resolved target set is a complete no-op: no lifecycle
    /// events fire and the target session is never touched.
    pub async fn deploy(&self, tag: &str, deployer: &str) -> EngineResult<DeployReport> {
        let targets = self.resolve_targets().await?;
        if targets.is_empty() {
            return Ok(DeployReport {
                dry_run: self.deployment.dry_run(),
                ..Default::default()
            });
        }

        self.deployment
            .deploy(&RollbackTask { targets }, tag, deployer)
            .await
    }

    /// Resolve the target Change set from the active selector.
    ///
    /// Entries whose status is already ROLLBACKED are dropped from every
    /// variant (they record rollback actions, not live deployments), and
    /// only the most recent Change per Location is kept. `Paths` raises
    /// NotFound for a Location with no history at all.
    async fn resolve_targets(&self) -> EngineResult<Vec<Change>> {
        let history = self.deployment.history();
        let selected = match &self.by {
            RollbackBy::Count(n) => history.most_recent_changes_by_count(*n).await?,
            RollbackBy::Tag(tag) => history.most_recent_changes_since_tag(tag).await?,
            RollbackBy::Date(date) => history.most_recent_changes_since_date(*date).await?,
            RollbackBy::Paths(paths) => {
                let all = history.most_recent_changes(paths, false).await?;
                for path in paths {
                    if !all.iter().any(|c| &c.location == path) {
                        return Err(EngineError::NotFound(path.to_string()));
                    }
                }
                // Latest-ROLLBACKED locations are silently excluded.
                history.most_recent_changes(paths, true).await?
            }
        };

        // Most-recent-first, so the first entry seen per Location is its
        // latest; a latest-ROLLBACKED Location is excluded outright rather
        // than falling back to an older record.
        let mut seen = HashSet::new();
        Ok(selected
            .into_iter()
            .filter(|change| seen.insert(change.location.clone()))
            .filter(|change| change.status != ChangeStatus::Rollbacked)
            .collect())
    }
}

struct RollbackTask {
    /// Most-recent-first, one Change per Location
    targets: Vec<Change>,
}

#[async_trait]
impl DeploymentTask for RollbackTask {
    async fn run(
        &self,
        deployment: &Deployment,
        tag: &str,
        deployer: &str,
    ) -> EngineResult<DeployReport> {
        let mut report = DeployReport::default();

        for change in &self.targets {
            let migration = deployment.store().get(&change.location)?;

            if migration.checksum != change.checksum {
                return Err(EngineError::out_of_sync(
                    &change.location,
                    "script changed since last migrated",
                ));
            }

            let action = migration.script.rollback_action().ok_or_else(|| {
                EngineError::validation(
                    &change.location,
                    "script has no @rollback action but was selected for rollback",
                )
            })?;

            if deployment.dry_run() {
                info!(location = %change.location, "dry-run: would roll back");
            } else {
                info!(location = %change.location, tag, "rolling back");
                if let Some(hook) = migration.script.pre_deploy_revert() {
                    hook.execute(deployment.session().as_ref()).await?;
                }
                action.execute(deployment.session().as_ref()).await?;
                deployment
                    .history()
                    .append(Change {
                        location: change.location.clone(),
                        checksum: migration.checksum,
                        migrate_policy: migration.script.policy(),
                        status: ChangeStatus::Rollbacked,
                        deployer: deployer.to_string(),
                        tag: tag.to_string(),
                        deployed_at: Utc::now(),
                    })
                    .await?;
            }

            report.executed.push(ExecutedMigration {
                location: change.location.clone(),
                status: ChangeStatus::Rollbacked,
            });
        }

        Ok(report)
    }
}
