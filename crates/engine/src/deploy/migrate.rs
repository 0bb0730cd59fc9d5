//! Forward selection and deployment
//!
//! For every candidate migration the engine decides execute, skip, or
//! error from exactly three inputs: the current script's policy, the
//! current content checksum, and the latest recorded Change. The recorded
//! Change's policy, not the script's current one, governs drift
//! handling, so an operator can change a future policy without
//! retroactively reclassifying history. The one asymmetry: NEVER gates on
//! the *current* script's policy, before history is consulted at all.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::deploy::handler::{
    Deployment, DeploymentTask, DeployReport, ExecutedMigration, SkipReason, SkippedMigration,
};
use crate::deploy::options::MigrateOptions;
use crate::error::{EngineError, EngineResult};
use crate::history::{Change, ChangeStatus};
use crate::script::MigratePolicy;
use crate::store::{Migration, MigrationIter};

/// Outcome of classifying one candidate migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Execute the forward action and record this status
    Apply(ChangeStatus),
    /// Do not execute; never recorded
    Skip(SkipReason),
}

/// Classify one candidate against its latest recorded Change.
///
/// Pure function; the caller supplies the ledger lookup.
pub fn classify(migration: &Migration, latest: Option<&Change>) -> EngineResult<Decision> {
    if migration.script.policy() == MigratePolicy::Never {
        return Ok(Decision::Skip(SkipReason::PolicyNever));
    }

    let Some(change) = latest else {
        return Ok(Decision::Apply(ChangeStatus::Migrated));
    };

    let changed = migration.checksum != change.checksum;

    // The recorded policy is the frozen one; the script's current policy
    // already had its say above.
    if change.migrate_policy == MigratePolicy::Once {
        if changed {
            return Err(EngineError::out_of_sync(
                &migration.location,
                "once migration no longer matches history",
            ));
        }
        return Ok(Decision::Skip(SkipReason::AlreadyApplied));
    }

    if change.status == ChangeStatus::Rollbacked {
        if changed {
            return Err(EngineError::out_of_sync(
                &migration.location,
                "rollbacked migration no longer matches history",
            ));
        }
        return Ok(Decision::Skip(SkipReason::RollbackedUnchanged));
    }

    if change.migrate_policy == MigratePolicy::OnChange && !changed {
        return Ok(Decision::Skip(SkipReason::Unchanged));
    }

    Ok(Decision::Apply(ChangeStatus::Remigrated))
}

/// Forward deployment handler.
pub struct MigrateHandler {
    deployment: Deployment,
    options: MigrateOptions,
}

impl MigrateHandler {
    pub fn new(deployment: Deployment, options: MigrateOptions) -> Self {
        Self {
            deployment,
            options,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Run one forward deployment invocation under the full lifecycle.
    pub async fn deploy(&self, tag: &str, deployer: &str) -> EngineResult<DeployReport> {
        self.deployment.deploy(&MigrateTask { options: &self.options }, tag, deployer).await
    }
}

struct MigrateTask<'a> {
    options: &'a MigrateOptions,
}

#[async_trait]
impl DeploymentTask for MigrateTask<'_> {
    async fn run(
        &self,
        deployment: &Deployment,
        tag: &str,
        deployer: &str,
    ) -> EngineResult<DeployReport> {
        let mut report = DeployReport::default();

        // Explicit paths override full-store iteration and keep the
        // caller-supplied order; unknown Locations surface as NotFound
        // from the store.
        let mut candidates: MigrationIter<'_> = match self.options.paths() {
            Some(paths) => Box::new(
                paths
                    .iter()
                    .map(|location| deployment.store().get(location)),
            ),
            None => deployment.store().iterate()?,
        };

        while let Some(candidate) = candidates.next() {
            let migration = candidate?;

            let latest = deployment
                .history()
                .most_recent_changes(std::slice::from_ref(&migration.location), false)
                .await?;
            let decision = classify(&migration, latest.first())?;

            match decision {
                Decision::Skip(reason) => {
                    debug!(location = %migration.location, ?reason, "skipping migration");
                    report.skipped.push(SkippedMigration {
                        location: migration.location.clone(),
                        reason,
                    });
                }
                Decision::Apply(status) => {
                    let action = migration.script.migrate_action().ok_or_else(|| {
                        EngineError::validation(
                            &migration.location,
                            "script has no @migrate action but was selected for forward deployment",
                        )
                    })?;

                    if deployment.dry_run() {
                        info!(location = %migration.location, %status, "dry-run: would migrate");
                    } else {
                        info!(location = %migration.location, %status, tag, "migrating");
                        if let Some(hook) = migration.script.pre_deploy_commit() {
                            hook.execute(deployment.session().as_ref()).await?;
                        }
                        action.execute(deployment.session().as_ref()).await?;
                        deployment
                            .history()
                            .append(Change {
                                location: migration.location.clone(),
                                checksum: migration.checksum,
                                migrate_policy: migration.script.policy(),
                                status,
                                deployer: deployer.to_string(),
                                tag: tag.to_string(),
                                deployed_at: Utc::now(),
                            })
                            .await?;
                    }

                    report.executed.push(ExecutedMigration {
                        location: migration.location.clone(),
                        status,
                    });

                    // The count limit consumes executions, not iterations.
                    if let Some(limit) = self.options.count() {
                        if report.executed.len() >= limit {
                            break;
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
