//! Deployment history ledger
//!
//! An append-mostly log of Change records, one per deployment action
//! against one migration. The engine is the only writer; the read view
//! answers "what is the latest recorded state of this location" and "what
//! ran since this checkpoint". The persisted Change shape is the durable
//! contract other tooling (history viewers, audits) reads.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::EngineResult;
use crate::location::Location;
use crate::script::MigratePolicy;

/// Recorded outcome of one deployment action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    /// First successful forward application
    Migrated,
    /// Forward re-application
    Remigrated,
    /// Successful backward application
    Rollbacked,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            ChangeStatus::Migrated => "MIGRATED",
            ChangeStatus::Remigrated => "REMIGRATED",
            ChangeStatus::Rollbacked => "ROLLBACKED",
        };
        f.write_str(keyword)
    }
}

impl FromStr for ChangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MIGRATED" => Ok(ChangeStatus::Migrated),
            "REMIGRATED" => Ok(ChangeStatus::Remigrated),
            "ROLLBACKED" => Ok(ChangeStatus::Rollbacked),
            other => Err(format!("unknown change status '{}'", other)),
        }
    }
}

/// One immutable history record.
///
/// The checksum is of the script as executed, and the policy is the one in
/// effect at deployment time; both may later diverge from the script in
/// the store, which is exactly what drift detection is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub location: Location,
    pub checksum: Checksum,
    pub migrate_policy: MigratePolicy,
    pub status: ChangeStatus,
    pub deployer: String,
    pub tag: String,
    pub deployed_at: DateTime<Utc>,
}

/// The history ledger: read view plus the engine-only append.
#[async_trait]
pub trait History: Send + Sync {
    /// Latest Change per requested Location, at most one each, in the
    /// requested order. Locations with no history are simply absent.
    /// With `exclude_rollbacked`, locations whose latest Change is
    /// `ROLLBACKED` are omitted as well. Empty input yields empty output.
    async fn most_recent_changes(
        &self,
        locations: &[Location],
        exclude_rollbacked: bool,
    ) -> EngineResult<Vec<Change>>;

    /// The `count` most recently deployed Changes, most recent first,
    /// across all locations.
    async fn most_recent_changes_by_count(&self, count: usize) -> EngineResult<Vec<Change>>;

    /// All Changes deployed at or after the deployment identified by
    /// `tag`, most recent first. An unknown tag yields empty output.
    async fn most_recent_changes_since_tag(&self, tag: &str) -> EngineResult<Vec<Change>>;

    /// All Changes with `deployed_at >= date`, most recent first.
    async fn most_recent_changes_since_date(
        &self,
        date: DateTime<Utc>,
    ) -> EngineResult<Vec<Change>>;

    /// Append one Change; fails on conflict or connectivity, never drops
    /// a record silently.
    async fn append(&self, change: Change) -> EngineResult<()>;

    /// Create the backing storage if it does not exist yet.
    async fn ensure_storage(&self) -> EngineResult<()>;

    /// Tear the backing storage down (provisioning compensation path).
    async fn remove_storage(&self) -> EngineResult<()>;
}
