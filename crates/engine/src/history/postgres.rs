//! Postgres history backend
//!
//! One row per Change in a configurable table. The table is bootstrapped
//! with `CREATE TABLE IF NOT EXISTS`; rows are never updated or deleted by
//! the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::checksum::Checksum;
use crate::error::{EngineError, EngineResult};
use crate::history::{Change, ChangeStatus, History};
use crate::location::Location;
use crate::script::MigratePolicy;

/// Default name of the Change table.
pub const DEFAULT_TABLE: &str = "migratory_changes";

/// Ledger persisted in a Postgres table.
pub struct PgHistory {
    pool: PgPool,
    table: String,
}

impl PgHistory {
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, DEFAULT_TABLE)
    }

    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Connect from a DSN, failing fast on connectivity errors.
    pub async fn connect(dsn: &str) -> EngineResult<Self> {
        let pool = PgPool::connect(dsn)
            .await
            .map_err(|e| EngineError::Connection(format!("failed to connect to history: {}", e)))?;
        Ok(Self::new(pool))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id BIGSERIAL PRIMARY KEY,\n    \
                location VARCHAR(512) NOT NULL,\n    \
                checksum VARCHAR(64) NOT NULL,\n    \
                migrate_policy VARCHAR(16) NOT NULL,\n    \
                status VARCHAR(16) NOT NULL,\n    \
                deployer VARCHAR(255) NOT NULL,\n    \
                tag VARCHAR(255) NOT NULL,\n    \
                deployed_at TIMESTAMPTZ NOT NULL\n\
            );",
            self.table
        )
    }

    fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.table)
    }

    fn append_sql(&self) -> String {
        format!(
            "INSERT INTO {} (location, checksum, migrate_policy, status, deployer, tag, deployed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table
        )
    }

    fn most_recent_sql(&self) -> String {
        format!(
            "SELECT DISTINCT ON (location) \
                 location, checksum, migrate_policy, status, deployer, tag, deployed_at \
             FROM {} WHERE location = ANY($1) \
             ORDER BY location, deployed_at DESC, id DESC",
            self.table
        )
    }

    fn by_count_sql(&self) -> String {
        format!(
            "SELECT location, checksum, migrate_policy, status, deployer, tag, deployed_at \
             FROM {} ORDER BY deployed_at DESC, id DESC LIMIT $1",
            self.table
        )
    }

    fn since_tag_sql(&self) -> String {
        format!(
            "SELECT location, checksum, migrate_policy, status, deployer, tag, deployed_at \
             FROM {table} \
             WHERE deployed_at >= (SELECT MIN(deployed_at) FROM {table} WHERE tag = $1) \
             ORDER BY deployed_at DESC, id DESC",
            table = self.table
        )
    }

    fn since_date_sql(&self) -> String {
        format!(
            "SELECT location, checksum, migrate_policy, status, deployer, tag, deployed_at \
             FROM {} WHERE deployed_at >= $1 ORDER BY deployed_at DESC, id DESC",
            self.table
        )
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> EngineResult<Change> {
        let location: String = row
            .try_get("location")
            .map_err(|e| EngineError::History(format!("failed to read location: {}", e)))?;
        let checksum: String = row
            .try_get("checksum")
            .map_err(|e| EngineError::History(format!("failed to read checksum: {}", e)))?;
        let migrate_policy: String = row
            .try_get("migrate_policy")
            .map_err(|e| EngineError::History(format!("failed to read migrate_policy: {}", e)))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| EngineError::History(format!("failed to read status: {}", e)))?;
        let deployer: String = row
            .try_get("deployer")
            .map_err(|e| EngineError::History(format!("failed to read deployer: {}", e)))?;
        let tag: String = row
            .try_get("tag")
            .map_err(|e| EngineError::History(format!("failed to read tag: {}", e)))?;
        let deployed_at: DateTime<Utc> = row
            .try_get("deployed_at")
            .map_err(|e| EngineError::History(format!("failed to read deployed_at: {}", e)))?;

        Ok(Change {
            location: Location::new(location),
            checksum: checksum.parse::<Checksum>().map_err(EngineError::History)?,
            migrate_policy: migrate_policy
                .parse::<MigratePolicy>()
                .map_err(EngineError::History)?,
            status: status.parse::<ChangeStatus>().map_err(EngineError::History)?,
            deployer,
            tag,
            deployed_at,
        })
    }
}

#[async_trait]
impl History for PgHistory {
    async fn most_recent_changes(
        &self,
        locations: &[Location],
        exclude_rollbacked: bool,
    ) -> EngineResult<Vec<Change>> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<String> = locations.iter().map(|l| l.as_str().to_string()).collect();
        let rows = sqlx::query(&self.most_recent_sql())
            .bind(&wanted)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to query history: {}", e)))?;

        let fetched: Vec<Change> = rows.iter().map(Self::decode_row).collect::<EngineResult<_>>()?;

        // Re-establish the caller's location order.
        let mut result = Vec::new();
        for location in locations {
            if let Some(change) = fetched.iter().find(|c| &c.location == location) {
                if exclude_rollbacked && change.status == ChangeStatus::Rollbacked {
                    continue;
                }
                result.push(change.clone());
            }
        }
        Ok(result)
    }

    async fn most_recent_changes_by_count(&self, count: usize) -> EngineResult<Vec<Change>> {
        let rows = sqlx::query(&self.by_count_sql())
            .bind(count as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to query history: {}", e)))?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn most_recent_changes_since_tag(&self, tag: &str) -> EngineResult<Vec<Change>> {
        let rows = sqlx::query(&self.since_tag_sql())
            .bind(tag)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to query history: {}", e)))?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn most_recent_changes_since_date(
        &self,
        date: DateTime<Utc>,
    ) -> EngineResult<Vec<Change>> {
        let rows = sqlx::query(&self.since_date_sql())
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to query history: {}", e)))?;
        rows.iter().map(Self::decode_row).collect()
    }

    async fn append(&self, change: Change) -> EngineResult<()> {
        sqlx::query(&self.append_sql())
            .bind(change.location.as_str())
            .bind(change.checksum.to_hex())
            .bind(change.migrate_policy.to_string())
            .bind(change.status.to_string())
            .bind(&change.deployer)
            .bind(&change.tag)
            .bind(change.deployed_at)
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to append change: {}", e)))?;
        Ok(())
    }

    async fn ensure_storage(&self) -> EngineResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to create history table: {}", e)))?;
        Ok(())
    }

    async fn remove_storage(&self) -> EngineResult<()> {
        sqlx::query(&self.drop_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::History(format!("failed to drop history table: {}", e)))?;
        Ok(())
    }
}
