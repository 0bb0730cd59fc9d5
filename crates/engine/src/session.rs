//! Target database sessions
//!
//! The engine only needs three things from a session: execute a statement,
//! close, and name its platform (consumed elsewhere for dialect-specific
//! compilation). Everything else about connections stays behind the trait.

use async_trait::async_trait;
use sqlx::{Executor, PgPool};

use crate::error::{EngineError, EngineResult};

/// A connection to the target database.
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute one script body; any driver-level failure is an execution error.
    async fn execute_statement(&self, sql: &str) -> EngineResult<()>;

    /// Release the underlying connection resources.
    async fn close(&self) -> EngineResult<()>;

    /// Platform name, e.g. "postgres".
    fn platform(&self) -> &str;
}

/// Postgres session over a sqlx connection pool.
pub struct PgSession {
    pool: PgPool,
}

impl PgSession {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect from a DSN, failing fast on connectivity errors.
    pub async fn connect(dsn: &str) -> EngineResult<Self> {
        let pool = PgPool::connect(dsn)
            .await
            .map_err(|e| EngineError::Connection(format!("failed to connect to target: {}", e)))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Session for PgSession {
    async fn execute_statement(&self, sql: &str) -> EngineResult<()> {
        // Unprepared execution path, so script bodies may hold several
        // statements separated by semicolons.
        self.pool
            .execute(sql)
            .await
            .map_err(|e| EngineError::Session(format!("failed to execute statement: {}", e)))?;
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn platform(&self) -> &str {
        "postgres"
    }
}
