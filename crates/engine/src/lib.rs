//! # migratory
//!
//! Policy-driven database schema migration engine. Applies ordered,
//! versioned change scripts to a target database, records every action in
//! a durable history ledger, and can roll previously applied changes back.
//!
//! The heart of the crate is the forward-selection state machine: for each
//! known migration it decides execute, skip, or error from the latest
//! recorded Change, the script's current checksum, and a per-migration
//! re-run policy (`ONCE`, `ONCHANGE`, `ALWAYS`, `NEVER`). Checksum drift
//! against a frozen `ONCE` or rolled-back history entry is a fatal
//! consistency error rather than a silent re-deploy.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use migratory::deploy::{Deployment, MigrateHandler, MigrateOptions};
//! use migratory_core::{Environment, Project, StaticResolver};
//!
//! # async fn example() -> Result<(), migratory::EngineError> {
//! let resolver = StaticResolver::new().with_project(
//!     Project::new("app").with_environment(Environment {
//!         name: "dev".to_string(),
//!         target_dsn: "postgres://localhost/app".to_string(),
//!         history_dsn: "postgres://localhost/app".to_string(),
//!         store_path: "migrations".to_string(),
//!         variables: HashMap::new(),
//!     }),
//! );
//!
//! let deployment =
//!     Deployment::prepare(&resolver, "app", Some("dev"), &HashMap::new()).await?;
//! let handler = MigrateHandler::new(deployment, MigrateOptions::unrestricted());
//! let report = handler.deploy("release-42", "alice").await?;
//! println!("applied {} migration(s)", report.executed.len());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod deploy;
pub mod error;
pub mod history;
pub mod location;
pub mod provision;
pub mod script;
pub mod session;
pub mod store;

pub use checksum::Checksum;
pub use error::{EngineError, EngineResult};
pub use history::{Change, ChangeStatus, History};
pub use location::Location;
pub use script::{MigratePolicy, Script};
pub use store::{Migration, MigrationStore};
