//! Project and environment descriptors
//!
//! A project names the deployable unit; each of its environments carries
//! the three connection descriptors the engine needs: the target database,
//! the history storage, and the migration script store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A deployable project: a name plus its configured environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier
    pub name: String,
    /// Environments keyed by name
    pub environments: HashMap<String, Environment>,
    /// Name of the environment used when the caller does not pick one
    #[serde(default)]
    pub default_environment: Option<String>,
}

/// One environment of a project.
///
/// DSN strings are opaque at this layer; the engine's session and history
/// backends interpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name (e.g. "dev", "staging", "prod")
    pub name: String,
    /// Connection descriptor for the target database
    pub target_dsn: String,
    /// Connection descriptor for the history ledger storage
    pub history_dsn: String,
    /// Migration store descriptor (for the filesystem store, a directory path)
    pub store_path: String,
    /// Template variables available to scripts in this environment
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Project {
    /// Create a project with no environments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environments: HashMap::new(),
            default_environment: None,
        }
    }

    /// Add an environment, replacing any previous one with the same name.
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.environments.insert(env.name.clone(), env);
        self
    }

    /// Look up an environment by name, falling back to the project default.
    pub fn environment(&self, name: Option<&str>) -> CoreResult<&Environment> {
        let wanted = match name.or(self.default_environment.as_deref()) {
            Some(n) => n,
            None => {
                return Err(CoreError::Configuration(format!(
                    "project '{}' has no default environment and none was requested",
                    self.name
                )))
            }
        };

        self.environments
            .get(wanted)
            .ok_or_else(|| CoreError::MissingEnvironment {
                project: self.name.clone(),
                environment: wanted.to_string(),
            })
    }
}

/// Resolves a project identifier to its configuration.
///
/// Where project metadata lives (files, a registry database, ...) is a
/// collaborator concern; the engine only consumes this trait.
pub trait EnvironmentResolver: Send + Sync {
    /// Resolve a project by name.
    fn resolve(&self, project: &str) -> CoreResult<Project>;
}

/// In-memory resolver over a fixed set of projects.
#[derive(Debug, Default)]
pub struct StaticResolver {
    projects: HashMap<String, Project>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project, replacing any previous one with the same name.
    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.insert(project.name.clone(), project);
        self
    }
}

impl EnvironmentResolver for StaticResolver {
    fn resolve(&self, project: &str) -> CoreResult<Project> {
        self.projects
            .get(project)
            .cloned()
            .ok_or_else(|| CoreError::Configuration(format!("unknown project '{}'", project)))
    }
}
