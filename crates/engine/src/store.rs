//! Migration store
//!
//! Addresses scripts by Location, loads and parses them, computes their
//! checksum, and iterates them in ascending Location order. A Migration is
//! rebuilt from source on every run; nothing here is cached, so edits are
//! always observable as drift against the ledger.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use migratory_core::template;

use crate::checksum::Checksum;
use crate::error::{EngineError, EngineResult};
use crate::location::Location;
use crate::script::parser::parse_sql_script;
use crate::script::{NativeScript, Script, ScriptAction, ScriptActions, ScriptOrigin};

/// A Location paired with its loaded script and content checksum.
#[derive(Debug, Clone)]
pub struct Migration {
    pub location: Location,
    pub script: Script,
    pub checksum: Checksum,
}

/// Single-pass producer of migrations in ascending Location order.
pub type MigrationIter<'a> = Box<dyn Iterator<Item = EngineResult<Migration>> + Send + 'a>;

/// Loads migrations by Location.
pub trait MigrationStore: Send + Sync {
    /// Lazily iterate every known migration in ascending Location order.
    /// The sequence is finite and not restartable once consumed; call
    /// again for a fresh pass.
    fn iterate(&self) -> EngineResult<MigrationIter<'_>>;

    /// Load one migration, `NotFound` if the Location is unknown.
    fn get(&self, location: &Location) -> EngineResult<Migration>;
}

/// Filesystem-backed store: `.sql` files under a root directory, plus any
/// registered native scripts. Locations are relative paths with `/`
/// separators (native scripts use their registered name).
pub struct DirectoryStore {
    root: PathBuf,
    variables: HashMap<String, String>,
    natives: BTreeMap<Location, Arc<dyn NativeScript>>,
}

impl std::fmt::Debug for DirectoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryStore")
            .field("root", &self.root)
            .field("variables", &self.variables)
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            variables: HashMap::new(),
            natives: BTreeMap::new(),
        }
    }

    /// Template variables resolved into every SQL script. The map is
    /// explicit; the store never reads the process environment itself.
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Register a native script under a Location. Registration validates
    /// the capability set immediately.
    pub fn register_native(
        mut self,
        location: impl Into<Location>,
        script: Arc<dyn NativeScript>,
    ) -> EngineResult<Self> {
        let location = location.into();
        if script.migrate_action().is_none() && script.rollback_action().is_none() {
            return Err(EngineError::validation(
                &location,
                "native script must implement at least one of migrate and rollback",
            ));
        }
        self.natives.insert(location, script);
        Ok(self)
    }

    fn sorted_locations(&self) -> EngineResult<Vec<Location>> {
        let mut locations: Vec<Location> = self.natives.keys().cloned().collect();
        if self.root.exists() {
            collect_sql_files(&self.root, &self.root, &mut locations)?;
        }
        locations.sort();
        locations.dedup();
        Ok(locations)
    }

    fn load_sql(&self, location: &Location, path: &Path) -> EngineResult<Migration> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EngineError::Store(format!("failed to read '{}': {}", path.display(), e))
        })?;

        // Rendered before parsing; the checksum covers the resolved bytes
        // so a variable value change is drift like any other edit.
        let resolved = template::render(&raw, &self.variables);
        let checksum = Checksum::of_str(&resolved);

        let parsed = parse_sql_script(location, &resolved)?;
        let script = Script::assemble(
            location,
            parsed.meta,
            ScriptOrigin::SqlText,
            ScriptActions {
                migrate: parsed.migrate_sql.map(ScriptAction::Sql),
                rollback: parsed.rollback_sql.map(ScriptAction::Sql),
                ..Default::default()
            },
            self.variables.clone(),
        )?;

        Ok(Migration {
            location: location.clone(),
            script,
            checksum,
        })
    }

    fn load_native(&self, location: &Location, native: &Arc<dyn NativeScript>) -> EngineResult<Migration> {
        let checksum = Checksum::of_str(&native.canonical_source());
        let script = Script::assemble(
            location,
            native.meta(),
            ScriptOrigin::Native,
            ScriptActions {
                migrate: native.migrate_action().map(ScriptAction::Native),
                rollback: native.rollback_action().map(ScriptAction::Native),
                pre_deploy_commit: native.pre_deploy_commit().map(ScriptAction::Native),
                pre_deploy_revert: native.pre_deploy_revert().map(ScriptAction::Native),
            },
            HashMap::new(),
        )?;

        Ok(Migration {
            location: location.clone(),
            script,
            checksum,
        })
    }

    fn load(&self, location: &Location) -> EngineResult<Migration> {
        if let Some(native) = self.natives.get(location) {
            return self.load_native(location, native);
        }
        let path = self.root.join(location.as_str());
        if !path.is_file() {
            return Err(EngineError::NotFound(location.to_string()));
        }
        self.load_sql(location, &path)
    }
}

impl MigrationStore for DirectoryStore {
    fn iterate(&self) -> EngineResult<MigrationIter<'_>> {
        let locations = self.sorted_locations()?;
        Ok(Box::new(
            locations.into_iter().map(move |location| self.load(&location)),
        ))
    }

    fn get(&self, location: &Location) -> EngineResult<Migration> {
        self.load(location)
    }
}

fn collect_sql_files(root: &Path, dir: &Path, out: &mut Vec<Location>) -> EngineResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| EngineError::Store(format!("failed to read '{}': {}", dir.display(), e)))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| EngineError::Store(format!("failed to read directory entry: {}", e)))?;
        let path = entry.path();
        if path.is_dir() {
            collect_sql_files(root, &path, out)?;
        } else if path.extension().map_or(false, |ext| ext == "sql") {
            let relative = path.strip_prefix(root).map_err(|e| {
                EngineError::Store(format!("path outside store root: {}", e))
            })?;
            let mut name = relative.to_string_lossy().into_owned();
            if std::path::MAIN_SEPARATOR != '/' {
                name = name.replace(std::path::MAIN_SEPARATOR, "/");
            }
            out.push(Location::new(name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{MigratePolicy, NativeAction, ScriptMeta};
    use crate::session::Session;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    struct NoopAction;

    #[async_trait]
    impl NativeAction for NoopAction {
        async fn execute(&self, _session: &dyn Session) -> EngineResult<()> {
            Ok(())
        }
    }

    struct Seeder {
        migratable: bool,
    }

    impl NativeScript for Seeder {
        fn meta(&self) -> ScriptMeta {
            ScriptMeta {
                author: "alice".to_string(),
                authored_at: Utc::now(),
                description: "seed reference rows".to_string(),
                policy: MigratePolicy::Once,
            }
        }

        fn canonical_source(&self) -> String {
            "seed reference rows v1".to_string()
        }

        fn migrate_action(&self) -> Option<Arc<dyn NativeAction>> {
            if self.migratable {
                Some(Arc::new(NoopAction))
            } else {
                None
            }
        }
    }

    fn write_script(dir: &TempDir, name: &str, body: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn script_text(description: &str, sql: &str) -> String {
        format!(
            "-- @author alice\n\
             -- @authored_at 2024-02-01 09:30:00\n\
             -- @description {}\n\
             -- @migrate_policy ONCE\n\
             -- @migrate\n\
             {}\n\
             -- @rollback\n\
             DROP TABLE t;\n",
            description, sql
        )
    }

    #[test]
    fn iterates_in_ascending_location_order() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "v2/002_b.sql", &script_text("b", "CREATE TABLE b;"));
        write_script(&dir, "v1/001_a.sql", &script_text("a", "CREATE TABLE a;"));
        write_script(&dir, "v1/002_c.sql", &script_text("c", "CREATE TABLE c;"));

        let store = DirectoryStore::new(dir.path());
        let locations: Vec<String> = store
            .iterate()
            .unwrap()
            .map(|m| m.unwrap().location.to_string())
            .collect();
        assert_eq!(locations, vec!["v1/001_a.sql", "v1/002_c.sql", "v2/002_b.sql"]);
    }

    #[test]
    fn get_unknown_location_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        assert!(matches!(
            store.get(&Location::new("missing.sql")),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn checksum_covers_resolved_template_bytes() {
        let dir = TempDir::new().unwrap();
        write_script(
            &dir,
            "001.sql",
            &script_text("templated", "CREATE TABLE ${schema}.t;"),
        );

        let vars_a: HashMap<String, String> =
            [("schema".to_string(), "app".to_string())].into_iter().collect();
        let vars_b: HashMap<String, String> =
            [("schema".to_string(), "other".to_string())].into_iter().collect();

        let a = DirectoryStore::new(dir.path())
            .with_variables(vars_a)
            .get(&Location::new("001.sql"))
            .unwrap();
        let b = DirectoryStore::new(dir.path())
            .with_variables(vars_b)
            .get(&Location::new("001.sql"))
            .unwrap();

        assert_ne!(a.checksum, b.checksum);
        match a.script.migrate_action().unwrap() {
            ScriptAction::Sql(sql) => assert!(sql.contains("app.t")),
            other => panic!("expected sql action, got {:?}", other),
        }
    }

    #[test]
    fn unresolved_variables_pass_through() {
        let dir = TempDir::new().unwrap();
        write_script(
            &dir,
            "001.sql",
            &script_text("untemplated", "SELECT ${not_defined};"),
        );
        let migration = DirectoryStore::new(dir.path())
            .get(&Location::new("001.sql"))
            .unwrap();
        match migration.script.migrate_action().unwrap() {
            ScriptAction::Sql(sql) => assert!(sql.contains("${not_defined}")),
            other => panic!("expected sql action, got {:?}", other),
        }
    }

    #[test]
    fn malformed_script_fails_with_its_location() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "bad.sql", "SELECT 1;\n");
        let err = DirectoryStore::new(dir.path())
            .get(&Location::new("bad.sql"))
            .unwrap_err();
        match err {
            EngineError::Validation { location, .. } => assert_eq!(location, "bad.sql"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn native_with_no_direction_is_rejected_at_registration() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryStore::new(dir.path())
            .register_native("seed_reference_rows", Arc::new(Seeder { migratable: false }))
            .unwrap_err();
        match err {
            EngineError::Validation { location, message } => {
                assert_eq!(location, "seed_reference_rows");
                assert!(message.contains("at least one of migrate and rollback"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn native_checksum_covers_the_canonical_source() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "001.sql", &script_text("a", "CREATE TABLE a;"));
        let store = DirectoryStore::new(dir.path())
            .register_native("seed_reference_rows", Arc::new(Seeder { migratable: true }))
            .unwrap();

        let migration = store.get(&Location::new("seed_reference_rows")).unwrap();
        assert_eq!(migration.checksum, Checksum::of_str("seed reference rows v1"));
        assert_eq!(migration.script.origin(), ScriptOrigin::Native);
        assert!(migration.script.can_migrate());
        assert!(!migration.script.can_rollback());

        // Natives iterate alongside SQL files in Location order.
        let locations: Vec<String> = store
            .iterate()
            .unwrap()
            .map(|m| m.unwrap().location.to_string())
            .collect();
        assert_eq!(locations, vec!["001.sql", "seed_reference_rows"]);
    }

    #[test]
    fn non_sql_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_script(&dir, "001.sql", &script_text("a", "CREATE TABLE a;"));
        fs::write(dir.path().join("README.md"), "notes").unwrap();

        let store = DirectoryStore::new(dir.path());
        assert_eq!(store.iterate().unwrap().count(), 1);
    }
}
