//! Script template rendering
//!
//! Resolves `${name}` references in SQL script text against an explicit
//! variable map. Names with no binding pass through unchanged so that
//! database-native `${...}` syntax (and simple typos, which surface at
//! review time) never abort a load.

use std::collections::HashMap;

use regex::{Captures, Regex};

/// Substitute `${name}` references in `text` from `vars`.
///
/// Unresolved names are left exactly as written.
pub fn render(text: &str, vars: &HashMap<String, String>) -> String {
    // Compiled per call; script bodies are read once per deployment run.
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    pattern
        .replace_all(text, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Merge an explicit variable map over an injected environment map.
///
/// Explicit keys win. The environment map is supplied by the caller; the
/// renderer never reads process globals itself.
pub fn merge_variables(
    explicit: &HashMap<String, String>,
    environment: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = environment.clone();
    merged.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_names() {
        let out = render("CREATE TABLE ${schema}.users;", &vars(&[("schema", "app")]));
        assert_eq!(out, "CREATE TABLE app.users;");
    }

    #[test]
    fn unknown_names_pass_through() {
        let out = render("SELECT ${missing} FROM t;", &vars(&[]));
        assert_eq!(out, "SELECT ${missing} FROM t;");
    }

    #[test]
    fn substitutes_repeated_and_mixed_names() {
        let out = render(
            "${a} ${b} ${a} ${c}",
            &vars(&[("a", "1"), ("b", "2")]),
        );
        assert_eq!(out, "1 2 1 ${c}");
    }

    #[test]
    fn non_identifier_braces_are_untouched() {
        let out = render("${1bad} ${} $notbraced", &vars(&[("notbraced", "x")]));
        assert_eq!(out, "${1bad} ${} $notbraced");
    }

    #[test]
    fn explicit_variables_win_over_environment() {
        let merged = merge_variables(&vars(&[("k", "explicit")]), &vars(&[("k", "env"), ("e", "1")]));
        assert_eq!(merged.get("k").unwrap(), "explicit");
        assert_eq!(merged.get("e").unwrap(), "1");
    }
}
