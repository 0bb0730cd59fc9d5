//! Tagged SQL script parsing
//!
//! The text format, bit-exact: a leading documentation-comment block with
//! four required tags (`@author`, `@authored_at`, `@description`,
//! `@migrate_policy`, one per line, tag then value), followed by one or
//! two section markers, a line-leading comment token then `@migrate` or
//! `@rollback`. Everything from a marker to the next marker (or end of
//! file) is that section's SQL text. Zero markers is a validation error,
//! as is a duplicated marker; one marker yields a one-directional script.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::location::Location;
use crate::script::{MigratePolicy, ScriptMeta};

/// Line comment token introducing tags and section markers.
const COMMENT_TOKEN: &str = "--";

const TAG_AUTHOR: &str = "@author";
const TAG_AUTHORED_AT: &str = "@authored_at";
const TAG_DESCRIPTION: &str = "@description";
const TAG_POLICY: &str = "@migrate_policy";

const MARKER_MIGRATE: &str = "@migrate";
const MARKER_ROLLBACK: &str = "@rollback";

/// Parsed form of a tagged SQL script, before assembly into a `Script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    pub meta: ScriptMeta,
    pub migrate_sql: Option<String>,
    pub rollback_sql: Option<String>,
}

/// Parse resolved SQL text into metadata and direction sections.
pub fn parse_sql_script(location: &Location, text: &str) -> EngineResult<ParsedSql> {
    let meta = parse_header(location, text)?;
    let (migrate_sql, rollback_sql) = split_sections(location, text)?;
    Ok(ParsedSql {
        meta,
        migrate_sql,
        rollback_sql,
    })
}

fn parse_header(location: &Location, text: &str) -> EngineResult<ScriptMeta> {
    let mut tags: HashMap<&str, String> = HashMap::new();

    for line in text.lines() {
        let Some(comment) = comment_body(line) else {
            continue;
        };
        // Tags live above the first section marker.
        if comment == MARKER_MIGRATE || comment == MARKER_ROLLBACK {
            break;
        }
        let (tag, value) = match comment.split_once(char::is_whitespace) {
            Some((tag, value)) => (tag, value.trim()),
            None => (comment, ""),
        };
        for known in [TAG_AUTHOR, TAG_AUTHORED_AT, TAG_DESCRIPTION, TAG_POLICY] {
            if tag == known {
                tags.insert(known, value.to_string());
            }
        }
    }

    let author = required_tag(location, &tags, TAG_AUTHOR)?;
    let authored_at_raw = required_tag(location, &tags, TAG_AUTHORED_AT)?;
    let description = required_tag(location, &tags, TAG_DESCRIPTION)?;
    let policy_raw = required_tag(location, &tags, TAG_POLICY)?;

    let authored_at = parse_timestamp(&authored_at_raw).ok_or_else(|| {
        EngineError::validation(
            location,
            format!("@authored_at '{}' is not a valid timestamp", authored_at_raw),
        )
    })?;

    let policy: MigratePolicy = policy_raw
        .parse()
        .map_err(|message: String| EngineError::validation(location, message))?;

    Ok(ScriptMeta {
        author,
        authored_at,
        description,
        policy,
    })
}

fn required_tag(
    location: &Location,
    tags: &HashMap<&str, String>,
    tag: &str,
) -> EngineResult<String> {
    match tags.get(tag) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(EngineError::validation(
            location,
            format!("missing required tag {}", tag),
        )),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

/// Split the body at the section markers, in whichever order they appear.
///
/// A section runs from the end of its marker line to the start of the next
/// marker line, or to end of file.
fn split_sections(
    location: &Location,
    text: &str,
) -> EngineResult<(Option<String>, Option<String>)> {
    struct Marker<'a> {
        name: &'a str,
        line_start: usize,
        line_end: usize,
    }

    let mut markers: Vec<Marker<'_>> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(comment) = comment_body(line) {
            if comment == MARKER_MIGRATE || comment == MARKER_ROLLBACK {
                markers.push(Marker {
                    name: comment,
                    line_start: offset,
                    line_end: offset + line.len(),
                });
            }
        }
        offset += line.len();
    }

    if markers.is_empty() {
        return Err(EngineError::validation(
            location,
            "script has no @migrate or @rollback section",
        ));
    }
    if markers.len() > 2 {
        return Err(EngineError::validation(
            location,
            format!("expected at most two section markers, found {}", markers.len()),
        ));
    }
    if markers.len() == 2 && markers[0].name == markers[1].name {
        return Err(EngineError::validation(
            location,
            format!("duplicate {} marker", markers[0].name),
        ));
    }

    let mut migrate_sql = None;
    let mut rollback_sql = None;
    for (index, marker) in markers.iter().enumerate() {
        let end = markers
            .get(index + 1)
            .map(|next| next.line_start)
            .unwrap_or(text.len());
        let body = text[marker.line_end..end].trim().to_string();
        match marker.name {
            MARKER_MIGRATE => migrate_sql = Some(body),
            _ => rollback_sql = Some(body),
        }
    }

    Ok((migrate_sql, rollback_sql))
}

/// Strip the line-leading comment token; `None` for non-comment lines.
fn comment_body(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(COMMENT_TOKEN)
        .map(|rest| rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("v1/001_users.sql")
    }

    const FULL_SCRIPT: &str = "\
-- @author alice
-- @authored_at 2024-02-01 09:30:00
-- @description create users table
-- @migrate_policy ONCE

-- @migrate
CREATE TABLE users (id BIGINT PRIMARY KEY);

-- @rollback
DROP TABLE users;
";

    #[test]
    fn parses_header_and_both_sections() {
        let parsed = parse_sql_script(&loc(), FULL_SCRIPT).unwrap();
        assert_eq!(parsed.meta.author, "alice");
        assert_eq!(parsed.meta.description, "create users table");
        assert_eq!(parsed.meta.policy, MigratePolicy::Once);
        assert_eq!(
            parsed.migrate_sql.as_deref(),
            Some("CREATE TABLE users (id BIGINT PRIMARY KEY);")
        );
        assert_eq!(parsed.rollback_sql.as_deref(), Some("DROP TABLE users;"));
    }

    #[test]
    fn rollback_may_precede_migrate() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description reorder
-- @migrate_policy ONCHANGE
-- @rollback
DROP VIEW v;
-- @migrate
CREATE VIEW v AS SELECT 1;
";
        let parsed = parse_sql_script(&loc(), text).unwrap();
        assert_eq!(parsed.rollback_sql.as_deref(), Some("DROP VIEW v;"));
        assert_eq!(parsed.migrate_sql.as_deref(), Some("CREATE VIEW v AS SELECT 1;"));
    }

    #[test]
    fn rollback_only_script_is_one_directional() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description teardown only
-- @migrate_policy ONCE
-- @rollback
DROP TABLE t;
";
        let parsed = parse_sql_script(&loc(), text).unwrap();
        assert!(parsed.migrate_sql.is_none());
        assert_eq!(parsed.rollback_sql.as_deref(), Some("DROP TABLE t;"));
    }

    #[test]
    fn missing_tag_is_a_validation_error() {
        let text = "\
-- @author bob
-- @description missing bits
-- @migrate_policy ONCE
-- @migrate
SELECT 1;
";
        let err = parse_sql_script(&loc(), text).unwrap_err();
        match err {
            EngineError::Validation { location, message } => {
                assert_eq!(location, "v1/001_users.sql");
                assert!(message.contains("@authored_at"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn bad_timestamp_is_a_validation_error() {
        let text = "\
-- @author bob
-- @authored_at next tuesday
-- @description bad date
-- @migrate_policy ONCE
-- @migrate
SELECT 1;
";
        assert!(matches!(
            parse_sql_script(&loc(), text),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn unknown_policy_is_a_validation_error() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description bad policy
-- @migrate_policy WEEKLY
-- @migrate
SELECT 1;
";
        assert!(matches!(
            parse_sql_script(&loc(), text),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn zero_markers_is_a_validation_error() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description no sections
-- @migrate_policy ONCE
SELECT 1;
";
        assert!(matches!(
            parse_sql_script(&loc(), text),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn duplicate_marker_is_a_validation_error() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description twice
-- @migrate_policy ONCE
-- @migrate
SELECT 1;
-- @migrate
SELECT 2;
";
        let err = parse_sql_script(&loc(), text).unwrap_err();
        match err {
            EngineError::Validation { message, .. } => {
                assert!(message.contains("duplicate"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_rfc3339_authored_at() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01T12:00:00Z
-- @description rfc3339
-- @migrate_policy ALWAYS
-- @migrate
SELECT 1;
";
        let parsed = parse_sql_script(&loc(), text).unwrap();
        assert_eq!(parsed.meta.policy, MigratePolicy::Always);
    }

    #[test]
    fn empty_section_body_is_allowed() {
        let text = "\
-- @author bob
-- @authored_at 2024-03-01
-- @description empty body
-- @migrate_policy ONCE
-- @migrate
";
        let parsed = parse_sql_script(&loc(), text).unwrap();
        assert_eq!(parsed.migrate_sql.as_deref(), Some(""));
    }
}
