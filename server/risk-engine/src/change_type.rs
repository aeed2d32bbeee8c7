//! Change classification derived from file paths.

use crate::types::ChangeType;

const DATABASE_EXTENSIONS: &[&str] = &[".sql", ".ddl"];
const DATABASE_MARKERS: &[&str] = &["migration", "schema"];
const CONFIG_EXTENSIONS: &[&str] = &[".yaml", ".yml", ".json", ".xml", ".conf", ".ini"];
const CRITICAL_PATTERNS: &[&str] = &[
  "auth",
  "security",
  "payment",
  "user",
  "admin",
  "database",
  "migration",
  "config",
  "core",
];

/// Change type from path (database wins over config, config over code).
pub fn classify_change_type(path: &str) -> ChangeType {
  let p = path.to_lowercase();
  if DATABASE_EXTENSIONS.iter().any(|ext| p.ends_with(ext))
    || DATABASE_MARKERS.iter().any(|m| p.contains(m))
  {
    return ChangeType::Database;
  }
  if CONFIG_EXTENSIONS.iter().any(|ext| p.ends_with(ext)) {
    return ChangeType::Config;
  }
  ChangeType::Code
}

/// Critical if any path segment pattern matches (substring, case-insensitive).
pub fn is_critical_path(path: &str) -> bool {
  let p = path.to_lowercase();
  CRITICAL_PATTERNS.iter().any(|pattern| p.contains(pattern))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sql_and_migrations_are_database() {
    assert_eq!(classify_change_type("db/001_init.sql"), ChangeType::Database);
    assert_eq!(classify_change_type("ddl/Tables.DDL"), ChangeType::Database);
    assert_eq!(classify_change_type("app/migrations/0002_add.py"), ChangeType::Database);
    assert_eq!(classify_change_type("api/schema.graphql"), ChangeType::Database);
  }

  #[test]
  fn structured_files_are_config() {
    for path in ["deploy.yaml", "ci.yml", "package.json", "pom.xml", "nginx.conf", "setup.ini"] {
      assert_eq!(classify_change_type(path), ChangeType::Config, "{}", path);
    }
  }

  #[test]
  fn database_marker_beats_config_extension() {
    assert_eq!(classify_change_type("schema/users.json"), ChangeType::Database);
  }

  #[test]
  fn everything_else_is_code() {
    assert_eq!(classify_change_type("src/lib.rs"), ChangeType::Code);
    assert_eq!(classify_change_type("README.md"), ChangeType::Code);
  }

  #[test]
  fn critical_patterns_match_case_insensitively() {
    assert!(is_critical_path("src/Auth/login.py"));
    assert!(is_critical_path("services/payments/charge.go"));
    assert!(is_critical_path("app/core/engine.rs"));
    assert!(!is_critical_path("docs/guide.md"));
    assert!(!is_critical_path("src/utils/format.ts"));
  }
}
