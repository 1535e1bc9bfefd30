//! Minimal `.env` loader used for Compose/Dockerfile variable expansion.
//!
//! Reads `KEY=VALUE` lines, skipping blank lines and `#` comments. The
//! process environment always wins on collision (§4.2.3), so this only
//! fills in gaps the process environment doesn't already have.

use std::collections::HashMap;
use std::path::Path;

/// Build the environment map used by variable expansion: the union of the
/// process environment and an adjacent `.env` file, process env winning.
pub fn load_environment(env_file: &Path) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = parse_env_file(env_file).unwrap_or_default();

    for (key, value) in std::env::vars() {
        vars.insert(key, value);
    }

    vars
}

fn parse_env_file(path: &Path) -> Option<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path).ok()?;
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            let value = strip_surrounding_quotes(value.trim());
            vars.insert(key, value);
        }
    }

    Some(vars)
}

fn strip_surrounding_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_simple_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file, "IMAGE=busybox").unwrap();
        writeln!(file, "export QUOTED=\"hello world\"").unwrap();
        writeln!(file).unwrap();

        let vars = parse_env_file(file.path()).unwrap();
        assert_eq!(vars.get("IMAGE"), Some(&"busybox".to_string()));
        assert_eq!(vars.get("QUOTED"), Some(&"hello world".to_string()));
    }

    #[test]
    fn missing_env_file_yields_empty_map() {
        let vars = parse_env_file(Path::new("/nonexistent/.env"));
        assert!(vars.is_none());
    }
}
