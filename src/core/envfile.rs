//! Environment-file parsing.
//!
//! One `KEY=VALUE` assignment per line. Blank lines and lines beginning
//! with `#` are ignored, an optional `export ` prefix is stripped, and
//! matching surrounding quotes are removed from values. Later duplicates
//! override earlier ones; insertion order is preserved.

use indexmap::IndexMap;
use std::path::Path;

/// Load and parse an environment file.
pub fn load(path: &Path) -> Result<IndexMap<String, String>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read env file {}: {}", path.display(), e))?;
    parse(&content)
}

/// Parse env-file content into an ordered map.
pub fn parse(content: &str) -> Result<IndexMap<String, String>, String> {
    let mut vars = IndexMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: missing '=' in assignment", idx + 1))?;

        let key = key.trim();
        if !is_valid_key(key) {
            return Err(format!("line {}: invalid variable name \"{}\"", idx + 1, key));
        }

        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(vars)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip one pair of matching surrounding quotes, if present.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
