//! Region identifier input files.
//!
//! One identifier per line. Surrounding whitespace is stripped, and blank
//! lines and `#` comments are ignored.

use crate::models::RegionKind;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Parse region ids from file content.
pub fn parse_region_ids(content: &str, kind: RegionKind) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }

        // County numbers are plain digits; tract ids are passed through as-is.
        if kind == RegionKind::County && !id.chars().all(|c| c.is_ascii_digit()) {
            bail!("Line {}: '{}' is not a numeric county number", index + 1, id);
        }

        debug!("Region id: {}", id);
        ids.push(id.to_string());
    }

    Ok(ids)
}

/// Read region ids from a file.
pub fn read_region_ids(path: &Path, kind: RegionKind) -> Result<Vec<String>> {
    info!("Reading region ids from {}", path.display());

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read region list: {}", path.display()))?;

    parse_region_ids(&content, kind)
        .with_context(|| format!("Invalid region list: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_strips_whitespace_and_terminators() {
        let ids = parse_region_ids("36005\r\n  36047 \n\n36061\t\n", RegionKind::County).unwrap();
        assert_eq!(ids, vec!["36005", "36047", "36061"]);
    }

    #[test]
    fn test_parse_skips_comments() {
        let content = "# Queens\n36081\n# Richmond\n36085\n";
        let ids = parse_region_ids(content, RegionKind::County).unwrap();
        assert_eq!(ids, vec!["36081", "36085"]);
    }

    #[test]
    fn test_non_numeric_county_rejected() {
        let err = parse_region_ids("36081\nQueens\n", RegionKind::County).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_tract_ids_are_opaque() {
        let ids = parse_region_ids("36081000100\n36081-0002.01\n", RegionKind::Tract).unwrap();
        assert_eq!(ids, vec!["36081000100", "36081-0002.01"]);
    }

    #[test]
    fn test_read_region_ids_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counties.txt");
        std::fs::write(&path, "36081\n36047\n").unwrap();

        let ids = read_region_ids(&path, RegionKind::County).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = read_region_ids(&dir.path().join("nope.txt"), RegionKind::County).unwrap_err();
        assert!(err.to_string().contains("Failed to read region list"));
    }
}
