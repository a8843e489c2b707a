// src/nix/search.rs

//! Parsing and ranking of `nix search --json` output
//!
//! The output is a JSON object keyed by attribute path
//! (`legacyPackages.x86_64-linux.hello`) whose values carry `pname`,
//! `version` and `description`. Candidates are scored against the search
//! term and returned best first.

use crate::error::{Error, Result};
use crate::packages::{PackageInfo, UNKNOWN_VERSION};
use serde_json::Value;

/// Maximum number of results returned by a search
pub const MAX_RESULTS: usize = 30;

const SCORE_EXACT: u32 = 100;
const SCORE_NAME_MATCH: u32 = 40;
const SCORE_DESCRIPTION_MATCH: u32 = 2;
const BONUS_TOP_LEVEL: u32 = 10;
const BONUS_VERSIONED_VARIANT: u32 = 5;

/// A search result with its relevance score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub attr_path: String,
    pub score: u32,
    pub package: PackageInfo,
}

/// Parse raw search output into packages, preserving enumeration order
pub fn parse_search_output(stdout: &str) -> Result<Vec<(String, PackageInfo)>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(stdout)
        .map_err(|e| Error::Parse(format!("search output is not JSON: {}", e)))?;
    let entries = value
        .as_object()
        .ok_or_else(|| Error::Parse("search output is not a JSON object".to_string()))?;

    entries
        .iter()
        .map(|(attr_path, meta)| {
            let package = parse_entry(attr_path, meta)?;
            Ok((attr_path.clone(), package))
        })
        .collect()
}

fn parse_entry(attr_path: &str, meta: &Value) -> Result<PackageInfo> {
    let name = attr_name(attr_path);
    if name.is_empty() {
        return Err(Error::Parse(format!("empty attribute path '{}'", attr_path)));
    }

    let pname = required_str(meta, "pname", attr_path)?;
    let version = required_str(meta, "version", attr_path)?;

    Ok(PackageInfo {
        name: name.to_string(),
        pname: pname.to_string(),
        version: if version.is_empty() {
            UNKNOWN_VERSION.to_string()
        } else {
            version.to_string()
        },
        description: optional_str(meta, "description"),
        license: optional_str(meta, "license"),
        package_type: optional_str(meta, "type"),
    })
}

fn required_str<'a>(meta: &'a Value, field: &str, attr_path: &str) -> Result<&'a str> {
    meta.get(field).and_then(Value::as_str).ok_or_else(|| {
        Error::Parse(format!(
            "search entry '{}' has no string field '{}'",
            attr_path, field
        ))
    })
}

fn optional_str(meta: &Value, field: &str) -> Option<String> {
    meta.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Last segment of an attribute path after the system
///
/// `legacyPackages.x86_64-linux.python3Packages.numpy` -> `numpy`
pub fn attr_name(attr_path: &str) -> &str {
    attr_path.rsplit('.').next().unwrap_or(attr_path)
}

/// Packages that sit directly under `legacyPackages.<system>`
fn is_top_level(attr_path: &str) -> bool {
    let segments: Vec<&str> = attr_path.split('.').collect();
    segments.len() == 3 && segments[0] == "legacyPackages"
}

/// `python310` or `nodejs_20` for the term `python` / `nodejs`
fn is_versioned_variant(name: &str, term: &str) -> bool {
    name.len() > term.len()
        && name.starts_with(term)
        && name[term.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '_' || c == '-')
}

/// Relevance of one candidate for a (lowercased) term
pub fn score_candidate(attr_path: &str, package: &PackageInfo, term: &str) -> u32 {
    if term.is_empty() {
        return 1;
    }

    let name = package.name.to_lowercase();
    let base = if name == term {
        SCORE_EXACT
    } else if name.contains(term) {
        SCORE_NAME_MATCH
    } else if package
        .description
        .as_deref()
        .is_some_and(|d| d.to_lowercase().contains(term))
    {
        SCORE_DESCRIPTION_MATCH
    } else {
        return 0;
    };

    let mut score = base;
    if is_top_level(attr_path) {
        score += BONUS_TOP_LEVEL;
    }
    if is_versioned_variant(&name, term) {
        score += BONUS_VERSIONED_VARIANT;
    }
    score
}

/// Score, filter and order candidates
///
/// Candidates scoring zero are dropped. Ties keep their original order.
pub fn rank(term: &str, candidates: Vec<(String, PackageInfo)>) -> Vec<ScoredCandidate> {
    let term = term.trim().to_lowercase();

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter_map(|(attr_path, package)| {
            let score = score_candidate(&attr_path, &package, &term);
            (score > 0).then_some(ScoredCandidate {
                attr_path,
                score,
                package,
            })
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(MAX_RESULTS);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pname: &str, version: &str, description: &str) -> Value {
        serde_json::json!({"pname": pname, "version": version, "description": description})
    }

    fn output(entries: &[(&str, Value)]) -> String {
        let mut map = serde_json::Map::new();
        for (path, meta) in entries {
            map.insert(path.to_string(), meta.clone());
        }
        Value::Object(map).to_string()
    }

    #[test]
    fn test_parse_search_output() {
        let raw = output(&[
            ("legacyPackages.x86_64-linux.hello", entry("hello", "2.12.1", "Hello world")),
            ("legacyPackages.x86_64-linux.jq", entry("jq", "", "")),
        ]);
        let parsed = parse_search_output(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].1.name, "hello");
        assert_eq!(parsed[0].1.description.as_deref(), Some("Hello world"));
        assert_eq!(parsed[1].1.version, UNKNOWN_VERSION);
        assert!(parsed[1].1.description.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let raw = r#"{"legacyPackages.x86_64-linux.hello": {"description": "x"}}"#;
        assert!(matches!(parse_search_output(raw), Err(Error::Parse(_))));

        assert!(matches!(parse_search_output("[1, 2]"), Err(Error::Parse(_))));
        assert!(matches!(parse_search_output("not json"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_python_versioned_variants_outrank_substring() {
        let raw = output(&[
            ("legacyPackages.x86_64-linux.somepythonlib", entry("somepythonlib", "1.0", "")),
            ("legacyPackages.x86_64-linux.python310", entry("python3", "3.10.14", "")),
            ("legacyPackages.x86_64-linux.python311full", entry("python3", "3.11.9", "")),
            ("legacyPackages.x86_64-linux.ruby", entry("ruby", "3.3.0", "")),
        ]);
        let ranked = rank("python", parse_search_output(&raw).unwrap());
        let names: Vec<_> = ranked.iter().map(|c| c.package.name.as_str()).collect();

        assert_eq!(names, vec!["python310", "python311full", "somepythonlib"]);
        assert!(ranked[0].score > ranked[2].score);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let candidates = vec![
            ("legacyPackages.x86_64-linux.git-lfs".to_string(), PackageInfo::new("git-lfs", "3.4")),
            ("legacyPackages.x86_64-linux.git".to_string(), PackageInfo::new("git", "2.44.0")),
        ];
        let ranked = rank("git", candidates);
        assert_eq!(ranked[0].package.name, "git");
        assert_eq!(ranked[0].score, SCORE_EXACT + BONUS_TOP_LEVEL);
    }

    #[test]
    fn test_equal_scores_keep_enumeration_order() {
        let candidates: Vec<_> = ["alpha-tool", "beta-tool", "gamma-tool"]
            .iter()
            .map(|n| {
                (
                    format!("legacyPackages.x86_64-linux.{}", n),
                    PackageInfo::new(*n, "1.0"),
                )
            })
            .collect();
        let ranked = rank("tool", candidates);
        let names: Vec<_> = ranked.iter().map(|c| c.package.name.as_str()).collect();
        assert_eq!(names, vec!["alpha-tool", "beta-tool", "gamma-tool"]);
    }

    #[test]
    fn test_nested_attribute_gets_no_namespace_bonus() {
        let top = PackageInfo::new("numpy", "1.26");
        assert_eq!(
            score_candidate("legacyPackages.x86_64-linux.python3Packages.numpy", &top, "numpy"),
            SCORE_EXACT
        );
    }

    #[test]
    fn test_description_only_match() {
        let mut pkg = PackageInfo::new("rg", "14.1");
        pkg.description = Some("Recursively search directories with ripgrep".to_string());
        assert_eq!(
            score_candidate("legacyPackages.x86_64-linux.rg", &pkg, "ripgrep"),
            SCORE_DESCRIPTION_MATCH + BONUS_TOP_LEVEL
        );
    }

    #[test]
    fn test_results_are_truncated() {
        let candidates: Vec<_> = (0..50)
            .map(|i| {
                let name = format!("lib{}", i);
                (format!("legacyPackages.x86_64-linux.{}", name), PackageInfo::new(name, "1"))
            })
            .collect();
        assert_eq!(rank("lib", candidates).len(), MAX_RESULTS);
    }

    #[test]
    fn test_empty_term_matches_everything() {
        let candidates = vec![
            ("legacyPackages.x86_64-linux.a".to_string(), PackageInfo::new("a", "1")),
            ("legacyPackages.x86_64-linux.b".to_string(), PackageInfo::new("b", "1")),
        ];
        assert_eq!(rank("", candidates).len(), 2);
    }
}
