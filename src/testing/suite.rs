//! Suite definitions
//!
//! A suite is one JSON (or YAML) document holding an ordered list of cases.
//! Documents are templates: the fixture port is substituted into every
//! string, at any depth, when a suite is paired with a running fixture site.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assertion::Assertion;
use crate::common::{Error, Result};
use crate::fixture::corpus::PORT_PLACEHOLDER;

/// A named, ordered collection of test cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    /// Suite name
    pub suite: String,
    /// What the suite covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cases in execution order
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

/// A single declarative test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub action: Action,
    /// Checked in order; the first failure ends the case
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

/// The protocol call a case performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub method: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Action {
    pub fn new(method: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

impl Suite {
    /// Copy of the suite with the fixture port substituted into every case
    pub fn with_port(&self, port: u16) -> Suite {
        Suite {
            suite: self.suite.clone(),
            description: self.description.clone(),
            cases: self.cases.iter().map(|case| case.with_port(port)).collect(),
        }
    }
}

impl TestCase {
    /// Copy of the case with `{{PORT}}` replaced in its args and expected values
    pub fn with_port(&self, port: u16) -> TestCase {
        let port = port.to_string();
        let mut case = self.clone();

        case.action.args = case
            .action
            .args
            .into_iter()
            .map(|(k, v)| (k, substitute(v, PORT_PLACEHOLDER, &port)))
            .collect();
        for assertion in &mut case.assertions {
            let value = std::mem::take(&mut assertion.value);
            assertion.value = substitute(value, PORT_PLACEHOLDER, &port);
        }
        case
    }
}

/// Replace `token` in every string of a JSON tree
///
/// Numbers, booleans, nulls and keys pass through unchanged.
pub fn substitute(value: Value, token: &str, replacement: &str) -> Value {
    match value {
        Value::String(s) if s.contains(token) => Value::String(s.replace(token, replacement)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| substitute(v, token, replacement))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute(v, token, replacement)))
                .collect(),
        ),
        other => other,
    }
}

/// Suite file extensions, in lookup order
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Find the file for a named suite (`test_<name>.json|yaml|yml`)
pub fn resolve_suite(dir: &Path, name: &str) -> Result<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("test_{}.{}", name, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::SuiteNotFound {
            name: name.to_string(),
            dir: dir.to_path_buf(),
        })
}

/// Load and parse a suite file
///
/// The format is chosen by extension; anything that is not YAML is JSON.
pub fn load_suite(path: &Path) -> Result<Suite> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let parsed = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    };

    parsed.map_err(|error| Error::SuiteParse {
        path: path.display().to_string(),
        error,
    })
}

/// List suites in a directory as `(name, path)`, sorted by name
///
/// When a name exists in several formats, the first extension in lookup
/// order wins.
pub fn discover_suites(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::FileRead {
        path: dir.display().to_string(),
        error: e.to_string(),
    })?;

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = suite_name(&path) else {
            continue;
        };
        if found.iter().any(|(existing, _)| existing == &name) {
            continue;
        }
        if let Ok(preferred) = resolve_suite(dir, &name) {
            found.push((name, preferred));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Suite name from a `test_<name>.<ext>` file path
fn suite_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !EXTENSIONS.contains(&ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("test_")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
