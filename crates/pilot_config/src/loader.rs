//! Configuration document loader.
//!
//! Reads JSON (canonical) or YAML documents, detects the layout and
//! validates in a fixed order: document parses, shared section present,
//! environment present, parameters present.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{DeployConfig, EnvironmentConfig, SharedSettings};

const SHARED_KEY: &str = "shared";
const ENVIRONMENTS_KEY: &str = "environments";
const LEGACY_SHARED_KEY: &str = "_shared";

/// Layout of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLayout {
    /// `shared` plus an `environments` map.
    Canonical,
    /// Environments keyed at the root next to a `_shared` entry.
    LegacyFlat,
}

pub(crate) fn load(path: &Path) -> ConfigResult<DeployConfig> {
    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::malformed(path, format!("unreadable: {}", e)))?;

    parse(path, &content)
}

pub(crate) fn parse(path: &Path, content: &str) -> ConfigResult<DeployConfig> {
    let Value::Object(mut root) = parse_document(path, content)? else {
        return Err(ConfigError::malformed(path, "document root must be an object"));
    };

    let layout = detect_layout(path, &root)?;
    debug!("Loading {} with {:?} layout", path.display(), layout);

    let (shared_key, shared, environments) = match layout {
        DocumentLayout::Canonical => {
            let shared = root.remove(SHARED_KEY);
            let environments = match root.remove(ENVIRONMENTS_KEY) {
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(ConfigError::malformed(
                        path,
                        "`environments` must be an object",
                    ))
                }
                None => Map::new(),
            };
            (SHARED_KEY, shared, environments)
        }
        DocumentLayout::LegacyFlat => {
            warn!(
                "{} uses the legacy flat layout; move environments under `environments` and `_shared` to `shared`",
                path.display()
            );
            let shared = root.remove(LEGACY_SHARED_KEY);
            (LEGACY_SHARED_KEY, shared, root)
        }
    };

    let shared = shared
        .ok_or_else(|| ConfigError::malformed(path, format!("missing `{}` section", shared_key)))?;
    let shared: SharedSettings = serde_json::from_value(shared).map_err(|e| {
        ConfigError::malformed(path, format!("invalid `{}` section: {}", shared_key, e))
    })?;
    shared.validate(path)?;

    Ok(DeployConfig {
        path: path.to_path_buf(),
        layout,
        shared,
        environments: environments.into_iter().collect(),
    })
}

fn parse_document(path: &Path, content: &str) -> ConfigResult<Value> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)
            .map_err(|e| ConfigError::malformed(path, format!("invalid YAML: {}", e))),
        _ => serde_json::from_str(content)
            .map_err(|e| ConfigError::malformed(path, format!("invalid JSON: {}", e))),
    }
}

fn detect_layout(path: &Path, root: &Map<String, Value>) -> ConfigResult<DocumentLayout> {
    let canonical = root.contains_key(SHARED_KEY) || root.contains_key(ENVIRONMENTS_KEY);
    let legacy = root.contains_key(LEGACY_SHARED_KEY);

    match (canonical, legacy) {
        (true, true) => Err(ConfigError::malformed(
            path,
            "document mixes `shared`/`environments` with the legacy `_shared` layout",
        )),
        (false, true) => Ok(DocumentLayout::LegacyFlat),
        _ => Ok(DocumentLayout::Canonical),
    }
}

pub(crate) fn parse_environment(
    path: &Path,
    environment: &str,
    raw: &Value,
) -> ConfigResult<EnvironmentConfig> {
    let Value::Object(entry) = raw else {
        return Err(ConfigError::malformed(
            path,
            format!("environment '{}' must be an object", environment),
        ));
    };

    let parameters = match entry.get("parameters") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ConfigError::malformed(
                path,
                format!("parameters of environment '{}' must be an object", environment),
            ))
        }
        None => {
            return Err(ConfigError::malformed(
                path,
                format!("environment '{}' has no `parameters` section", environment),
            ))
        }
    };

    let mut resolved = BTreeMap::new();
    for (name, value) in parameters {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ConfigError::malformed(
                    path,
                    format!(
                        "parameter '{}' of environment '{}' must be a scalar",
                        name, environment
                    ),
                ))
            }
        };
        resolved.insert(name.clone(), value);
    }

    Ok(EnvironmentConfig {
        parameters: resolved,
    })
}
