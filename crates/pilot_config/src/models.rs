//! Configuration document models.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::{DeploymentContext, SHARED_ENVIRONMENT};
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{self, DocumentLayout};

/// Default value of the `Solution` tag applied to deployed stacks.
pub const DEFAULT_SOLUTION: &str = "stackpilot";

/// Source repository whose CI workflows are trusted by the identity stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepository {
    pub org: String,
    pub repo: String,
}

/// Local file locations used by the deployment actions.
///
/// Relative paths are resolved against the directory holding the
/// configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Root per-environment template
    pub template: PathBuf,
    /// Template of the identity/trust stack
    pub identity_template: PathBuf,
    /// Source of the initial-content function
    pub function_source: PathBuf,
    /// Staging and packaged output directory
    pub build_dir: PathBuf,
    /// Default local content directory for the `content` action
    pub content_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            template: PathBuf::from("infrastructure/main.yaml"),
            identity_template: PathBuf::from("infrastructure/github-oidc.yaml"),
            function_source: PathBuf::from("infrastructure/functions/initial-content"),
            build_dir: PathBuf::from("build"),
            content_dir: PathBuf::from("website"),
        }
    }
}

/// Settings shared by every environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSettings {
    /// Project name, prefix of every derived resource name
    pub name: String,
    /// Target region
    pub region: String,
    /// Repository identity used to scope the trust role
    pub github: GithubRepository,
    /// Value of the `Solution` stack tag
    #[serde(default = "default_solution")]
    pub solution: String,
    #[serde(default)]
    pub paths: PathSettings,
}

fn default_solution() -> String {
    DEFAULT_SOLUTION.to_string()
}

impl SharedSettings {
    /// Reject settings whose required fields are blank.
    pub fn validate(&self, path: &Path) -> ConfigResult<()> {
        let required = [
            ("shared.name", &self.name),
            ("shared.region", &self.region),
            ("shared.github.org", &self.github.org),
            ("shared.github.repo", &self.github.repo),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::malformed(path, format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Parameter set for a single environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub parameters: BTreeMap<String, String>,
}

/// A loaded configuration document.
///
/// Environment entries are kept as raw values and only validated when an
/// environment is resolved, so a broken entry for `prod` does not prevent
/// deploying `dev`.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub(crate) path: PathBuf,
    pub(crate) layout: DocumentLayout,
    pub(crate) shared: SharedSettings,
    pub(crate) environments: BTreeMap<String, serde_json::Value>,
}

impl DeployConfig {
    /// Load and validate the document at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        loader::load(path.as_ref())
    }

    /// Parse a document from an in-memory string.
    ///
    /// `path` is only used for format detection, error messages and
    /// resolving relative paths.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> ConfigResult<Self> {
        loader::parse(path.as_ref(), content)
    }

    /// Path of the loaded document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layout the document was written in.
    pub fn layout(&self) -> DocumentLayout {
        self.layout
    }

    pub fn shared(&self) -> &SharedSettings {
        &self.shared
    }

    /// Environment identifiers, sorted.
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Parameter set of `environment`.
    pub fn environment(&self, environment: &str) -> ConfigResult<EnvironmentConfig> {
        let raw = self
            .environments
            .get(environment)
            .ok_or_else(|| ConfigError::EnvironmentNotFound {
                environment: environment.to_string(),
                path: self.path.clone(),
                available: self.environment_names(),
            })?;
        loader::parse_environment(&self.path, environment, raw)
    }

    /// Resolve the context for a configured environment.
    pub fn resolve(&self, environment: &str) -> ConfigResult<DeploymentContext> {
        let env = self.environment(environment)?;
        Ok(DeploymentContext::new(
            &self.shared,
            environment,
            env.parameters,
            self.base_dir(),
        ))
    }

    /// Resolve a context for the `shared` pseudo-environment.
    ///
    /// Used by account-wide actions that are not tied to an entry of the
    /// environment map. The resulting context has no parameters.
    pub fn resolve_shared(&self) -> DeploymentContext {
        DeploymentContext::new(
            &self.shared,
            SHARED_ENVIRONMENT,
            BTreeMap::new(),
            self.base_dir(),
        )
    }

    fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}
