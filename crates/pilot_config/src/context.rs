//! Resolved deployment context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::{GithubRepository, PathSettings, SharedSettings};

/// Pseudo-environment used by account-wide actions.
pub const SHARED_ENVIRONMENT: &str = "shared";

/// Bucket holding packaged templates: `{name}-cf-templates-{region}`.
pub fn package_bucket_name(name: &str, region: &str) -> String {
    format!("{}-cf-templates-{}", name, region)
}

/// Per-environment stack: `{name}-{environment}`.
pub fn stack_name(name: &str, environment: &str) -> String {
    format!("{}-{}", name, environment)
}

/// Identity/trust stack: `{name}-github-oidc`.
pub fn identity_stack_name(name: &str) -> String {
    format!("{}-github-oidc", name)
}

/// File locations with relative entries resolved against the config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPaths {
    pub template: PathBuf,
    pub identity_template: PathBuf,
    pub function_source: PathBuf,
    pub build_dir: PathBuf,
    pub content_dir: PathBuf,
}

impl ResolvedPaths {
    fn resolve(paths: &PathSettings, base_dir: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        };

        Self {
            template: join(&paths.template),
            identity_template: join(&paths.identity_template),
            function_source: join(&paths.function_source),
            build_dir: join(&paths.build_dir),
            content_dir: join(&paths.content_dir),
        }
    }

    /// Archive produced by the package step.
    pub fn function_archive(&self) -> PathBuf {
        self.build_dir.join("initial-content.zip")
    }

    /// Template rewritten with remote artifact locations.
    pub fn packaged_template(&self) -> PathBuf {
        self.build_dir.join("packaged-template.yaml")
    }
}

/// Everything one invocation needs to know about its target.
///
/// Computed once right after the configuration is loaded and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentContext {
    pub project_name: String,
    pub region: String,
    pub environment: String,
    /// `(name, value)` pairs, sorted by name
    pub parameters: Vec<(String, String)>,
    pub package_bucket_name: String,
    pub stack_name: String,
    pub identity_stack_name: String,
    pub github: GithubRepository,
    pub solution: String,
    pub paths: ResolvedPaths,
}

impl DeploymentContext {
    pub(crate) fn new(
        shared: &SharedSettings,
        environment: &str,
        parameters: BTreeMap<String, String>,
        base_dir: &Path,
    ) -> Self {
        Self {
            project_name: shared.name.clone(),
            region: shared.region.clone(),
            environment: environment.to_string(),
            parameters: parameters.into_iter().collect(),
            package_bucket_name: package_bucket_name(&shared.name, &shared.region),
            stack_name: stack_name(&shared.name, environment),
            identity_stack_name: identity_stack_name(&shared.name),
            github: shared.github.clone(),
            solution: shared.solution.clone(),
            paths: ResolvedPaths::resolve(&shared.paths, base_dir),
        }
    }

    /// Parameters rendered as `name=value`, in deterministic order.
    pub fn parameter_overrides(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }

    pub fn is_shared(&self) -> bool {
        self.environment == SHARED_ENVIRONMENT
    }
}
