//! Control-plane trait and request/response types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;

/// Account identity the ambient credentials resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Capability acknowledgements required by some resource graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Named IAM resources
    NamedIam,
    /// Macro and nested-stack transform expansion
    AutoExpand,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stack deployment submitted to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeployRequest {
    pub stack_name: String,
    /// Fully resolved template on local disk
    pub template_file: PathBuf,
    pub parameters: Vec<(String, String)>,
    pub tags: Vec<(String, String)>,
    pub capabilities: Vec<Capability>,
}

impl StackDeployRequest {
    pub fn new(stack_name: impl Into<String>, template_file: impl Into<PathBuf>) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_file: template_file.into(),
            parameters: Vec::new(),
            tags: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn parameters(mut self, parameters: Vec<(String, String)>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Parameters rendered as `name=value`.
    pub fn parameter_overrides(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }

    /// Tags rendered as `key=value`.
    pub fn tag_pairs(&self) -> Vec<String> {
        self.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Terminal result of a stack deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployOutcome {
    Created,
    Updated,
    /// The submitted state matched what is deployed.
    NoChanges,
    /// The control plane rejected or rolled back the deployment.
    Failed(String),
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeployOutcome::Failed(_))
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Created => write!(f, "created"),
            DeployOutcome::Updated => write!(f, "updated"),
            DeployOutcome::NoChanges => write!(f, "no changes"),
            DeployOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Metadata of a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub stack_name: String,
    pub status: String,
    pub outputs: BTreeMap<String, String>,
}

impl StackDescription {
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}

/// Result of an idempotent bucket creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

/// Counts reported by a directory sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub deleted: usize,
}

/// Settings for registering an identity provider directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    pub url: String,
    pub client_ids: Vec<String>,
    pub thumbprints: Vec<String>,
}

/// Narrow interface to the remote control plane.
///
/// Calls block until the remote side reaches a terminal state. Failures
/// are returned as-is; implementations never retry.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Whether mutating calls are only logged, not executed.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Resolve the ambient credentials to an account identity.
    async fn caller_identity(&self) -> RemoteResult<CallerIdentity>;

    /// Create a bucket, treating "already exists" as success.
    async fn create_bucket(&self, bucket: &str, region: &str) -> RemoteResult<BucketStatus>;

    /// Upload local artifacts referenced by `template` to `bucket` and write
    /// the rewritten template to `output`.
    async fn package_template(
        &self,
        template: &Path,
        bucket: &str,
        output: &Path,
    ) -> RemoteResult<PathBuf>;

    /// Deploy a stack and wait for a terminal state.
    async fn deploy_stack(&self, request: &StackDeployRequest) -> RemoteResult<DeployOutcome>;

    /// Describe a stack; `None` when it does not exist.
    async fn describe_stack(&self, stack_name: &str) -> RemoteResult<Option<StackDescription>>;

    /// ARNs of the registered identity providers.
    async fn list_identity_providers(&self) -> RemoteResult<Vec<String>>;

    /// Register an identity provider and return its ARN.
    async fn create_identity_provider(
        &self,
        provider: &IdentityProviderConfig,
    ) -> RemoteResult<String>;

    /// Mirror `local_dir` into `bucket`.
    async fn sync_directory(
        &self,
        local_dir: &Path,
        bucket: &str,
        delete: bool,
    ) -> RemoteResult<SyncSummary>;

    /// Request cache invalidation and return the invalidation id.
    async fn invalidate_paths(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> RemoteResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_request_builder() {
        let request = StackDeployRequest::new("site-dev", "build/packaged-template.yaml")
            .parameter("SubDomain", "dev")
            .tag("Environment", "dev")
            .capability(Capability::NamedIam)
            .capability(Capability::AutoExpand)
            .capability(Capability::NamedIam);

        assert_eq!(request.parameter_overrides(), vec!["SubDomain=dev".to_string()]);
        assert_eq!(request.tag_pairs(), vec!["Environment=dev".to_string()]);
        assert_eq!(
            request.capabilities,
            vec![Capability::NamedIam, Capability::AutoExpand]
        );
    }

    #[test]
    fn test_deploy_outcome_success() {
        assert!(DeployOutcome::Created.is_success());
        assert!(DeployOutcome::NoChanges.is_success());
        assert!(!DeployOutcome::Failed("rollback".to_string()).is_success());
        assert_eq!(DeployOutcome::NoChanges.to_string(), "no changes");
    }
}
