//! Tolerant extraction of stack outputs.
//!
//! Missing outputs are warnings here. Callers that need a value for a
//! later mutating step turn absence into an error with
//! [`OutputReport::require`].

use std::fmt;
use std::sync::Arc;

use pilot_runner::ControlPlane;
use serde::Serialize;
use tracing::warn;

use crate::error::{remote, PilotError, PilotResult};

/// Outputs the orchestrator reads from an environment stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutputKey {
    Bucket,
    Distribution,
    DomainName,
}

impl OutputKey {
    /// Output key as declared by the template.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKey::Bucket => "WebsiteBucketName",
            OutputKey::Distribution => "CloudFrontDistributionId",
            OutputKey::DomainName => "WebsiteDomainName",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputKey::Bucket => "bucket",
            OutputKey::Distribution => "distribution",
            OutputKey::DomainName => "domain name",
        }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Treat blank values and the CLI's `None` placeholder as absent.
pub fn present(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none"))
}

/// Best-effort view of a stack's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputReport {
    pub stack_name: String,
    pub bucket: Option<String>,
    pub distribution_id: Option<String>,
    pub domain_name: Option<String>,
    pub warnings: Vec<String>,
}

impl OutputReport {
    pub fn get(&self, key: OutputKey) -> Option<&str> {
        match key {
            OutputKey::Bucket => self.bucket.as_deref(),
            OutputKey::Distribution => self.distribution_id.as_deref(),
            OutputKey::DomainName => self.domain_name.as_deref(),
        }
    }

    /// Value of `key`, or an error when a later step depends on it.
    pub fn require(&self, key: OutputKey) -> PilotResult<&str> {
        self.get(key).ok_or_else(|| PilotError::MissingOutput {
            stack: self.stack_name.clone(),
            key: key.as_str().to_string(),
        })
    }

    /// Public URL of the site, when the domain is known.
    pub fn website_url(&self) -> Option<String> {
        self.domain_name.as_ref().map(|d| format!("https://{}", d))
    }
}

/// Reads outputs of deployed stacks.
pub struct OutputExtractor {
    client: Arc<dyn ControlPlane>,
}

impl OutputExtractor {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }

    /// Extract the keys of interest from `stack_name`.
    ///
    /// Fails only when the stack itself does not exist.
    pub async fn extract(&self, stack_name: &str) -> PilotResult<OutputReport> {
        let stack = self
            .client
            .describe_stack(stack_name)
            .await
            .map_err(remote(format!("describe stack {}", stack_name)))?
            .ok_or_else(|| PilotError::StackNotFound(stack_name.to_string()))?;

        let mut warnings = Vec::new();
        let mut lookup = |key: OutputKey| {
            let value = present(stack.output(key.as_str())).map(str::to_string);
            if value.is_none() {
                warn!(stack = stack_name, key = key.as_str(), "Stack output is missing");
                warnings.push(format!(
                    "Stack {} has no {} output ({})",
                    stack_name,
                    key.label(),
                    key.as_str()
                ));
            }
            value
        };

        let bucket = lookup(OutputKey::Bucket);
        let distribution_id = lookup(OutputKey::Distribution);
        let domain_name = lookup(OutputKey::DomainName);

        Ok(OutputReport {
            stack_name: stack_name.to_string(),
            bucket,
            distribution_id,
            domain_name,
            warnings,
        })
    }
}
