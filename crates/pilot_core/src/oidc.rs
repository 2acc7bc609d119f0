//! Registration of the CI identity provider and deploy role.
//!
//! The provider is account-wide and may already exist, created by another
//! project or by hand. It is looked up first and handed to the identity
//! stack, which imports it when given an ARN and creates it otherwise.

use std::sync::Arc;

use pilot_config::DeploymentContext;
use pilot_runner::{ControlPlane, DeployOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{remote, PilotError, PilotResult};
use crate::infra::{accept_outcome, stack_request};
use crate::outputs::present;

/// Host of the GitHub Actions token issuer.
pub const GITHUB_TOKEN_ISSUER: &str = "token.actions.githubusercontent.com";

/// Identity stack output holding the deploy role ARN.
pub const ROLE_OUTPUT_KEY: &str = "DeployRoleArn";
/// Identity stack output holding the provider ARN.
pub const PROVIDER_OUTPUT_KEY: &str = "OidcProviderArn";

/// Result of registering the trust relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OidcRegistration {
    pub stack_name: String,
    /// `None` only when a dry run previews a stack that does not exist yet
    pub role_arn: Option<String>,
    /// Provider in use, when known
    pub provider_arn: Option<String>,
    /// Whether an existing provider was reused
    pub reused_provider: bool,
    pub outcome: DeployOutcome,
}

/// Ensures the identity provider and deploy role exist.
pub struct IdentityRegistrar {
    client: Arc<dyn ControlPlane>,
}

impl IdentityRegistrar {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }

    /// ARN of an already registered GitHub provider.
    pub async fn find_existing_provider(&self) -> PilotResult<Option<String>> {
        let providers = self
            .client
            .list_identity_providers()
            .await
            .map_err(remote("list identity providers"))?;

        Ok(providers
            .into_iter()
            .find(|arn| arn.ends_with(GITHUB_TOKEN_ISSUER)))
    }

    /// Deploy the identity stack and return the role to assume from CI.
    pub async fn register(&self, ctx: &DeploymentContext) -> PilotResult<OidcRegistration> {
        let template = &ctx.paths.identity_template;
        if !template.is_file() {
            return Err(PilotError::TemplateNotFound(template.clone()));
        }

        let existing = self.find_existing_provider().await?;
        match &existing {
            Some(arn) => info!("Reusing identity provider {}", arn),
            None => info!(
                "No identity provider for {}; the stack will create one",
                GITHUB_TOKEN_ISSUER
            ),
        }

        let parameters = vec![
            ("GitHubOrg".to_string(), ctx.github.org.clone()),
            ("RepositoryName".to_string(), ctx.github.repo.clone()),
            ("Environment".to_string(), ctx.environment.clone()),
            ("OIDCProviderArn".to_string(), existing.clone().unwrap_or_default()),
        ];
        let stack_name = &ctx.identity_stack_name;
        let request = stack_request(ctx, stack_name, template.clone(), parameters);

        let outcome = self
            .client
            .deploy_stack(&request)
            .await
            .map_err(remote(format!("deploy stack {}", stack_name)))?;
        let outcome = accept_outcome(stack_name, outcome)?;

        let stack = self
            .client
            .describe_stack(stack_name)
            .await
            .map_err(remote(format!("describe stack {}", stack_name)))?;
        let stack = match stack {
            Some(stack) => stack,
            None if self.client.is_dry_run() => {
                warn!("Stack {} does not exist yet; no deploy role to report", stack_name);
                return Ok(OidcRegistration {
                    stack_name: stack_name.clone(),
                    role_arn: None,
                    reused_provider: existing.is_some(),
                    provider_arn: existing,
                    outcome,
                });
            }
            None => return Err(PilotError::StackNotFound(stack_name.clone())),
        };

        let role_arn = present(stack.output(ROLE_OUTPUT_KEY))
            .ok_or_else(|| PilotError::MissingOutput {
                stack: stack_name.clone(),
                key: ROLE_OUTPUT_KEY.to_string(),
            })?
            .to_string();

        let reused_provider = existing.is_some();
        let provider_arn =
            existing.or_else(|| present(stack.output(PROVIDER_OUTPUT_KEY)).map(str::to_string));

        Ok(OidcRegistration {
            stack_name: stack_name.clone(),
            role_arn: Some(role_arn),
            provider_arn,
            reused_provider,
            outcome,
        })
    }
}
