//! Infrastructure rollout for one environment.
//!
//! package → publish templates → deploy. Each step runs only if the one
//! before it succeeded; nothing is rolled back by the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use pilot_config::DeploymentContext;
use pilot_runner::{BucketStatus, Capability, ControlPlane, DeployOutcome, StackDeployRequest};
use serde::Serialize;
use tracing::info;

use crate::error::{remote, PilotError, PilotResult};
use crate::packager::ArtifactPackager;

pub const SOLUTION_TAG: &str = "Solution";
pub const ENVIRONMENT_TAG: &str = "Environment";

/// What a rollout did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfraReport {
    pub stack_name: String,
    pub package_bucket: String,
    pub bucket_status: BucketStatus,
    pub archive: PathBuf,
    pub packaged_template: PathBuf,
    pub outcome: DeployOutcome,
}

/// Deploy request for `stack_name` with the standard tags and capabilities.
pub(crate) fn stack_request(
    ctx: &DeploymentContext,
    stack_name: &str,
    template: PathBuf,
    parameters: Vec<(String, String)>,
) -> StackDeployRequest {
    StackDeployRequest::new(stack_name, template)
        .parameters(parameters)
        .tag(SOLUTION_TAG, &ctx.solution)
        .tag(ENVIRONMENT_TAG, &ctx.environment)
        .capability(Capability::NamedIam)
        .capability(Capability::AutoExpand)
}

/// Turn a terminal deploy outcome into success or `DeployFailed`.
pub(crate) fn accept_outcome(
    stack_name: &str,
    outcome: DeployOutcome,
) -> PilotResult<DeployOutcome> {
    match outcome {
        DeployOutcome::Failed(reason) => Err(PilotError::DeployFailed {
            stack: stack_name.to_string(),
            reason,
        }),
        outcome => {
            info!("Stack {}: {}", stack_name, outcome);
            Ok(outcome)
        }
    }
}

/// Drives the per-environment rollout.
pub struct StackSequencer {
    client: Arc<dyn ControlPlane>,
    packager: Arc<dyn ArtifactPackager>,
}

impl StackSequencer {
    pub fn new(client: Arc<dyn ControlPlane>, packager: Arc<dyn ArtifactPackager>) -> Self {
        Self { client, packager }
    }

    /// Run the full rollout for the context's environment.
    pub async fn deploy(&self, ctx: &DeploymentContext) -> PilotResult<InfraReport> {
        let template = &ctx.paths.template;
        if !template.is_file() {
            return Err(PilotError::TemplateNotFound(template.clone()));
        }

        info!("Packaging artifacts for {}", ctx.stack_name);
        let archive = self.packager.package(ctx).await?;

        let bucket = &ctx.package_bucket_name;
        info!("Publishing templates to {}", bucket);
        let bucket_status = self
            .client
            .create_bucket(bucket, &ctx.region)
            .await
            .map_err(remote(format!("create bucket {}", bucket)))?;

        let packaged_template = self
            .client
            .package_template(template, bucket, &ctx.paths.packaged_template())
            .await
            .map_err(remote(format!("package {} into {}", template.display(), bucket)))?;

        info!("Deploying stack {}", ctx.stack_name);
        let request = stack_request(
            ctx,
            &ctx.stack_name,
            packaged_template.clone(),
            ctx.parameters.clone(),
        );
        let outcome = self
            .client
            .deploy_stack(&request)
            .await
            .map_err(remote(format!("deploy stack {}", ctx.stack_name)))?;
        let outcome = accept_outcome(&ctx.stack_name, outcome)?;

        Ok(InfraReport {
            stack_name: ctx.stack_name.clone(),
            package_bucket: bucket.clone(),
            bucket_status,
            archive,
            packaged_template,
            outcome,
        })
    }
}
