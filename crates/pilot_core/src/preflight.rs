//! Dependency checks run before any action.
//!
//! Tools are probed first, then the ambient credentials are resolved to an
//! account. Nothing else touches the control plane until both pass.

use std::path::PathBuf;
use std::sync::Arc;

use pilot_config::DeploymentContext;
use pilot_runner::{ControlPlane, RemoteError, ToolProbe};
use serde::Serialize;
use tracing::{debug, info};

use crate::actions::Action;
use crate::error::{remote, PilotError, PilotResult};

pub const AWS_CLI: &str = "aws";
pub const PIP: &str = "pip3";

/// What the checks found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub account: String,
    pub caller_arn: String,
    /// Located tools with their paths
    pub tools: Vec<(String, PathBuf)>,
}

/// Tools `action` needs for `ctx`.
///
/// `pip3` is only needed when the function source declares Python
/// requirements that must be vendored into the archive.
pub fn required_tools(action: Action, ctx: &DeploymentContext) -> Vec<&'static str> {
    let mut tools = vec![AWS_CLI];
    if action == Action::Infra && ctx.paths.function_source.join("requirements.txt").is_file() {
        tools.push(PIP);
    }
    tools
}

/// Verifies tools and credentials.
pub struct DependencyChecker {
    client: Arc<dyn ControlPlane>,
    probe: Arc<dyn ToolProbe>,
}

impl DependencyChecker {
    pub fn new(client: Arc<dyn ControlPlane>, probe: Arc<dyn ToolProbe>) -> Self {
        Self { client, probe }
    }

    /// Check everything `action` depends on.
    pub async fn check(
        &self,
        action: Action,
        ctx: &DeploymentContext,
    ) -> PilotResult<PreflightReport> {
        let mut tools = Vec::new();
        for tool in required_tools(action, ctx) {
            let path = self
                .probe
                .locate(tool)
                .ok_or_else(|| PilotError::MissingDependency(tool.to_string()))?;
            debug!("Found {} at {}", tool, path.display());
            tools.push((tool.to_string(), path));
        }

        let identity = self.client.caller_identity().await.map_err(|e| match e {
            RemoteError::CliNotAvailable(_) => PilotError::MissingDependency(AWS_CLI.to_string()),
            RemoteError::NotAuthenticated(reason) => PilotError::NotAuthenticated(reason),
            other => remote("resolve caller identity")(other),
        })?;

        info!("Authenticated as {} (account {})", identity.arn, identity.account);

        Ok(PreflightReport {
            account: identity.account,
            caller_arn: identity.arn,
            tools,
        })
    }
}
