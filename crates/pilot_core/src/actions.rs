//! Actions and the dispatcher that runs them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pilot_config::{DeployConfig, DeploymentContext};
use pilot_runner::{ControlPlane, ToolProbe};
use serde::Serialize;
use tracing::{info, warn};

use crate::content::{ContentPublisher, PublishReport};
use crate::error::{PilotError, PilotResult};
use crate::infra::{InfraReport, StackSequencer};
use crate::oidc::{IdentityRegistrar, OidcRegistration};
use crate::outputs::{OutputExtractor, OutputReport};
use crate::packager::ArtifactPackager;
use crate::preflight::{DependencyChecker, PreflightReport};

/// The closed set of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Validate configuration and dependencies without mutating anything
    Test,
    /// Register the CI identity provider and deploy role
    Oidc,
    /// Package, publish templates and deploy the environment stack
    Infra,
    /// Publish site content and invalidate the CDN cache
    Content,
    /// Print the environment stack's outputs
    Outputs,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Test,
        Action::Oidc,
        Action::Infra,
        Action::Content,
        Action::Outputs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Test => "test",
            Action::Oidc => "oidc",
            Action::Infra => "infra",
            Action::Content => "content",
            Action::Outputs => "outputs",
        }
    }

    /// Whether the action targets a configured environment.
    pub fn requires_environment(&self) -> bool {
        matches!(self, Action::Infra | Action::Content | Action::Outputs)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                let names: Vec<_> = Action::ALL.iter().map(Action::as_str).collect();
                format!("unknown action '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionReport {
    Test {
        preflight: PreflightReport,
        environment: String,
        environments: Vec<String>,
    },
    Oidc(OidcRegistration),
    Infra {
        deployment: InfraReport,
        /// `None` when a dry run previews a stack that does not exist yet
        outputs: Option<OutputReport>,
    },
    Content(PublishReport),
    Outputs(OutputReport),
}

impl ActionReport {
    /// Non-fatal problems encountered while running the action.
    pub fn warnings(&self) -> &[String] {
        match self {
            ActionReport::Infra {
                outputs: Some(outputs),
                ..
            }
            | ActionReport::Outputs(outputs) => &outputs.warnings,
            _ => &[],
        }
    }
}

/// A finished action with its timing.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRun {
    pub action: Action,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report: ActionReport,
}

impl ActionRun {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Resolves `(action, environment)` into component calls.
///
/// Components return errors instead of exiting; deciding the exit code is
/// left to the caller.
pub struct Orchestrator {
    client: Arc<dyn ControlPlane>,
    probe: Arc<dyn ToolProbe>,
    packager: Arc<dyn ArtifactPackager>,
    content_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        probe: Arc<dyn ToolProbe>,
        packager: Arc<dyn ArtifactPackager>,
    ) -> Self {
        Self {
            client,
            probe,
            packager,
            content_dir: None,
        }
    }

    /// Publish from `dir` instead of the configured content directory.
    pub fn with_content_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.content_dir = Some(dir.into());
        self
    }

    /// Resolve the context for `action`.
    ///
    /// Environment-scoped actions need a configured environment. `test` and
    /// `oidc` fall back to the shared pseudo-environment.
    pub fn resolve_context(
        config: &DeployConfig,
        action: Action,
        environment: Option<&str>,
    ) -> PilotResult<DeploymentContext> {
        match environment {
            Some(env) => Ok(config.resolve(env)?),
            None if action.requires_environment() => {
                Err(PilotError::EnvironmentRequired(action.to_string()))
            }
            None => Ok(config.resolve_shared()),
        }
    }

    /// Run `action` against `environment`.
    pub async fn run(
        &self,
        config: &DeployConfig,
        action: Action,
        environment: Option<&str>,
    ) -> PilotResult<ActionRun> {
        let started_at = Utc::now();
        let ctx = Self::resolve_context(config, action, environment)?;

        if action == Action::Test {
            for name in config.environment_names() {
                config.environment(&name)?;
            }
        }

        info!(action = %action, environment = %ctx.environment, "Starting action");

        let preflight = DependencyChecker::new(self.client.clone(), self.probe.clone())
            .check(action, &ctx)
            .await?;

        let report = match action {
            Action::Test => ActionReport::Test {
                preflight,
                environment: ctx.environment.clone(),
                environments: config.environment_names(),
            },
            Action::Oidc => {
                let registration = IdentityRegistrar::new(self.client.clone())
                    .register(&ctx)
                    .await?;
                ActionReport::Oidc(registration)
            }
            Action::Infra => {
                let deployment = StackSequencer::new(self.client.clone(), self.packager.clone())
                    .deploy(&ctx)
                    .await?;
                let outputs = match OutputExtractor::new(self.client.clone())
                    .extract(&ctx.stack_name)
                    .await
                {
                    Ok(outputs) => Some(outputs),
                    Err(PilotError::StackNotFound(stack)) if self.client.is_dry_run() => {
                        warn!("Stack {} does not exist yet; skipping outputs", stack);
                        None
                    }
                    Err(e) => return Err(e),
                };
                ActionReport::Infra {
                    deployment,
                    outputs,
                }
            }
            Action::Content => {
                let dir = self
                    .content_dir
                    .clone()
                    .unwrap_or_else(|| ctx.paths.content_dir.clone());
                let report = ContentPublisher::new(self.client.clone())
                    .publish(&ctx, &dir)
                    .await?;
                ActionReport::Content(report)
            }
            Action::Outputs => {
                let report = OutputExtractor::new(self.client.clone())
                    .extract(&ctx.stack_name)
                    .await?;
                ActionReport::Outputs(report)
            }
        };

        let run = ActionRun {
            action,
            environment: ctx.environment,
            started_at,
            finished_at: Utc::now(),
            report,
        };
        info!(action = %action, duration_ms = run.duration_ms(), "Action completed");
        Ok(run)
    }
}
