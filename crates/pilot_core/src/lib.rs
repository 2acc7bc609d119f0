//! # pilot_core
//!
//! Deployment orchestration for stackpilot.
//!
//! Turns a resolved [`DeploymentContext`](pilot_config::DeploymentContext)
//! into an ordered sequence of control-plane calls. Each action runs as a
//! strict sequence; the first failure aborts it and is returned to the
//! caller, which alone decides whether the process exits.
//!
//! ## Components
//!
//! - [`preflight`]: tool and credential checks, run before every action
//! - [`oidc`]: idempotent registration of the CI identity provider and role
//! - [`packager`]: builds the initial-content function archive
//! - [`infra`]: package, publish templates, deploy the environment stack
//! - [`outputs`]: tolerant extraction of stack outputs
//! - [`content`]: mirror the site content and invalidate the CDN cache
//! - [`actions`]: the closed action set and the dispatcher
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pilot_config::DeployConfig;
//! use pilot_core::{Action, LocalPackager, Orchestrator};
//! use pilot_runner::{AwsCliClient, AwsCliOptions, SystemToolProbe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeployConfig::load("config.json")?;
//!     let client = AwsCliClient::new(AwsCliOptions::new(&config.shared().region));
//!
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(client),
//!         Arc::new(SystemToolProbe),
//!         Arc::new(LocalPackager::new()),
//!     );
//!     let run = orchestrator.run(&config, Action::Outputs, Some("dev")).await?;
//!     println!("{:?}", run.report);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod content;
pub mod error;
pub mod infra;
pub mod oidc;
pub mod outputs;
pub mod packager;
pub mod preflight;

pub use actions::{Action, ActionReport, ActionRun, Orchestrator};
pub use content::{ContentPublisher, PublishReport};
pub use error::{ErrorCategory, PilotError, PilotResult};
pub use infra::{InfraReport, StackSequencer};
pub use oidc::{IdentityRegistrar, OidcRegistration};
pub use outputs::{OutputExtractor, OutputKey, OutputReport};
pub use packager::{ArtifactPackager, LocalPackager};
pub use preflight::{DependencyChecker, PreflightReport};
