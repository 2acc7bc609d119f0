//! Command-line definition.

use std::path::PathBuf;

use clap::Parser;
use pilot_core::Action;

/// stackpilot - deploy a static website stack and its CI trust
#[derive(Parser, Debug)]
#[command(name = "stackpilot")]
#[command(version, about = "stackpilot - deploy a static website stack and its CI trust")]
#[command(long_about = r#"
stackpilot resolves a named environment from the deployment document and
drives the cloud control plane through one action.

ACTIONS:
  test     → Validate configuration, tools and credentials
  oidc     → Register the GitHub identity provider and deploy role
  infra    → Package artifacts and deploy the environment stack
  content  → Sync site content and invalidate the CDN cache
  outputs  → Print the environment stack's outputs

EXIT CODES:
  0 - Success
  1 - General error
  2 - Configuration error
  3 - Missing dependency or credentials
  4 - Remote operation failed
"#)]
pub struct Cli {
    /// Action to run
    pub action: Action,

    /// Environment to target (required by infra, content and outputs)
    pub environment: Option<String>,

    /// Deployment document
    #[arg(short, long, env = "STACKPILOT_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Named AWS profile
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Log mutating commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Publish this directory instead of the configured content directory
    #[arg(long)]
    pub content_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
