//! # pilot_config
//!
//! Deployment configuration for stackpilot.
//!
//! This crate loads the multi-environment configuration document, validates
//! it, and resolves it into an immutable [`DeploymentContext`] for a single
//! environment.
//!
//! ## Document layout
//!
//! The canonical layout keeps shared settings under `shared` and the
//! environment map under `environments`:
//!
//! ```json
//! {
//!   "shared": { "name": "site", "region": "us-east-1",
//!               "github": { "org": "acme", "repo": "web" } },
//!   "environments": { "dev": { "parameters": { "SubDomain": "dev" } } }
//! }
//! ```
//!
//! The legacy flat layout (environments at the root next to `_shared`) is
//! converted to the canonical one with a warning.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pilot_config::DeployConfig;
//!
//! let config = DeployConfig::load("config.json").unwrap();
//! let ctx = config.resolve("dev").unwrap();
//! assert_eq!(ctx.stack_name, "site-dev");
//! ```

pub mod context;
pub mod error;
pub mod loader;
pub mod models;

pub use context::{
    identity_stack_name, package_bucket_name, stack_name, DeploymentContext, ResolvedPaths,
    SHARED_ENVIRONMENT,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::DocumentLayout;
pub use models::{DeployConfig, EnvironmentConfig, GithubRepository, PathSettings, SharedSettings};
