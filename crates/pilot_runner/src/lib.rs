//! # pilot_runner
//!
//! Control-plane client for stackpilot.
//!
//! Every remote operation the orchestrator performs goes through the
//! [`ControlPlane`] trait. Two implementations ship with the crate:
//!
//! - **AwsCliClient**: wraps the `aws` command-line tool, with dry-run support
//! - **MockControlPlane**: stateful in-memory fake that records calls and
//!   counts mutations, for testing without remote access
//!
//! Tool discovery lives in [`tools`].
//!
//! # Example
//!
//! ```rust,no_run
//! use pilot_runner::{AwsCliClient, AwsCliOptions, ControlPlane};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AwsCliClient::new(AwsCliOptions::new("us-east-1"));
//!
//!     let identity = client.caller_identity().await?;
//!     println!("Account: {}", identity.account);
//!
//!     if let Some(stack) = client.describe_stack("site-dev").await? {
//!         println!("{} is {}", stack.stack_name, stack.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod mock;
pub mod plane;
pub mod tools;

pub use cli::{AwsCliClient, AwsCliOptions};
pub use error::{RemoteError, RemoteResult};
pub use mock::{CapturedCall, MockControlPlane};
pub use plane::{
    BucketStatus, CallerIdentity, Capability, ControlPlane, DeployOutcome, IdentityProviderConfig,
    StackDeployRequest, StackDescription, SyncSummary,
};
pub use tools::{StaticToolProbe, SystemToolProbe, ToolProbe};
