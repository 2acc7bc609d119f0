//! Publishing of static site content.
//!
//! The target bucket and distribution come from the environment stack's
//! outputs and both are required. The cache is only invalidated after the
//! sync finished successfully.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pilot_config::DeploymentContext;
use pilot_runner::{ControlPlane, SyncSummary};
use serde::Serialize;
use tracing::info;

use crate::error::{remote, PilotError, PilotResult};
use crate::outputs::{OutputExtractor, OutputKey};

/// Invalidation path covering every cached object.
pub const INVALIDATE_ALL: &str = "/*";

/// What a publish did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub stack_name: String,
    pub content_dir: PathBuf,
    pub bucket: String,
    pub distribution_id: String,
    pub sync: SyncSummary,
    pub invalidation_id: String,
}

/// Mirrors a local directory to the site bucket.
pub struct ContentPublisher {
    client: Arc<dyn ControlPlane>,
}

impl ContentPublisher {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }

    pub async fn publish(
        &self,
        ctx: &DeploymentContext,
        content_dir: &Path,
    ) -> PilotResult<PublishReport> {
        if !content_dir.is_dir() {
            return Err(PilotError::ContentDirNotFound(content_dir.to_path_buf()));
        }

        // Both targets must resolve before anything is synced.
        let outputs = OutputExtractor::new(self.client.clone())
            .extract(&ctx.stack_name)
            .await?;
        let bucket = outputs.require(OutputKey::Bucket)?.to_string();
        let distribution_id = outputs.require(OutputKey::Distribution)?.to_string();

        info!("Syncing {} to s3://{}", content_dir.display(), bucket);
        let sync = self
            .client
            .sync_directory(content_dir, &bucket, true)
            .await
            .map_err(remote(format!("sync {} to bucket {}", content_dir.display(), bucket)))?;
        info!("Uploaded {} files, deleted {}", sync.uploaded, sync.deleted);

        info!("Invalidating {} on distribution {}", INVALIDATE_ALL, distribution_id);
        let invalidation_id = self
            .client
            .invalidate_paths(&distribution_id, &[INVALIDATE_ALL.to_string()])
            .await
            .map_err(remote(format!("invalidate distribution {}", distribution_id)))?;

        Ok(PublishReport {
            stack_name: ctx.stack_name.clone(),
            content_dir: content_dir.to_path_buf(),
            bucket,
            distribution_id,
            sync,
            invalidation_id,
        })
    }
}
