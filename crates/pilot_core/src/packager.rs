//! Packaging of the initial-content function.
//!
//! The function source is staged under the build directory, Python
//! requirements are vendored into the staging tree, and the result is
//! zipped into a single archive referenced by the root template.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs_extra::dir::CopyOptions;
use pilot_config::DeploymentContext;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{PilotError, PilotResult};
use crate::preflight::PIP;

/// Builds the archive bundled with the templates.
#[async_trait]
pub trait ArtifactPackager: Send + Sync {
    /// Build the archive for `ctx` and return its path.
    async fn package(&self, ctx: &DeploymentContext) -> PilotResult<PathBuf>;
}

/// Packager that builds on the local machine.
pub struct LocalPackager {
    pip: String,
}

impl Default for LocalPackager {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPackager {
    pub fn new() -> Self {
        Self {
            pip: PIP.to_string(),
        }
    }

    /// Use a different pip executable.
    pub fn with_pip(mut self, pip: impl Into<String>) -> Self {
        self.pip = pip.into();
        self
    }

    fn stage(source: &Path, staging: &Path) -> PilotResult<()> {
        if staging.exists() {
            fs::remove_dir_all(staging).map_err(packaging)?;
        }
        fs::create_dir_all(staging).map_err(packaging)?;

        let options = CopyOptions::new().content_only(true).overwrite(true);
        fs_extra::dir::copy(source, staging, &options)
            .map_err(|e| {
                PilotError::PackagingFailed(format!("staging {}: {}", source.display(), e))
            })?;
        Ok(())
    }

    async fn install_requirements(&self, requirements: &Path, staging: &Path) -> PilotResult<()> {
        info!("Installing function dependencies from {}", requirements.display());

        let output = Command::new(&self.pip)
            .arg("install")
            .arg("--quiet")
            .arg("--upgrade")
            .arg("-r")
            .arg(requirements)
            .arg("-t")
            .arg(staging)
            .output()
            .await
            .map_err(|e| {
                PilotError::PackagingFailed(format!("failed to run {}: {}", self.pip, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PilotError::PackagingFailed(format!(
                "{} install exited with {}: {}",
                self.pip,
                output.status,
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }
        Ok(())
    }
}

fn packaging(e: impl std::fmt::Display) -> PilotError {
    PilotError::PackagingFailed(e.to_string())
}

/// Zip `staging` into `archive` with entries in a stable order.
pub fn write_archive(staging: &Path, archive: &Path) -> PilotResult<usize> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(packaging)?;
    }

    let file = File::create(archive).map_err(packaging)?;
    let mut zip = ZipWriter::new(file);
    // Unchanged sources must zip to identical bytes.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut files = 0;

    let entries = WalkDir::new(staging)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != "__pycache__");

    for entry in entries {
        let entry = entry.map_err(packaging)?;
        let relative = entry.path().strip_prefix(staging).map_err(packaging)?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options).map_err(packaging)?;
        } else {
            zip.start_file(name, options).map_err(packaging)?;
            let mut source = File::open(entry.path()).map_err(packaging)?;
            io::copy(&mut source, &mut zip).map_err(packaging)?;
            files += 1;
        }
    }

    zip.finish().map_err(packaging)?;
    Ok(files)
}

#[async_trait]
impl ArtifactPackager for LocalPackager {
    async fn package(&self, ctx: &DeploymentContext) -> PilotResult<PathBuf> {
        let source = &ctx.paths.function_source;
        if !source.is_dir() {
            return Err(PilotError::PackagingFailed(format!(
                "function source not found: {}",
                source.display()
            )));
        }

        let staging = ctx.paths.build_dir.join("initial-content");
        let archive = ctx.paths.function_archive();
        info!("Packaging {} into {}", source.display(), archive.display());

        Self::stage(source, &staging)?;

        let requirements = source.join("requirements.txt");
        if requirements.is_file() {
            self.install_requirements(&requirements, &staging).await?;
        }

        let files = write_archive(&staging, &archive)?;
        debug!("Archived {} files", files);

        Ok(archive)
    }
}
