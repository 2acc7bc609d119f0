//! Control-plane client backed by the `aws` command-line tool.
//!
//! Each operation maps to one or two `aws` invocations. JSON output is
//! requested wherever the result is parsed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{RemoteError, RemoteResult};
use crate::plane::{
    BucketStatus, CallerIdentity, ControlPlane, DeployOutcome, IdentityProviderConfig,
    StackDeployRequest, StackDescription, SyncSummary,
};

/// Region that rejects an explicit `LocationConstraint`.
const DEFAULT_REGION: &str = "us-east-1";

/// Options for the `aws` CLI client.
#[derive(Debug, Clone)]
pub struct AwsCliOptions {
    /// Region passed to every command
    pub region: String,
    /// Named credentials profile
    pub profile: Option<String>,
    /// Log mutating commands instead of executing them
    pub dry_run: bool,
    /// Executable name or path
    pub executable: String,
}

impl AwsCliOptions {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            profile: None,
            dry_run: false,
            executable: "aws".to_string(),
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }
}

/// Captured result of one CLI invocation.
#[derive(Debug)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Last non-empty stderr line, which carries the CLI's error message.
    fn error_message(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error")
            .trim()
            .to_string()
    }
}

/// `aws` CLI based control-plane client.
pub struct AwsCliClient {
    options: AwsCliOptions,
}

impl AwsCliClient {
    pub fn new(options: AwsCliOptions) -> Self {
        info!("Using aws CLI client for region {}", options.region);
        Self { options }
    }

    /// Arguments appended to every command.
    fn global_args(&self) -> Vec<String> {
        let mut args = vec!["--region".to_string(), self.options.region.clone()];
        if let Some(profile) = &self.options.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    /// Format command for logging.
    fn format_command(&self, args: &[String]) -> String {
        let mut cmd = self.options.executable.clone();
        for arg in args {
            if arg.contains(' ') || arg.contains('*') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }

    async fn execute(&self, args: &[String]) -> RemoteResult<CommandOutput> {
        let mut full_args = args.to_vec();
        full_args.extend(self.global_args());

        debug!("Executing: {}", self.format_command(&full_args));

        let output = Command::new(&self.options.executable)
            .args(&full_args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RemoteError::CliNotAvailable(format!(
                    "{} not found on PATH",
                    self.options.executable
                )),
                _ => RemoteError::Io(e),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a command and fail on a non-zero exit code.
    async fn run_checked(&self, args: &[String]) -> RemoteResult<String> {
        let output = self.execute(args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            let command = self.format_command(args);
            error!("{} failed: {}", command, output.error_message());
            Err(RemoteError::command_failed(command, output.error_message()))
        }
    }

    /// Run a command with JSON output and deserialize it.
    async fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> RemoteResult<T> {
        let mut args = args.to_vec();
        args.extend(["--output".to_string(), "json".to_string()]);
        let stdout = self.run_checked(&args).await?;
        serde_json::from_str(&stdout).map_err(|e| RemoteError::UnexpectedResponse {
            command: self.format_command(&args),
            message: e.to_string(),
        })
    }

    /// In dry-run mode, log the command and report that it was skipped.
    fn skip_in_dry_run(&self, args: &[String]) -> bool {
        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", self.format_command(args));
        }
        self.options.dry_run
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Whether deploy output reports an empty change set.
fn is_empty_changeset(output: &str) -> bool {
    output.contains("No changes to deploy")
        || output.contains("The submitted information didn't contain changes")
}

/// Count transfers in `aws s3 sync` output.
fn parse_sync_summary(output: &str) -> SyncSummary {
    let mut summary = SyncSummary::default();
    for line in output.lines() {
        let line = line.trim().trim_start_matches("(dryrun)").trim_start();
        if line.starts_with("upload:") || line.starts_with("copy:") {
            summary.uploaded += 1;
        } else if line.starts_with("delete:") {
            summary.deleted += 1;
        }
    }
    summary
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityResponse {
    account: String,
    arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<StackResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackResponse {
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    outputs: Vec<OutputResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OutputResponse {
    output_key: String,
    #[serde(default)]
    output_value: Option<String>,
}

impl From<StackResponse> for StackDescription {
    fn from(stack: StackResponse) -> Self {
        let outputs: BTreeMap<String, String> = stack
            .outputs
            .into_iter()
            .filter_map(|o| o.output_value.map(|v| (o.output_key, v)))
            .collect();
        StackDescription {
            stack_name: stack.stack_name,
            status: stack.stack_status,
            outputs,
        }
    }
}

#[derive(Deserialize)]
struct ListProvidersResponse {
    #[serde(rename = "OpenIDConnectProviderList", default)]
    providers: Vec<ProviderEntry>,
}

#[derive(Deserialize)]
struct ProviderEntry {
    #[serde(rename = "Arn")]
    arn: String,
}

#[derive(Deserialize)]
struct CreateProviderResponse {
    #[serde(rename = "OpenIDConnectProviderArn")]
    arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInvalidationResponse {
    invalidation: InvalidationEntry,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidationEntry {
    id: String,
}

#[async_trait]
impl ControlPlane for AwsCliClient {
    fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    async fn caller_identity(&self) -> RemoteResult<CallerIdentity> {
        let args = strings(&["sts", "get-caller-identity", "--output", "json"]);
        let output = self.execute(&args).await?;
        if !output.success {
            return Err(RemoteError::NotAuthenticated(output.error_message()));
        }

        let identity: CallerIdentityResponse =
            serde_json::from_str(&output.stdout).map_err(|e| RemoteError::UnexpectedResponse {
                command: self.format_command(&args),
                message: e.to_string(),
            })?;

        Ok(CallerIdentity {
            account: identity.account,
            arn: identity.arn,
        })
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> RemoteResult<BucketStatus> {
        let head = self
            .execute(&strings(&["s3api", "head-bucket", "--bucket", bucket]))
            .await?;
        if head.success {
            debug!("Bucket {} already exists", bucket);
            return Ok(BucketStatus::AlreadyExists);
        }

        let mut args = strings(&["s3api", "create-bucket", "--bucket", bucket]);
        if region != DEFAULT_REGION {
            args.push("--create-bucket-configuration".to_string());
            args.push(format!("LocationConstraint={}", region));
        }

        if self.skip_in_dry_run(&args) {
            return Ok(BucketStatus::Created);
        }

        let output = self.execute(&args).await?;
        if output.success {
            info!("Created bucket {}", bucket);
            Ok(BucketStatus::Created)
        } else if output.stderr.contains("BucketAlreadyOwnedByYou") {
            Ok(BucketStatus::AlreadyExists)
        } else {
            Err(RemoteError::command_failed(
                self.format_command(&args),
                output.error_message(),
            ))
        }
    }

    async fn package_template(
        &self,
        template: &Path,
        bucket: &str,
        output: &Path,
    ) -> RemoteResult<PathBuf> {
        let args = vec![
            "cloudformation".to_string(),
            "package".to_string(),
            "--template-file".to_string(),
            template.to_string_lossy().to_string(),
            "--s3-bucket".to_string(),
            bucket.to_string(),
            "--output-template-file".to_string(),
            output.to_string_lossy().to_string(),
        ];

        if self.skip_in_dry_run(&args) {
            return Ok(output.to_path_buf());
        }

        self.run_checked(&args).await?;
        Ok(output.to_path_buf())
    }

    async fn deploy_stack(&self, request: &StackDeployRequest) -> RemoteResult<DeployOutcome> {
        let existed = self
            .describe_stack(&request.stack_name)
            .await?
            .map(|s| s.status != "REVIEW_IN_PROGRESS")
            .unwrap_or(false);

        let mut args = vec![
            "cloudformation".to_string(),
            "deploy".to_string(),
            "--template-file".to_string(),
            request.template_file.to_string_lossy().to_string(),
            "--stack-name".to_string(),
            request.stack_name.clone(),
            "--no-fail-on-empty-changeset".to_string(),
        ];
        if !request.parameters.is_empty() {
            args.push("--parameter-overrides".to_string());
            args.extend(request.parameter_overrides());
        }
        if !request.capabilities.is_empty() {
            args.push("--capabilities".to_string());
            args.extend(request.capabilities.iter().map(|c| c.as_str().to_string()));
        }
        if !request.tags.is_empty() {
            args.push("--tags".to_string());
            args.extend(request.tag_pairs());
        }

        if self.skip_in_dry_run(&args) {
            return Ok(DeployOutcome::NoChanges);
        }

        info!("Deploying stack {}", request.stack_name);
        let output = self.execute(&args).await?;

        if !output.success {
            error!("Deployment of {} failed", request.stack_name);
            return Ok(DeployOutcome::Failed(output.error_message()));
        }

        if is_empty_changeset(&output.combined()) {
            Ok(DeployOutcome::NoChanges)
        } else if existed {
            Ok(DeployOutcome::Updated)
        } else {
            Ok(DeployOutcome::Created)
        }
    }

    async fn describe_stack(&self, stack_name: &str) -> RemoteResult<Option<StackDescription>> {
        let args = strings(&[
            "cloudformation",
            "describe-stacks",
            "--stack-name",
            stack_name,
            "--output",
            "json",
        ]);
        let output = self.execute(&args).await?;

        if !output.success {
            if output.stderr.contains("does not exist") {
                return Ok(None);
            }
            return Err(RemoteError::command_failed(
                self.format_command(&args),
                output.error_message(),
            ));
        }

        let response: DescribeStacksResponse = serde_json::from_str(&output.stdout)?;
        Ok(response.stacks.into_iter().next().map(StackDescription::from))
    }

    async fn list_identity_providers(&self) -> RemoteResult<Vec<String>> {
        let response: ListProvidersResponse = self
            .run_json(&strings(&["iam", "list-open-id-connect-providers"]))
            .await?;
        Ok(response.providers.into_iter().map(|p| p.arn).collect())
    }

    async fn create_identity_provider(
        &self,
        provider: &IdentityProviderConfig,
    ) -> RemoteResult<String> {
        let mut args = vec![
            "iam".to_string(),
            "create-open-id-connect-provider".to_string(),
            "--url".to_string(),
            provider.url.clone(),
            "--client-id-list".to_string(),
        ];
        args.extend(provider.client_ids.iter().cloned());
        args.push("--thumbprint-list".to_string());
        args.extend(provider.thumbprints.iter().cloned());

        if self.skip_in_dry_run(&args) {
            return Ok(String::new());
        }

        let response: CreateProviderResponse = self.run_json(&args).await?;
        Ok(response.arn)
    }

    async fn sync_directory(
        &self,
        local_dir: &Path,
        bucket: &str,
        delete: bool,
    ) -> RemoteResult<SyncSummary> {
        let mut args = vec![
            "s3".to_string(),
            "sync".to_string(),
            local_dir.to_string_lossy().to_string(),
            format!("s3://{}/", bucket),
            "--no-progress".to_string(),
        ];
        if delete {
            args.push("--delete".to_string());
        }
        if self.options.dry_run {
            // The CLI's own dry run still computes the diff without writing.
            args.push("--dryrun".to_string());
        }

        let stdout = self.run_checked(&args).await?;
        Ok(parse_sync_summary(&stdout))
    }

    async fn invalidate_paths(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> RemoteResult<String> {
        let mut args = vec![
            "cloudfront".to_string(),
            "create-invalidation".to_string(),
            "--distribution-id".to_string(),
            distribution_id.to_string(),
            "--paths".to_string(),
        ];
        args.extend(paths.iter().cloned());

        if self.skip_in_dry_run(&args) {
            return Ok("dry-run".to_string());
        }

        let response: CreateInvalidationResponse = self.run_json(&args).await?;
        Ok(response.invalidation.id)
    }
}
