//! In-memory control plane for testing.
//!
//! Provides a stateful fake implementation of the ControlPlane trait. It
//! keeps buckets, uploaded artifacts, stacks and identity providers in
//! memory, records every call and counts the calls that changed remote
//! state, so tests can assert ordering and idempotence without remote
//! access.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use walkdir::WalkDir;

use crate::error::{RemoteError, RemoteResult};
use crate::plane::{
    BucketStatus, CallerIdentity, ControlPlane, DeployOutcome, IdentityProviderConfig,
    StackDeployRequest, StackDescription, SyncSummary,
};

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCall {
    pub method: String,
    /// Primary resource the call targeted (stack, bucket, distribution)
    pub target: Option<String>,
    pub args: Vec<String>,
}

impl CapturedCall {
    fn new(method: &str, target: Option<&str>, args: Vec<String>) -> Self {
        Self {
            method: method.to_string(),
            target: target.map(str::to_string),
            args,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FakeStack {
    /// Fingerprint of the last deployment; `None` for seeded stacks.
    fingerprint: Option<String>,
    outputs: BTreeMap<String, String>,
}

/// Mock control plane for testing.
#[derive(Clone)]
pub struct MockControlPlane {
    /// Identity returned by caller_identity; `None` means unauthenticated.
    identity: Arc<RwLock<Option<CallerIdentity>>>,
    buckets: Arc<RwLock<BTreeSet<String>>>,
    /// Uploaded artifacts keyed by bucket and content.
    artifacts: Arc<RwLock<BTreeSet<String>>>,
    stacks: Arc<RwLock<BTreeMap<String, FakeStack>>>,
    /// Outputs attached to a stack whenever it is deployed.
    deploy_outputs: Arc<RwLock<HashMap<String, BTreeMap<String, String>>>>,
    providers: Arc<RwLock<Vec<String>>>,
    /// Per-method simulated failures.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// Stacks describe_stack reports as absent, even after a deploy.
    lost_stacks: Arc<RwLock<BTreeSet<String>>>,
    /// Reason returned as `DeployOutcome::Failed` by deploy_stack.
    deploy_rejection: Arc<RwLock<Option<String>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    mutations: Arc<AtomicUsize>,
    /// Record mutating calls without applying them.
    dry_run: bool,
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MockControlPlane {
    /// Create an authenticated, empty control plane.
    pub fn new() -> Self {
        Self {
            identity: Arc::new(RwLock::new(Some(CallerIdentity {
                account: "123456789012".to_string(),
                arn: "arn:aws:iam::123456789012:user/mock".to_string(),
            }))),
            buckets: Arc::new(RwLock::new(BTreeSet::new())),
            artifacts: Arc::new(RwLock::new(BTreeSet::new())),
            stacks: Arc::new(RwLock::new(BTreeMap::new())),
            deploy_outputs: Arc::new(RwLock::new(HashMap::new())),
            providers: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            lost_stacks: Arc::new(RwLock::new(BTreeSet::new())),
            deploy_rejection: Arc::new(RwLock::new(None)),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            mutations: Arc::new(AtomicUsize::new(0)),
            dry_run: false,
        }
    }

    /// Make caller_identity fail as if no credentials were configured.
    pub fn unauthenticated(self) -> Self {
        *self.identity.write() = None;
        self
    }

    /// Add a bucket that already exists.
    pub fn add_existing_bucket(self, bucket: impl Into<String>) -> Self {
        self.buckets.write().insert(bucket.into());
        self
    }

    /// Add a registered identity provider.
    pub fn add_identity_provider(self, arn: impl Into<String>) -> Self {
        self.providers.write().push(arn.into());
        self
    }

    /// Add a stack that exists before the test runs.
    pub fn add_existing_stack<I, K, V>(self, stack_name: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let outputs = outputs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.stacks.write().insert(
            stack_name.into(),
            FakeStack {
                fingerprint: None,
                outputs,
            },
        );
        self
    }

    /// Outputs a stack reports once deployed.
    pub fn with_stack_outputs<I, K, V>(self, stack_name: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let outputs = outputs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.deploy_outputs.write().insert(stack_name.into(), outputs);
        self
    }

    /// Make `method` fail with `message`.
    pub fn fail_method(self, method: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.write().insert(method.into(), message.into());
        self
    }

    /// Make `stack_name` disappear from describe_stack, as if deleted out of band.
    pub fn lose_stack(self, stack_name: impl Into<String>) -> Self {
        self.lost_stacks.write().insert(stack_name.into());
        self
    }

    /// Make deploy_stack report a failed deployment.
    pub fn reject_deploys(self, reason: impl Into<String>) -> Self {
        *self.deploy_rejection.write() = Some(reason.into());
        self
    }

    /// Behave like a client in dry-run mode.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Names of the called methods, in call order.
    pub fn method_names(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Number of calls that changed remote state.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.read().contains(bucket)
    }

    pub fn has_stack(&self, stack_name: &str) -> bool {
        self.stacks.read().contains_key(stack_name)
    }

    pub fn identity_providers(&self) -> Vec<String> {
        self.providers.read().clone()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn mutate(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn check_failure(&self, method: &str) -> RemoteResult<()> {
        if let Some(message) = self.failures.read().get(method).cloned() {
            return Err(RemoteError::command_failed(method, message));
        }
        Ok(())
    }

    fn read_template(path: &Path) -> RemoteResult<String> {
        fs::read_to_string(path).map_err(|e| {
            RemoteError::command_failed(
                "read template",
                format!("{}: {}", path.display(), e),
            )
        })
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn caller_identity(&self) -> RemoteResult<CallerIdentity> {
        self.record_call(CapturedCall::new("caller_identity", None, Vec::new()));
        self.check_failure("caller_identity")?;
        self.identity.read().clone().ok_or_else(|| {
            RemoteError::NotAuthenticated("Unable to locate credentials".to_string())
        })
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> RemoteResult<BucketStatus> {
        self.record_call(CapturedCall::new(
            "create_bucket",
            Some(bucket),
            vec![region.to_string()],
        ));
        self.check_failure("create_bucket")?;

        if self.dry_run {
            return Ok(if self.has_bucket(bucket) {
                BucketStatus::AlreadyExists
            } else {
                BucketStatus::Created
            });
        }

        if self.buckets.write().insert(bucket.to_string()) {
            self.mutate();
            Ok(BucketStatus::Created)
        } else {
            Ok(BucketStatus::AlreadyExists)
        }
    }

    async fn package_template(
        &self,
        template: &Path,
        bucket: &str,
        output: &Path,
    ) -> RemoteResult<PathBuf> {
        self.record_call(CapturedCall::new(
            "package_template",
            Some(bucket),
            vec![
                template.to_string_lossy().to_string(),
                output.to_string_lossy().to_string(),
            ],
        ));
        self.check_failure("package_template")?;

        if self.dry_run {
            return Ok(output.to_path_buf());
        }

        if !self.buckets.read().contains(bucket) {
            return Err(RemoteError::command_failed(
                "package_template",
                format!("bucket {} does not exist", bucket),
            ));
        }

        let content = Self::read_template(template)?;
        if self.artifacts.write().insert(format!("{}/{}", bucket, content)) {
            self.mutate();
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, &content)?;
        Ok(output.to_path_buf())
    }

    async fn deploy_stack(&self, request: &StackDeployRequest) -> RemoteResult<DeployOutcome> {
        let mut args = request.parameter_overrides();
        args.extend(request.tag_pairs());
        args.extend(request.capabilities.iter().map(|c| c.as_str().to_string()));
        self.record_call(CapturedCall::new(
            "deploy_stack",
            Some(&request.stack_name),
            args,
        ));
        self.check_failure("deploy_stack")?;

        if self.dry_run {
            return Ok(DeployOutcome::NoChanges);
        }

        if let Some(reason) = self.deploy_rejection.read().clone() {
            return Ok(DeployOutcome::Failed(reason));
        }

        let content = Self::read_template(&request.template_file)?;
        let fingerprint = format!(
            "{}|{:?}|{:?}|{:?}",
            content, request.parameters, request.tags, request.capabilities
        );
        let outputs = self
            .deploy_outputs
            .read()
            .get(&request.stack_name)
            .cloned();

        let mut stacks = self.stacks.write();
        let unchanged = stacks
            .get(&request.stack_name)
            .map(|s| s.fingerprint.as_deref() == Some(fingerprint.as_str()));

        let outcome = match unchanged {
            None => {
                stacks.insert(
                    request.stack_name.clone(),
                    FakeStack {
                        fingerprint: Some(fingerprint),
                        outputs: outputs.unwrap_or_default(),
                    },
                );
                DeployOutcome::Created
            }
            Some(true) => return Ok(DeployOutcome::NoChanges),
            Some(false) => {
                if let Some(stack) = stacks.get_mut(&request.stack_name) {
                    stack.fingerprint = Some(fingerprint);
                    if let Some(outputs) = outputs {
                        stack.outputs = outputs;
                    }
                }
                DeployOutcome::Updated
            }
        };
        drop(stacks);

        self.mutate();
        Ok(outcome)
    }

    async fn describe_stack(&self, stack_name: &str) -> RemoteResult<Option<StackDescription>> {
        self.record_call(CapturedCall::new("describe_stack", Some(stack_name), Vec::new()));
        self.check_failure("describe_stack")?;

        if self.lost_stacks.read().contains(stack_name) {
            return Ok(None);
        }

        Ok(self.stacks.read().get(stack_name).map(|stack| StackDescription {
            stack_name: stack_name.to_string(),
            status: if stack.fingerprint.is_some() {
                "UPDATE_COMPLETE".to_string()
            } else {
                "CREATE_COMPLETE".to_string()
            },
            outputs: stack.outputs.clone(),
        }))
    }

    async fn list_identity_providers(&self) -> RemoteResult<Vec<String>> {
        self.record_call(CapturedCall::new("list_identity_providers", None, Vec::new()));
        self.check_failure("list_identity_providers")?;
        Ok(self.providers.read().clone())
    }

    async fn create_identity_provider(
        &self,
        provider: &IdentityProviderConfig,
    ) -> RemoteResult<String> {
        self.record_call(CapturedCall::new(
            "create_identity_provider",
            Some(&provider.url),
            provider.client_ids.clone(),
        ));
        self.check_failure("create_identity_provider")?;

        if self.dry_run {
            return Ok(String::new());
        }

        let host = provider.url.trim_start_matches("https://");
        let arn = format!("arn:aws:iam::123456789012:oidc-provider/{}", host);
        let mut providers = self.providers.write();
        if providers.contains(&arn) {
            return Err(RemoteError::command_failed(
                "create_identity_provider",
                format!("EntityAlreadyExists: {}", arn),
            ));
        }
        providers.push(arn.clone());
        self.mutate();
        Ok(arn)
    }

    async fn sync_directory(
        &self,
        local_dir: &Path,
        bucket: &str,
        delete: bool,
    ) -> RemoteResult<SyncSummary> {
        let mut args = vec![local_dir.to_string_lossy().to_string()];
        if delete {
            args.push("--delete".to_string());
        }
        self.record_call(CapturedCall::new("sync_directory", Some(bucket), args));
        self.check_failure("sync_directory")?;

        let uploaded = WalkDir::new(local_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
        if !self.dry_run {
            self.mutate();
        }
        Ok(SyncSummary {
            uploaded,
            deleted: 0,
        })
    }

    async fn invalidate_paths(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> RemoteResult<String> {
        self.record_call(CapturedCall::new(
            "invalidate_paths",
            Some(distribution_id),
            paths.to_vec(),
        ));
        self.check_failure("invalidate_paths")?;
        if self.dry_run {
            return Ok("dry-run".to_string());
        }
        self.mutate();
        Ok(format!("I{}", uuid::Uuid::new_v4().simple()).to_uppercase())
    }
}
