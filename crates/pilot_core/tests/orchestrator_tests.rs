//! Integration tests for the orchestrator.
//!
//! Every action runs against the in-memory control plane, which records
//! calls and counts mutations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pilot_config::DeployConfig;
use pilot_core::{
    Action, ActionReport, ContentPublisher, ErrorCategory, IdentityRegistrar, LocalPackager,
    Orchestrator, OutputExtractor, PilotError, StackSequencer,
};
use pilot_runner::{BucketStatus, DeployOutcome, MockControlPlane, StaticToolProbe};
use tempfile::{tempdir, TempDir};

const SITE_CONFIG: &str = r#"{
  "shared": { "name": "site", "region": "us-east-1", "github": { "org": "acme", "repo": "web" } },
  "environments": { "dev": { "parameters": { "SubDomain": "dev", "CreateApex": "no" } } }
}"#;

const PROVIDER_ARN: &str =
    "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com";

/// A project checkout with templates, function source and site content.
fn project() -> (TempDir, DeployConfig) {
    let dir = tempdir().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("infrastructure/functions/initial-content")).unwrap();
    fs::create_dir_all(root.join("website")).unwrap();
    fs::write(
        root.join("infrastructure/main.yaml"),
        "Resources:\n  Site:\n    Type: AWS::CloudFormation::Stack\n",
    )
    .unwrap();
    fs::write(
        root.join("infrastructure/github-oidc.yaml"),
        "Resources:\n  Role:\n    Type: AWS::IAM::Role\n",
    )
    .unwrap();
    fs::write(
        root.join("infrastructure/functions/initial-content/index.py"),
        "def handler(event, context):\n    return {}\n",
    )
    .unwrap();
    fs::write(root.join("website/index.html"), "<h1>hello</h1>").unwrap();

    let path = root.join("config.json");
    fs::write(&path, SITE_CONFIG).unwrap();
    let config = DeployConfig::load(&path).unwrap();
    (dir, config)
}

fn orchestrator(plane: &MockControlPlane) -> Orchestrator {
    Orchestrator::new(
        Arc::new(plane.clone()),
        Arc::new(StaticToolProbe::new(["aws"])),
        Arc::new(LocalPackager::new()),
    )
}

fn site_outputs() -> [(&'static str, &'static str); 3] {
    [
        ("WebsiteBucketName", "site-dev-content"),
        ("CloudFrontDistributionId", "E2EXAMPLE"),
        ("WebsiteDomainName", "dev.example.com"),
    ]
}

#[tokio::test]
async fn test_infra_dev_end_to_end() {
    let (dir, config) = project();
    let plane = MockControlPlane::new().with_stack_outputs("site-dev", site_outputs());

    let run = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap();

    assert_eq!(
        plane.method_names(),
        vec![
            "caller_identity",
            "create_bucket",
            "package_template",
            "deploy_stack",
            "describe_stack",
        ]
    );

    let bucket_call = &plane.get_method_calls("create_bucket")[0];
    assert_eq!(bucket_call.target.as_deref(), Some("site-cf-templates-us-east-1"));
    assert!(plane.has_bucket("site-cf-templates-us-east-1"));

    let deploy = &plane.get_method_calls("deploy_stack")[0];
    assert_eq!(deploy.target.as_deref(), Some("site-dev"));
    assert_eq!(
        deploy.args,
        vec![
            "CreateApex=no",
            "SubDomain=dev",
            "Solution=stackpilot",
            "Environment=dev",
            "CAPABILITY_NAMED_IAM",
            "CAPABILITY_AUTO_EXPAND",
        ]
    );

    assert!(dir.path().join("build/initial-content.zip").is_file());
    assert!(dir.path().join("build/packaged-template.yaml").is_file());

    match run.report {
        ActionReport::Infra {
            deployment,
            outputs,
        } => {
            assert_eq!(deployment.outcome, DeployOutcome::Created);
            assert_eq!(deployment.bucket_status, BucketStatus::Created);
            let outputs = outputs.unwrap();
            assert_eq!(outputs.bucket.as_deref(), Some("site-dev-content"));
            assert!(outputs.warnings.is_empty());
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn test_repeated_infra_reports_no_changes() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();
    let ctx = config.resolve("dev").unwrap();
    let sequencer = StackSequencer::new(Arc::new(plane.clone()), Arc::new(LocalPackager::new()));

    let first = sequencer.deploy(&ctx).await.unwrap();
    let mutations_after_first = plane.mutation_count();
    let second = sequencer.deploy(&ctx).await.unwrap();

    assert_eq!(first.outcome, DeployOutcome::Created);
    assert_eq!(second.outcome, DeployOutcome::NoChanges);
    assert_eq!(second.bucket_status, BucketStatus::AlreadyExists);
    assert_eq!(plane.mutation_count(), mutations_after_first);
}

#[tokio::test]
async fn test_changed_parameters_update_the_stack() {
    let (dir, config) = project();
    let plane = MockControlPlane::new();
    let sequencer = StackSequencer::new(Arc::new(plane.clone()), Arc::new(LocalPackager::new()));
    sequencer.deploy(&config.resolve("dev").unwrap()).await.unwrap();

    let changed = SITE_CONFIG.replace("\"CreateApex\": \"no\"", "\"CreateApex\": \"yes\"");
    let config = DeployConfig::parse(dir.path().join("config.json"), &changed).unwrap();
    let report = sequencer.deploy(&config.resolve("dev").unwrap()).await.unwrap();

    assert_eq!(report.outcome, DeployOutcome::Updated);
}

#[tokio::test]
async fn test_unknown_environment_makes_no_remote_calls() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("staging"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("staging"));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(plane.call_count(), 0);
}

#[tokio::test]
async fn test_environment_required() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();

    let err = orchestrator(&plane)
        .run(&config, Action::Content, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::EnvironmentRequired(action) if action == "content"));
    assert_eq!(plane.call_count(), 0);
}

#[tokio::test]
async fn test_missing_tool_blocks_every_action() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();
    let orchestrator = Orchestrator::new(
        Arc::new(plane.clone()),
        Arc::new(StaticToolProbe::default()),
        Arc::new(LocalPackager::new()),
    );

    for action in [Action::Test, Action::Outputs, Action::Infra] {
        let err = orchestrator.run(&config, action, Some("dev")).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Dependency);
    }
    assert_eq!(plane.call_count(), 0);
}

#[tokio::test]
async fn test_packaging_failure_short_circuits() {
    let (dir, config) = project();
    fs::remove_dir_all(dir.path().join("infrastructure/functions")).unwrap();
    let plane = MockControlPlane::new();

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::PackagingFailed(_)));
    assert_eq!(plane.method_names(), vec!["caller_identity"]);
}

#[tokio::test]
async fn test_rejected_deploy_is_fatal() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().reject_deploys("UPDATE_ROLLBACK_COMPLETE");

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    match err {
        PilotError::DeployFailed { stack, reason } => {
            assert_eq!(stack, "site-dev");
            assert_eq!(reason, "UPDATE_ROLLBACK_COMPLETE");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!plane.was_called("describe_stack"));
}

#[tokio::test]
async fn test_failed_bucket_creation_stops_before_packaging_templates() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().fail_method("create_bucket", "AccessDenied");

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("site-cf-templates-us-east-1"));
    assert_eq!(plane.method_names(), vec!["caller_identity", "create_bucket"]);
}

#[tokio::test]
async fn test_failed_template_packaging_stops_before_deploy() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().fail_method("package_template", "AccessDenied");

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::RemoteOperation);
    assert_eq!(
        plane.method_names(),
        vec!["caller_identity", "create_bucket", "package_template"]
    );
    assert!(!plane.has_stack("site-dev"));
}

#[tokio::test]
async fn test_dry_run_infra_previews_new_stack() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().dry_run();

    let run = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap();

    match run.report {
        ActionReport::Infra {
            deployment,
            outputs,
        } => {
            assert_eq!(deployment.outcome, DeployOutcome::NoChanges);
            assert!(outputs.is_none());
        }
        other => panic!("unexpected report: {other:?}"),
    }
    assert_eq!(plane.mutation_count(), 0);
    assert!(!plane.has_stack("site-dev"));
}

#[tokio::test]
async fn test_missing_stack_after_deploy_is_fatal() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().lose_stack("site-dev");

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::StackNotFound(ref stack) if stack == "site-dev"));
    assert!(plane.was_called("deploy_stack"));
}

#[tokio::test]
async fn test_dry_run_oidc_previews_new_identity_stack() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().dry_run();

    let run = orchestrator(&plane).run(&config, Action::Oidc, None).await.unwrap();

    match run.report {
        ActionReport::Oidc(registration) => {
            assert_eq!(registration.stack_name, "site-github-oidc");
            assert!(registration.role_arn.is_none());
            assert!(!registration.reused_provider);
            assert_eq!(registration.outcome, DeployOutcome::NoChanges);
        }
        other => panic!("unexpected report: {other:?}"),
    }
    assert!(!plane.was_called("create_identity_provider"));
    assert_eq!(plane.mutation_count(), 0);
}

#[tokio::test]
async fn test_missing_identity_stack_after_deploy_is_fatal() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().lose_stack("site-github-oidc");

    let err = orchestrator(&plane)
        .run(&config, Action::Oidc, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::StackNotFound(ref stack) if stack == "site-github-oidc"));
}

#[tokio::test]
async fn test_registrar_reuses_existing_provider() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new()
        .add_identity_provider("arn:aws:iam::123456789012:oidc-provider/accounts.google.com")
        .add_identity_provider(PROVIDER_ARN)
        .with_stack_outputs(
            "site-github-oidc",
            [("DeployRoleArn", "arn:aws:iam::123456789012:role/site-deploy")],
        );

    let registration = IdentityRegistrar::new(Arc::new(plane.clone()))
        .register(&config.resolve_shared())
        .await
        .unwrap();

    assert!(registration.reused_provider);
    assert_eq!(registration.provider_arn.as_deref(), Some(PROVIDER_ARN));
    assert_eq!(
        registration.role_arn.as_deref(),
        Some("arn:aws:iam::123456789012:role/site-deploy")
    );
    assert!(!plane.was_called("create_identity_provider"));

    let deploy = &plane.get_method_calls("deploy_stack")[0];
    assert_eq!(deploy.target.as_deref(), Some("site-github-oidc"));
    assert!(deploy.args.contains(&format!("OIDCProviderArn={}", PROVIDER_ARN)));
    assert!(deploy.args.contains(&"Environment=shared".to_string()));
}

#[tokio::test]
async fn test_registrar_requests_new_provider() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().with_stack_outputs(
        "site-github-oidc",
        [
            ("DeployRoleArn", "arn:aws:iam::123456789012:role/site-deploy"),
            ("OidcProviderArn", PROVIDER_ARN),
        ],
    );

    let run = orchestrator(&plane)
        .run(&config, Action::Oidc, Some("dev"))
        .await
        .unwrap();

    let deploy = &plane.get_method_calls("deploy_stack")[0];
    assert!(deploy.args.contains(&"OIDCProviderArn=".to_string()));
    assert!(deploy.args.contains(&"GitHubOrg=acme".to_string()));
    assert!(deploy.args.contains(&"RepositoryName=web".to_string()));
    assert!(deploy.args.contains(&"Environment=dev".to_string()));
    assert!(!plane.was_called("create_identity_provider"));

    match run.report {
        ActionReport::Oidc(registration) => {
            assert!(!registration.reused_provider);
            assert_eq!(registration.provider_arn.as_deref(), Some(PROVIDER_ARN));
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn test_registrar_deploy_failure_skips_role_lookup() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().fail_method("deploy_stack", "AccessDenied");

    let err = IdentityRegistrar::new(Arc::new(plane.clone()))
        .register(&config.resolve_shared())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::RemoteOperation);
    assert!(!plane.was_called("describe_stack"));
}

#[tokio::test]
async fn test_partial_outputs_warn_but_block_content() {
    let (dir, config) = project();
    let plane = MockControlPlane::new().add_existing_stack(
        "site-dev",
        [
            ("WebsiteBucketName", "site-dev-content"),
            ("WebsiteDomainName", "dev.example.com"),
        ],
    );

    let outputs = orchestrator(&plane)
        .run(&config, Action::Outputs, Some("dev"))
        .await
        .unwrap();
    assert_eq!(outputs.report.warnings().len(), 1);

    let err = ContentPublisher::new(Arc::new(plane.clone()))
        .publish(&config.resolve("dev").unwrap(), &dir.path().join("website"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PilotError::MissingOutput { ref key, .. } if key == "CloudFrontDistributionId"
    ));
    assert!(!plane.was_called("sync_directory"));
}

#[tokio::test]
async fn test_outputs_for_missing_stack() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();

    let err = OutputExtractor::new(Arc::new(plane))
        .extract(&config.resolve("dev").unwrap().stack_name)
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::StackNotFound(_)));
}

#[tokio::test]
async fn test_content_sync_then_invalidate() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new().add_existing_stack("site-dev", site_outputs());

    let run = orchestrator(&plane)
        .run(&config, Action::Content, Some("dev"))
        .await
        .unwrap();

    assert_eq!(
        plane.method_names(),
        vec!["caller_identity", "describe_stack", "sync_directory", "invalidate_paths"]
    );
    let sync = &plane.get_method_calls("sync_directory")[0];
    assert_eq!(sync.target.as_deref(), Some("site-dev-content"));
    assert!(sync.args.contains(&"--delete".to_string()));
    let invalidation = &plane.get_method_calls("invalidate_paths")[0];
    assert_eq!(invalidation.target.as_deref(), Some("E2EXAMPLE"));
    assert_eq!(invalidation.args, vec!["/*"]);

    match run.report {
        ActionReport::Content(report) => {
            assert_eq!(report.sync.uploaded, 1);
            assert!(report.invalidation_id.starts_with('I'));
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_sync_prevents_invalidation() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new()
        .add_existing_stack("site-dev", site_outputs())
        .fail_method("sync_directory", "AccessDenied");

    let err = orchestrator(&plane)
        .run(&config, Action::Content, Some("dev"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::RemoteOperation);
    assert!(err.to_string().contains("site-dev-content"));
    assert!(plane.get_method_calls("invalidate_paths").is_empty());
}

#[tokio::test]
async fn test_content_dir_override() {
    let (dir, config) = project();
    let custom = dir.path().join("dist");
    fs::create_dir_all(&custom).unwrap();
    fs::write(custom.join("a.html"), "a").unwrap();
    fs::write(custom.join("b.html"), "b").unwrap();
    let plane = MockControlPlane::new().add_existing_stack("site-dev", site_outputs());

    let run = orchestrator(&plane)
        .with_content_dir(&custom)
        .run(&config, Action::Content, Some("dev"))
        .await
        .unwrap();

    match run.report {
        ActionReport::Content(report) => {
            assert_eq!(report.content_dir, custom);
            assert_eq!(report.sync.uploaded, 2);
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_content_dir() {
    let (dir, config) = project();
    let plane = MockControlPlane::new().add_existing_stack("site-dev", site_outputs());

    let err = ContentPublisher::new(Arc::new(plane.clone()))
        .publish(&config.resolve("dev").unwrap(), &dir.path().join("missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, PilotError::ContentDirNotFound(_)));
    assert_eq!(plane.call_count(), 0);
}

#[tokio::test]
async fn test_test_action_is_read_only() {
    let (_dir, config) = project();
    let plane = MockControlPlane::new();

    let run = orchestrator(&plane).run(&config, Action::Test, None).await.unwrap();

    assert_eq!(plane.method_names(), vec!["caller_identity"]);
    assert_eq!(plane.mutation_count(), 0);
    match run.report {
        ActionReport::Test {
            preflight,
            environment,
            environments,
        } => {
            assert_eq!(preflight.account, "123456789012");
            assert_eq!(environment, "shared");
            assert_eq!(environments, vec!["dev".to_string()]);
        }
        other => panic!("unexpected report: {other:?}"),
    }
}

#[tokio::test]
async fn test_test_action_validates_every_environment() {
    let dir = tempdir().unwrap();
    let content = r#"{
      "shared": { "name": "site", "region": "us-east-1", "github": { "org": "acme", "repo": "web" } },
      "environments": { "dev": { "parameters": {} }, "prod": { "params": {} } }
    }"#;
    let config = DeployConfig::parse(dir.path().join("config.json"), content).unwrap();
    let plane = MockControlPlane::new();

    let err = orchestrator(&plane).run(&config, Action::Test, None).await.unwrap_err();

    assert!(err.to_string().contains("prod"));
    assert_eq!(plane.call_count(), 0);
}

#[tokio::test]
async fn test_missing_template() {
    let (dir, config) = project();
    fs::remove_file(dir.path().join("infrastructure/main.yaml")).unwrap();
    let plane = MockControlPlane::new();

    let err = orchestrator(&plane)
        .run(&config, Action::Infra, Some("dev"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PilotError::TemplateNotFound(ref p) if p.ends_with(Path::new("infrastructure/main.yaml"))
    ));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}
