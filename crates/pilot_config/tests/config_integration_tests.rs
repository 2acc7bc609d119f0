//! Integration tests for configuration loading and resolution.

use std::fs;
use std::path::PathBuf;

use pilot_config::{ConfigError, DeployConfig, DocumentLayout, SHARED_ENVIRONMENT};
use tempfile::tempdir;

const SITE_CONFIG: &str = r#"{
  "shared": {
    "name": "site",
    "region": "us-east-1",
    "github": { "org": "acme", "repo": "web" }
  },
  "environments": {
    "dev": { "parameters": { "SubDomain": "dev", "CreateApex": "no" } },
    "prod": { "parameters": {} }
  }
}"#;

fn write_config(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn test_resolve_dev_environment() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let config = DeployConfig::load(&path).unwrap();
    let ctx = config.resolve("dev").unwrap();

    assert_eq!(ctx.project_name, "site");
    assert_eq!(ctx.region, "us-east-1");
    assert_eq!(ctx.environment, "dev");
    assert_eq!(ctx.stack_name, "site-dev");
    assert_eq!(ctx.package_bucket_name, "site-cf-templates-us-east-1");
    assert_eq!(ctx.identity_stack_name, "site-github-oidc");
    assert_eq!(ctx.github.org, "acme");
    assert_eq!(ctx.github.repo, "web");
    assert_eq!(ctx.solution, "stackpilot");
}

#[test]
fn test_parameters_are_sorted_by_name() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let ctx = DeployConfig::load(&path).unwrap().resolve("dev").unwrap();

    assert_eq!(
        ctx.parameter_overrides(),
        vec!["CreateApex=no".to_string(), "SubDomain=dev".to_string()]
    );
}

#[test]
fn test_repeated_resolution_is_identical() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let first = DeployConfig::load(&path).unwrap().resolve("dev").unwrap();
    let second = DeployConfig::load(&path).unwrap().resolve("dev").unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_empty_parameters_are_allowed() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let ctx = DeployConfig::load(&path).unwrap().resolve("prod").unwrap();

    assert!(ctx.parameters.is_empty());
    assert_eq!(ctx.stack_name, "site-prod");
}

#[test]
fn test_unknown_environment() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let err = DeployConfig::load(&path).unwrap().resolve("staging").unwrap_err();

    match err {
        ConfigError::EnvironmentNotFound {
            environment,
            available,
            ..
        } => {
            assert_eq!(environment, "staging");
            assert_eq!(available, vec!["dev".to_string(), "prod".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let err = DeployConfig::load(&path).unwrap_err();

    assert!(matches!(err, ConfigError::ConfigNotFound(p) if p == path));
}

#[test]
fn test_invalid_json_is_malformed() {
    let (_dir, path) = write_config("config.json", "{ not json");

    let err = DeployConfig::load(&path).unwrap_err();

    assert!(matches!(err, ConfigError::MalformedConfig { .. }));
    assert!(err.to_string().contains("invalid JSON"));
}

#[test]
fn test_missing_shared_section() {
    let (_dir, path) = write_config("config.json", r#"{"environments": {}}"#);

    let err = DeployConfig::load(&path).unwrap_err();

    assert!(err.to_string().contains("missing `shared` section"));
}

#[test]
fn test_environment_without_parameters_is_malformed() {
    let content = r#"{
      "shared": { "name": "site", "region": "eu-west-1", "github": { "org": "a", "repo": "b" } },
      "environments": { "dev": {} }
    }"#;
    let (_dir, path) = write_config("config.json", content);

    let config = DeployConfig::load(&path).unwrap();
    let err = config.resolve("dev").unwrap_err();

    assert!(matches!(err, ConfigError::MalformedConfig { .. }));
}

#[test]
fn test_yaml_document() {
    let content = r#"
shared:
  name: site
  region: eu-west-1
  github:
    org: acme
    repo: web
  solution: static-site
environments:
  staging:
    parameters:
      SubDomain: staging
"#;
    let (_dir, path) = write_config("config.yaml", content);

    let ctx = DeployConfig::load(&path).unwrap().resolve("staging").unwrap();

    assert_eq!(ctx.package_bucket_name, "site-cf-templates-eu-west-1");
    assert_eq!(ctx.solution, "static-site");
    assert_eq!(ctx.parameter_overrides(), vec!["SubDomain=staging".to_string()]);
}

#[test]
fn test_legacy_flat_layout() {
    let content = r#"{
      "_shared": { "name": "site", "region": "us-east-1", "github": { "org": "acme", "repo": "web" } },
      "dev": { "parameters": { "SubDomain": "dev" } }
    }"#;
    let (_dir, path) = write_config("config.json", content);

    let config = DeployConfig::load(&path).unwrap();

    assert_eq!(config.layout(), DocumentLayout::LegacyFlat);
    assert_eq!(config.environment_names(), vec!["dev".to_string()]);
    assert_eq!(config.resolve("dev").unwrap().stack_name, "site-dev");
}

#[test]
fn test_shared_pseudo_environment() {
    let (_dir, path) = write_config("config.json", SITE_CONFIG);

    let config = DeployConfig::load(&path).unwrap();
    let ctx = config.resolve_shared();

    assert_eq!(ctx.environment, SHARED_ENVIRONMENT);
    assert!(ctx.is_shared());
    assert!(ctx.parameters.is_empty());
    assert_eq!(ctx.identity_stack_name, "site-github-oidc");
}

#[test]
fn test_paths_resolve_next_to_document() {
    let (dir, path) = write_config("config.json", SITE_CONFIG);

    let ctx = DeployConfig::load(&path).unwrap().resolve("dev").unwrap();

    assert_eq!(ctx.paths.template, dir.path().join("infrastructure/main.yaml"));
    assert_eq!(ctx.paths.packaged_template(), dir.path().join("build/packaged-template.yaml"));
}
