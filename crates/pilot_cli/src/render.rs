//! Human-readable report output.

use pilot_core::{ActionReport, ActionRun, OutputReport};
use pilot_runner::{BucketStatus, DeployOutcome};

pub fn print_run(run: &ActionRun) {
    match &run.report {
        ActionReport::Test {
            preflight,
            environment,
            environments,
        } => {
            println!("🔍 Checking deployment prerequisites ({})", environment);
            for (tool, path) in &preflight.tools {
                println!("   ✅ {} found at {}", tool, path.display());
            }
            println!("   ✅ Authenticated as {}", preflight.caller_arn);
            println!("   ✅ Account {}", preflight.account);
            if environments.is_empty() {
                println!("   ⚠️  No environments configured");
            } else {
                println!("   ✅ Environments: {}", environments.join(", "));
            }
        }
        ActionReport::Oidc(registration) => {
            println!("🔐 Identity stack {}: {}", registration.stack_name, registration.outcome);
            match (&registration.provider_arn, registration.reused_provider) {
                (Some(arn), true) => println!("   Provider (reused): {}", arn),
                (Some(arn), false) => println!("   Provider: {}", arn),
                (None, _) => {}
            }
            match &registration.role_arn {
                Some(arn) => println!("   Deploy role: {}", arn),
                None => println!("   ⚠️  Deploy role not created yet (dry run)"),
            }
        }
        ActionReport::Infra {
            deployment,
            outputs,
        } => {
            println!(
                "🏗️  Stack {}: {}",
                deployment.stack_name,
                outcome_line(&deployment.outcome)
            );
            let bucket = match deployment.bucket_status {
                BucketStatus::Created => "created",
                BucketStatus::AlreadyExists => "already exists",
            };
            println!("   Template bucket {} ({})", deployment.package_bucket, bucket);
            println!("   Archive: {}", deployment.archive.display());
            if let Some(outputs) = outputs {
                print_outputs(outputs);
            }
        }
        ActionReport::Content(report) => {
            println!(
                "📦 Synced {} to s3://{}",
                report.content_dir.display(),
                report.bucket
            );
            println!(
                "   {} uploaded, {} deleted",
                report.sync.uploaded, report.sync.deleted
            );
            println!(
                "   Invalidation {} on {}",
                report.invalidation_id, report.distribution_id
            );
        }
        ActionReport::Outputs(outputs) => print_outputs(outputs),
    }

    for warning in run.report.warnings() {
        println!("   ⚠️  {}", warning);
    }
    println!(
        "✅ {} finished for {} in {} ms",
        run.action,
        run.environment,
        run.duration_ms()
    );
}

fn outcome_line(outcome: &DeployOutcome) -> String {
    match outcome {
        DeployOutcome::NoChanges => "up to date".to_string(),
        other => other.to_string(),
    }
}

fn print_outputs(outputs: &OutputReport) {
    println!("📋 Outputs of {}", outputs.stack_name);
    let rows = [
        ("Bucket", outputs.bucket.as_deref()),
        ("Distribution", outputs.distribution_id.as_deref()),
        ("Domain", outputs.domain_name.as_deref()),
    ];
    for (label, value) in rows {
        println!("   {:<13} {}", label, value.unwrap_or("-"));
    }
    if let Some(url) = outputs.website_url() {
        println!("   {:<13} {}", "URL", url);
    }
}
