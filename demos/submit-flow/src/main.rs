//! # Submit Flow Demo
//!
//! Walks one actor through a submission, an immediate duplicate, and a
//! submission whose record write fails, against in-memory collaborators.
//!
//! Run with `RUST_LOG=postgate=debug` to see every state transition.

use anyhow::Result;
use postgate::{load_record, SubmissionConfig, SubmissionRequest};
use postgate_testing::{candidate, TestHarness};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let config = SubmissionConfig::from_env()?.with_destination("pixelary");
    let harness = TestHarness::with_config(config);
    let orchestrator = harness.orchestrator();

    // First submission goes through.
    let request = SubmissionRequest::new("u1", candidate("cat", "animals"))
        .with_attribute("flair-easy");
    let submitted = orchestrator.submit(request).await?;
    info!(resource_id = %submitted.navigate_to, "created");

    let stored = load_record(harness.records.as_ref(), &submitted.navigate_to).await?;
    if let Some(record) = stored {
        let json = serde_json::to_string(&record)?;
        info!(record = %json, "stored record");
    }

    // Same actor, inside the lockout window.
    let duplicate = SubmissionRequest::new("u1", candidate("dog", "animals"));
    if let Err(e) = orchestrator.submit(duplicate).await {
        warn!(error = %e, notice = e.notice().message(), "duplicate rejected");
    }

    // Another actor whose canonical record write fails.
    harness.records.fail_puts(true);
    let failing = SubmissionRequest::new("u2", candidate("tree", "nature"));
    if let Err(e) = orchestrator.submit(failing).await {
        warn!(
            resource_id = ?e.resource_id().map(|id| id.as_str()),
            failed_steps = ?e.failed_steps(),
            notice = e.notice().message(),
            "partial submission"
        );
    }

    info!(
        resources = harness.resources.created().len(),
        jobs = harness.scheduler.jobs().len(),
        "done"
    );
    Ok(())
}
