//! Concurrent duplicate submissions across many actors.

use std::collections::HashMap;
use std::time::Duration;

use postgate::{load_daily_index, ResourceId, SubmissionRequest, SubmitError};
use postgate_testing::{candidate, TestHarness};

const ACTORS: usize = 8;
const ATTEMPTS_PER_ACTOR: usize = 6;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_submissions_create_one_resource_per_actor() {
    let harness = TestHarness::new();
    harness
        .resources
        .set_create_delay(Some(Duration::from_millis(5)));
    let orchestrator = harness.orchestrator();

    let mut handles = Vec::new();
    for attempt in 0..ACTORS * ATTEMPTS_PER_ACTOR {
        let actor = format!("u{}", attempt % ACTORS);
        let jitter = Duration::from_micros(fastrand::u64(0..2_000));
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(jitter).await;
            let request = SubmissionRequest::new(actor.as_str(), candidate("cat", "animals"));
            (actor, orchestrator.submit(request).await)
        }));
    }

    let mut admitted: HashMap<String, Vec<ResourceId>> = HashMap::new();
    let mut denied = 0;
    for handle in handles {
        let (actor, outcome) = handle.await.unwrap();
        match outcome {
            Ok(submitted) => admitted.entry(actor).or_default().push(submitted.navigate_to),
            Err(SubmitError::AdmissionDenied { .. }) => denied += 1,
            Err(other) => panic!("unexpected failure for {actor}: {other}"),
        }
    }

    assert_eq!(admitted.len(), ACTORS);
    for (actor, resources) in &admitted {
        assert_eq!(resources.len(), 1, "{actor} admitted more than once");
    }
    assert_eq!(denied, ACTORS * (ATTEMPTS_PER_ACTOR - 1));
    assert_eq!(harness.resources.created().len(), ACTORS);
    assert_eq!(harness.resources.create_calls() as usize, ACTORS);
    assert_eq!(harness.records.record_count(), ACTORS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_actors_each_get_their_own_index_entry() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator();

    let handles: Vec<_> = (0..ACTORS)
        .map(|n| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_micros(fastrand::u64(0..1_000))).await;
                let request = SubmissionRequest::new(
                    format!("u{n}").as_str(),
                    candidate("dog", "animals"),
                );
                orchestrator.submit(request).await
            })
        })
        .collect();

    for handle in handles {
        let submitted = handle.await.unwrap().unwrap();
        let record = submitted.record;
        let index = load_daily_index(
            harness.records.as_ref(),
            &record.author_id,
            record.created_on(),
        )
        .await
        .unwrap();
        assert_eq!(index, vec![record]);
    }
}
