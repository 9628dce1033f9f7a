//! Task group for independent, side-effecting units of work.
//!
//! Every unit is spawned onto the runtime, so it runs to completion even if
//! the future awaiting the group is dropped. Joining never cancels siblings.

use std::future::Future;

use anyhow::anyhow;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::{JoinError, JoinHandle};

/// A set of spawned tasks, each tagged with a key.
pub struct TaskGroup<K> {
    tasks: Vec<(K, JoinHandle<anyhow::Result<()>>)>,
}

impl<K> Default for TaskGroup<K> {
    fn default() -> Self {
        Self { tasks: Vec::new() }
    }
}

impl<K> TaskGroup<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` immediately under `key`.
    pub fn spawn<F>(&mut self, key: K, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.push((key, tokio::spawn(work)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task. Returns the failures, in spawn order.
    pub async fn join_all(self) -> Vec<(K, anyhow::Error)> {
        let joined = futures::future::join_all(
            self.tasks
                .into_iter()
                .map(|(key, handle)| async move { (key, flatten(handle.await)) }),
        )
        .await;

        joined
            .into_iter()
            .filter_map(|(key, outcome)| outcome.err().map(|error| (key, error)))
            .collect()
    }

    /// Wait until every task succeeds or one fails, whichever is observed
    /// first. Tasks still running on failure are left to finish detached.
    pub async fn try_join(self) -> Result<(), (K, anyhow::Error)> {
        let mut pending: FuturesUnordered<_> = self
            .tasks
            .into_iter()
            .map(|(key, handle)| async move { (key, flatten(handle.await)) })
            .collect();

        while let Some((key, outcome)) = pending.next().await {
            if let Err(error) = outcome {
                return Err((key, error));
            }
        }
        Ok(())
    }
}

fn flatten(joined: Result<anyhow::Result<()>, JoinError>) -> anyhow::Result<()> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(anyhow!("task panicked")),
        Err(e) => Err(anyhow!("task did not complete: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn join_all_with_no_failures_is_empty() {
        let mut group = TaskGroup::new();
        for i in 0..4 {
            group.spawn(i, async { Ok(()) });
        }
        assert_eq!(group.len(), 4);
        assert!(group.join_all().await.is_empty());
    }

    #[tokio::test]
    async fn join_all_reports_every_failure_in_spawn_order() {
        let mut group = TaskGroup::new();
        group.spawn("a", async { bail!("a broke") });
        group.spawn("b", async { Ok(()) });
        group.spawn("c", async { bail!("c broke") });

        let failures = group.join_all().await;
        let keys: Vec<_> = failures.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(failures[1].1.to_string(), "c broke");
    }

    async fn explode() -> anyhow::Result<()> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn panicking_task_counts_as_failure() {
        let mut group = TaskGroup::new();
        group.spawn("boom", explode());
        group.spawn("fine", async { Ok(()) });

        let failures = group.join_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "boom");
        assert!(failures[0].1.to_string().contains("panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn try_join_returns_early_without_cancelling_siblings() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut group = TaskGroup::new();

        let flag = finished.clone();
        group.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        group.spawn("fast", async { bail!("fast failed") });

        let (key, error) = group.try_join().await.unwrap_err();
        assert_eq!(key, "fast");
        assert_eq!(error.to_string(), "fast failed");
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropped_group_still_runs_its_tasks() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut group: TaskGroup<&str> = TaskGroup::new();
        group.spawn("write", async move {
            let _ = tx.send(());
            Ok(())
        });
        drop(group);

        assert!(rx.await.is_ok());
    }
}
