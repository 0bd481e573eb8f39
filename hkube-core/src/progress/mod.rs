//! Per-node progress coordination.
//!
//! Every node is registered with the number of steps it will go through
//! before any step is reported. Phases then emit one event per completed
//! step, possibly from several tasks at once, and the orchestrator finally
//! waits until every node has reported all of its steps.
//!
//! # Example
//!
//! ```ignore
//! let tracker = ProgressTracker::new();
//! tracker.register("demo-worker-01", 4)?;
//! tracker.emit("demo-worker-01", "waiting for master")?;
//! // ...
//! tracker.await_all_complete().await?;
//! ```

use crate::error::{HkubeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Progress coordination contract used by the pipeline.
#[async_trait]
pub trait ProgressCoordinator: Send + Sync {
    /// Declare how many events `node` will emit. Must precede any `emit` for it.
    fn register(&self, node: &str, total_steps: usize) -> Result<()>;

    /// Record a completed step for `node`.
    fn emit(&self, node: &str, label: &str) -> Result<()>;

    /// Wait until every registered node has emitted all of its steps.
    async fn await_all_complete(&self) -> Result<()>;
}

/// Observer of progress, typically a terminal renderer.
///
/// Calls for one node arrive in emission order; calls for different nodes
/// may interleave arbitrarily. Implementations must not call back into the
/// tracker.
pub trait ProgressSink: Send + Sync {
    fn on_register(&self, node: &str, total_steps: usize);

    fn on_event(&self, node: &str, label: &str, completed: usize, total_steps: usize);
}

/// Progress of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub node: String,
    pub total_steps: usize,
    /// Event labels in emission order
    pub events: Vec<String>,
}

impl ProgressRecord {
    pub fn completed(&self) -> usize {
        self.events.len()
    }

    pub fn is_complete(&self) -> bool {
        self.events.len() >= self.total_steps
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Completion {
    registered: usize,
    complete: usize,
}

#[derive(Default)]
struct Records {
    by_node: HashMap<String, ProgressRecord>,
    order: Vec<String>,
}

/// In-memory [`ProgressCoordinator`].
pub struct ProgressTracker {
    records: Mutex<Records>,
    completion: watch::Sender<Completion>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (completion, _) = watch::channel(Completion::default());
        Self { records: Mutex::new(Records::default()), completion, sink: None }
    }

    /// Forward registrations and events to `sink`.
    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink), ..Self::new() }
    }

    /// Events received so far for `node`.
    pub fn events(&self, node: &str) -> Option<Vec<String>> {
        self.records.lock().by_node.get(node).map(|r| r.events.clone())
    }

    /// All records in registration order.
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        let records = self.records.lock();
        records.order.iter().filter_map(|name| records.by_node.get(name).cloned()).collect()
    }

    /// Whether every registered node has completed.
    pub fn is_complete(&self) -> bool {
        let c = *self.completion.borrow();
        c.complete >= c.registered
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressCoordinator for ProgressTracker {
    fn register(&self, node: &str, total_steps: usize) -> Result<()> {
        let mut records = self.records.lock();
        if records.by_node.contains_key(node) {
            return Err(HkubeError::ProgressAlreadyRegistered { node: node.to_string() });
        }

        records.by_node.insert(
            node.to_string(),
            ProgressRecord { node: node.to_string(), total_steps, events: Vec::new() },
        );
        records.order.push(node.to_string());

        let already_done = total_steps == 0;
        self.completion.send_modify(|c| {
            c.registered += 1;
            if already_done {
                c.complete += 1;
            }
        });

        if let Some(sink) = &self.sink {
            sink.on_register(node, total_steps);
        }
        debug!(node, total_steps, "Registered progress");
        Ok(())
    }

    fn emit(&self, node: &str, label: &str) -> Result<()> {
        let mut records = self.records.lock();
        let record = records
            .by_node
            .get_mut(node)
            .ok_or_else(|| HkubeError::UnknownProgressNode { node: node.to_string() })?;

        record.events.push(label.to_string());
        let completed = record.events.len();
        let total = record.total_steps;

        if completed == total {
            self.completion.send_modify(|c| c.complete += 1);
        }

        // Sink calls stay under the lock so one node's events reach it in order.
        if let Some(sink) = &self.sink {
            sink.on_event(node, label, completed, total);
        }
        trace!(node, label, completed, total, "Progress event");
        Ok(())
    }

    async fn await_all_complete(&self) -> Result<()> {
        let mut rx = self.completion.subscribe();
        rx.wait_for(|c| c.complete >= c.registered)
            .await
            .map_err(|e| HkubeError::Internal(format!("progress channel closed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_register(&self, node: &str, total_steps: usize) {
            self.calls.lock().push(format!("register {} {}", node, total_steps));
        }

        fn on_event(&self, node: &str, label: &str, completed: usize, total_steps: usize) {
            self.calls.lock().push(format!("{} {} {}/{}", node, label, completed, total_steps));
        }
    }

    #[test]
    fn test_emit_before_register_fails() {
        let tracker = ProgressTracker::new();
        let err = tracker.emit("ghost", "complete!").unwrap_err();
        assert!(matches!(err, HkubeError::UnknownProgressNode { node } if node == "ghost"));
    }

    #[test]
    fn test_double_register_fails() {
        let tracker = ProgressTracker::new();
        tracker.register("a", 2).unwrap();
        assert!(matches!(tracker.register("a", 3), Err(HkubeError::ProgressAlreadyRegistered { .. })));
    }

    #[test]
    fn test_events_kept_in_order_and_forwarded() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = ProgressTracker::with_sink(sink.clone());
        tracker.register("a", 2).unwrap();
        tracker.emit("a", "first").unwrap();
        tracker.emit("a", "second").unwrap();

        assert_eq!(tracker.events("a").unwrap(), vec!["first", "second"]);
        assert!(tracker.is_complete());
        assert_eq!(*sink.calls.lock(), vec!["register a 2", "a first 1/2", "a second 2/2"]);
    }

    #[test]
    fn test_snapshot_in_registration_order() {
        let tracker = ProgressTracker::new();
        tracker.register("demo-master-01", 3).unwrap();
        tracker.register("demo-worker-02", 2).unwrap();
        tracker.register("demo-worker-01", 2).unwrap();
        tracker.emit("demo-worker-01", "waiting for master").unwrap();
        tracker.emit("demo-worker-01", "registering node").unwrap();
        tracker.emit("demo-master-01", "packages installed").unwrap();

        let snapshot = tracker.snapshot();
        let names: Vec<_> = snapshot.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(names, vec!["demo-master-01", "demo-worker-02", "demo-worker-01"]);

        let counts: Vec<_> = snapshot.iter().map(|r| (r.completed(), r.total_steps, r.is_complete())).collect();
        assert_eq!(counts, vec![(1, 3, false), (0, 2, false), (2, 2, true)]);
        assert!(!tracker.is_complete());
    }

    #[tokio::test]
    async fn test_await_with_nothing_registered_returns() {
        let tracker = ProgressTracker::new();
        tokio::time::timeout(Duration::from_secs(1), tracker.await_all_complete()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_await_blocks_until_every_node_completes() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.register("a", 1).unwrap();
        tracker.register("b", 2).unwrap();
        tracker.emit("a", "done").unwrap();
        tracker.emit("b", "one").unwrap();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.await_all_complete().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.emit("b", "two").unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_emits_do_not_lose_events() {
        let tracker = Arc::new(ProgressTracker::new());
        let nodes: Vec<String> = (0..8).map(|i| format!("node-{}", i)).collect();
        for node in &nodes {
            tracker.register(node, 50).unwrap();
        }

        let mut tasks = tokio::task::JoinSet::new();
        for node in nodes.clone() {
            let tracker = tracker.clone();
            tasks.spawn(async move {
                for step in 0..50 {
                    tracker.emit(&node, &format!("step {}", step)).unwrap();
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        tracker.await_all_complete().await.unwrap();
        for node in &nodes {
            let events = tracker.events(node).unwrap();
            assert_eq!(events.len(), 50);
            assert_eq!(events[0], "step 0");
            assert_eq!(events[49], "step 49");
        }
    }
}
