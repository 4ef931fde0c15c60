//! Investigation lifecycle events for streaming consumers.
//!
//! One event is emitted per retry-controller state transition. Transport is
//! the caller's concern: sinks are provided for tracing output, for a tokio
//! channel (push streaming), and for in-memory collection (tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Verdict;

/// Classification of an investigation lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageKind {
    /// Investigation accepted; retry loop about to start.
    Started { bug_id: String, max_attempts: u32 },

    /// Execution environment provisioned (image, network, sidecars).
    SessionReady { bug_id: String },

    /// A fix was requested from the generation capability.
    FixRequested { attempt: u32 },

    /// The generator produced a candidate.
    FixGenerated { attempt: u32, confidence: f64 },

    /// The candidate is running in the execution cell.
    ExecutionStarted { attempt: u32 },

    /// The execution result was classified.
    AttemptClassified {
        attempt: u32,
        verdict: Verdict,
        timed_out: bool,
    },

    /// A verified fix was found; loop stopped.
    Succeeded { attempt: u32 },

    /// Retries exhausted; manual-debugging guidance produced.
    FallbackEngaged { attempts: u32 },

    /// Retries exhausted with fallback disabled.
    Exhausted { attempts: u32 },

    /// Session resources released.
    TornDown { bug_id: String },
}

/// A single event in an investigation's execution trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestigationEvent {
    /// Monotonically increasing sequence number within the investigation.
    pub seq: u64,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Event classification and payload.
    pub kind: StageKind,

    /// Human-readable message for log streams.
    pub message: String,
}

impl InvestigationEvent {
    /// Create a new event.
    pub fn new(seq: u64, kind: StageKind, message: impl Into<String>) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}

/// Consumer of investigation events.
///
/// Implementations must be cheap and non-blocking; the retry controller
/// calls `emit` synchronously on its own task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &InvestigationEvent);
}

/// Sink that logs every event through `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &InvestigationEvent) {
        tracing::info!(seq = event.seq, stage = ?event.kind, "{}", event.message);
    }
}

/// Sink that forwards events into an unbounded tokio channel.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<InvestigationEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half for the streaming consumer.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<InvestigationEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &InvestigationEvent) {
        // A dropped receiver means the consumer went away; events are
        // best-effort and must not fail the investigation.
        let _ = self.sender.send(event.clone());
    }
}

/// Sink that collects events in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: std::sync::Mutex<Vec<InvestigationEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far.
    pub fn events(&self) -> Vec<InvestigationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &InvestigationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_roundtrip() {
        let event = InvestigationEvent::new(
            3,
            StageKind::AttemptClassified {
                attempt: 1,
                verdict: Verdict::Failed,
                timed_out: false,
            },
            "attempt 1: FAILED",
        );
        let json = serde_json::to_string(&event).expect("serialize");
        let deserialized: InvestigationEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_collecting_sink_preserves_order() {
        let sink = CollectingSink::new();
        for seq in 0..4 {
            sink.emit(&InvestigationEvent::new(
                seq,
                StageKind::FixRequested {
                    attempt: seq as u32 + 1,
                },
                format!("attempt {}", seq + 1),
            ));
        }
        let events = sink.events();
        assert_eq!(events.len(), 4);
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_events() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.emit(&InvestigationEvent::new(
            0,
            StageKind::Started {
                bug_id: "BUG-1".to_string(),
                max_attempts: 3,
            },
            "starting",
        ));
        let event = receiver.recv().await.expect("event delivered");
        assert_eq!(event.seq, 0);
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        // Must not panic.
        sink.emit(&InvestigationEvent::new(
            0,
            StageKind::Exhausted { attempts: 3 },
            "done",
        ));
    }
}
