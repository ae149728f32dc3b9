//! Step-reporting stream: a bounded event channel the discovery engine
//! writes into, plus the SSE framing adapter that drains it to the wire.
//!
//! Business logic never touches transport framing; it pushes `StreamEvent`s
//! through a [`StepReporter`] and a separate consumer renders each one with
//! [`sse_frame`]. Exactly one terminal event (`done` or `error`) is emitted
//! per run; the reporter enforces that and refuses step events afterwards.

use crate::core::error::{AppError, Result};
use crate::core::models::{DiscoveryResult, Step, StepStatus, StreamEvent};

use tokio::sync::mpsc;

/// Default capacity of the event channel. Small: one producer, one consumer,
/// and step events are low-volume.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Creates the bounded event channel a discovery run reports into.
pub fn event_channel() -> (mpsc::Sender<StreamEvent>, mpsc::Receiver<StreamEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Renders one event as a server-sent-events frame: `data: <json>\n\n`.
pub fn sse_frame(event: &StreamEvent) -> String {
    // StreamEvent serialization cannot fail: all fields are plain data.
    let json = serde_json::to_string(event).expect("StreamEvent serializes");
    format!("data: {}\n\n", json)
}

/// Push side of the step-reporting protocol for one discovery run.
///
/// Step ids increment monotonically from 1 and are never reused within a
/// run. Dropping the reporter closes the channel.
pub struct StepReporter {
    tx: mpsc::Sender<StreamEvent>,
    conversation_id: String,
    next_id: u64,
    terminal_sent: bool,
}

impl StepReporter {
    pub fn new(tx: mpsc::Sender<StreamEvent>, conversation_id: impl Into<String>) -> Self {
        Self {
            tx,
            conversation_id: conversation_id.into(),
            next_id: 1,
            terminal_sent: false,
        }
    }

    /// Emits a `running` step event and returns the step for later completion.
    pub async fn begin_step(&mut self, label: impl Into<String>) -> Result<Step> {
        if self.terminal_sent {
            return Err(AppError::Stream(
                "step emitted after terminal event".to_string(),
            ));
        }
        let step = Step {
            id: self.next_id,
            label: label.into(),
            status: StepStatus::Running,
        };
        self.next_id += 1;
        self.send(StreamEvent::Step { step: step.clone() }).await?;
        Ok(step)
    }

    /// Emits the matching `done` event for a previously begun step.
    pub async fn finish_step(&mut self, step: Step) -> Result<()> {
        if self.terminal_sent {
            return Err(AppError::Stream(
                "step emitted after terminal event".to_string(),
            ));
        }
        self.send(StreamEvent::Step {
            step: Step {
                status: StepStatus::Done,
                ..step
            },
        })
        .await
    }

    /// Emits the terminal `done` event. Sent at most once per run.
    pub async fn done(&mut self, result: DiscoveryResult) -> Result<()> {
        if self.terminal_sent {
            tracing::warn!(target: "discovery_stream", "Suppressing duplicate terminal event");
            return Ok(());
        }
        self.terminal_sent = true;
        self.send(StreamEvent::Done {
            done: true,
            result,
            conversation_id: self.conversation_id.clone(),
        })
        .await
    }

    /// Emits the terminal `error` event. Sent at most once per run.
    pub async fn error(&mut self, message: impl Into<String>) -> Result<()> {
        if self.terminal_sent {
            tracing::warn!(target: "discovery_stream", "Suppressing duplicate terminal event");
            return Ok(());
        }
        self.terminal_sent = true;
        self.send(StreamEvent::Error {
            error: message.into(),
            conversation_id: self.conversation_id.clone(),
        })
        .await
    }

    /// Whether a terminal event has already been emitted.
    pub fn is_closed(&self) -> bool {
        self.terminal_sent
    }

    async fn send(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| AppError::Stream("event receiver dropped".to_string()))
    }
}
