//! The orchestrator/supervisor protocol
//!
//! Lifecycle events cross the process boundary as [`Envelope`]s, one JSON
//! object per line. The orchestrator is the only sender. When the supervisor
//! has rendered everything it received and sees end-of-input, it answers
//! with a single [`Ack`] line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::bus::{Event, EventBus, EventKind};

/// Wire form of an [`Event`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message: EventKind,
    pub payload: Value,
}

impl Envelope {
    pub fn new(message: EventKind, payload: Value) -> Self {
        Self { message, payload }
    }

    /// Encode as one line of JSON, without the newline
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

impl From<&Event> for Envelope {
    fn from(event: &Event) -> Self {
        Self::new(event.kind, event.payload.clone())
    }
}

/// The supervisor's answer once it has drained its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Number of envelope lines received and rendered
    pub drained: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("envelope channel is closed")]
    Closed,
}

/// Sending half of an ordered, unbounded envelope channel
///
/// Clones share one underlying sender, so [`EnvelopeSender::close`] on any
/// clone closes the channel for all of them. Envelopes sent before the close
/// are still delivered.
#[derive(Debug, Clone)]
pub struct EnvelopeSender {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<Envelope>>>>,
    sent: Arc<AtomicU64>,
}

impl EnvelopeSender {
    pub fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = slot.as_ref().ok_or(ChannelError::Closed)?;
        tx.send(envelope).map_err(|_| ChannelError::Closed)?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting envelopes; the receiver ends after the queued ones
    pub fn close(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

/// Receiving half of an envelope channel
#[derive(Debug)]
pub struct EnvelopeReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl EnvelopeReceiver {
    /// Next envelope in send order, or `None` once closed and drained
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Everything currently queued, without waiting
    pub fn drain_ready(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            out.push(envelope);
        }
        out
    }
}

pub fn envelope_channel() -> (EnvelopeSender, EnvelopeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = EnvelopeSender {
        slot: Arc::new(Mutex::new(Some(tx))),
        sent: Arc::new(AtomicU64::new(0)),
    };
    (sender, EnvelopeReceiver { rx })
}

/// Forward every lifecycle event published on `bus` to `sender`
///
/// This is the only path by which status leaves the orchestrator.
pub fn bridge(bus: &EventBus, sender: &EnvelopeSender) {
    for kind in EventKind::ALL {
        let sender = sender.clone();
        bus.subscribe(kind, move |event| {
            if let Err(e) = sender.send(Envelope::from(event)) {
                warn!(event = %event.kind, error = %e, "dropping envelope");
            }
        });
    }
}
