//! Host events and the channel used to feed them in from outside the loop

use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::point::Point;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events the host document delivers to the core, serialized as
/// `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<NodeId>,
    },
    /// `path` runs from the target up to the document root.
    Click { target: NodeId, path: Vec<NodeId> },
    KeyDown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<NodeId>,
        key: String,
    },
    Focus { target: NodeId },
    Blur { target: NodeId },
    Input { target: NodeId },
}

impl HostEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            HostEvent::PointerMove { .. } => "pointerMove",
            HostEvent::Click { .. } => "click",
            HostEvent::KeyDown { .. } => "keyDown",
            HostEvent::Focus { .. } => "focus",
            HostEvent::Blur { .. } => "blur",
            HostEvent::Input { .. } => "input",
        }
    }

    pub fn target(&self) -> Option<NodeId> {
        match self {
            HostEvent::PointerMove { target, .. } | HostEvent::KeyDown { target, .. } => *target,
            HostEvent::Click { target, .. }
            | HostEvent::Focus { target }
            | HostEvent::Blur { target }
            | HostEvent::Input { target } => Some(*target),
        }
    }

    pub fn pointer(&self) -> Option<Point> {
        match self {
            HostEvent::PointerMove { x, y, .. } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }
}

/// Sending half, cloneable across threads.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<HostEvent>,
}

impl EventSink {
    pub fn send(&self, event: HostEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::environment("event stream closed"))
    }
}

/// Receiving half, drained by the event loop.
#[derive(Debug)]
pub struct EventSource {
    rx: Receiver<HostEvent>,
}

impl EventSource {
    pub fn try_next(&self) -> Option<HostEvent> {
        self.rx.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<HostEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// All events available right now.
    pub fn drain(&self) -> Vec<HostEvent> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(e) => out.push(e),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// True once every sink is gone and the buffer is empty.
    pub fn is_closed(&self) -> bool {
        self.rx.is_empty() && matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

pub fn event_channel() -> (EventSink, EventSource) {
    let (tx, rx) = unbounded();
    (EventSink { tx }, EventSource { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let e = HostEvent::PointerMove {
            x: 1.0,
            y: 2.0,
            target: None,
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({"type": "pointerMove", "x": 1.0, "y": 2.0})
        );

        let parsed: HostEvent =
            serde_json::from_str(r#"{"type":"keyDown","key":"Enter"}"#).unwrap();
        assert_eq!(
            parsed,
            HostEvent::KeyDown {
                target: None,
                key: "Enter".into()
            }
        );
    }

    #[test]
    fn channel_delivers_in_order() {
        let (sink, source) = event_channel();
        let feeder = std::thread::spawn(move || {
            for i in 0..3 {
                sink.send(HostEvent::PointerMove {
                    x: i as f64,
                    y: 0.0,
                    target: None,
                })
                .unwrap();
            }
        });
        feeder.join().unwrap();

        let xs: Vec<f64> = source
            .drain()
            .iter()
            .filter_map(|e| e.pointer().map(|p| p.x))
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        assert!(source.is_closed());
    }
}
