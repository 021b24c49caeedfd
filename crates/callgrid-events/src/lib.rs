use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod host;

pub use host::{BusHost, HostCallbacks, NoopHost};

/// What the user picked in the "add node" dialog after a connection drag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewNode {
    /// Stub for a declaration the user is about to write.
    Declaration { name: String },
    Text { text: String },
    Image { path: String },
    Video { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // File
    FileLoaded {
        path: PathBuf,
        declarations: usize,
        edges: usize,
    },
    AnalysisFailed {
        path: PathBuf,
        error: String,
    },
    LayoutSaved {
        path: PathBuf,
    },
    LayoutLoaded {
        path: PathBuf,
    },

    // Canvas requests, forwarded from HostCallbacks
    NodeSelected {
        name: Option<String>,
    },
    NodeDoubleClicked {
        name: String,
    },
    ShowCode {
        name: String,
    },
    ShowNodeInfo {
        name: String,
    },
    AddRequested {
        source: Option<String>,
    },
    ConnectionDragCompleted {
        source: String,
        x: f32,
        y: f32,
    },
    OpenFile {
        path: PathBuf,
        line: Option<usize>,
    },
    OpenEditor {
        node: String,
        path: PathBuf,
        line: Option<usize>,
    },
    StopRun,
    ToggleTraceOverlay,
    SaveLayoutRequested,
    OpenLayoutRequested,
    SearchRequested,

    // History
    UndoStackChanged {
        can_undo: bool,
        can_redo: bool,
        undo_description: Option<String>,
        redo_description: Option<String>,
    },

    // Live trace
    TraceListening {
        port: u16,
    },
    TraceStopped,
    TraceCall {
        node: String,
    },
    CompilerError {
        file: PathBuf,
        line: usize,
        message: String,
    },

    // Notifications
    ShowInfo {
        message: String,
    },
    ShowSuccess {
        message: String,
    },
    ShowWarning {
        message: String,
    },
    ShowError {
        message: String,
    },
    StatusUpdate {
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event bus has no receivers");
        }
    }

    /// Drain pending events without dispatching them.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    /// This is useful for processing events in the UI loop.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
/// Implement this to receive events from the EventBus.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_publish_receive() {
        let bus = EventBus::new();
        bus.sender()
            .send(Event::NodeSelected {
                name: Some("parse".into()),
            })
            .unwrap();

        match bus.receiver().recv().unwrap() {
            Event::NodeSelected { name } => assert_eq!(name.as_deref(), Some("parse")),
            other => panic!("Expected NodeSelected, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_to_listener() {
        struct Counter(usize);
        impl EventListener for Counter {
            fn handle_event(&mut self, event: &Event) {
                if matches!(event, Event::StopRun | Event::ToggleTraceOverlay) {
                    self.0 += 1;
                }
            }
        }

        let bus = EventBus::new();
        bus.publish(Event::StopRun);
        bus.publish(Event::TraceStopped);
        bus.publish(Event::ToggleTraceOverlay);

        let mut counter = Counter(0);
        bus.dispatch_to(&mut counter);
        assert_eq!(counter.0, 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_new_node_serde() {
        let json = serde_json::to_string(&NewNode::Text {
            text: "note".into(),
        })
        .unwrap();
        let back: NewNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NewNode::Text { text: "note".into() });
    }
}
