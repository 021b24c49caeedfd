//! Host capability interface.
//!
//! The canvas never opens files, spawns processes or shows dialogs itself.
//! It calls into a [`HostCallbacks`] implementation injected when it is
//! built.

use crate::{Event, EventBus};
use std::path::Path;

/// Everything the canvas asks of its host.
///
/// The first four methods are required. The rest are notifications with
/// no-op defaults.
pub trait HostCallbacks {
    fn open_file(&mut self, path: &Path, line: Option<usize>);
    fn open_editor(&mut self, node: &str, path: &Path, line: Option<usize>);
    fn stop_run(&mut self);
    fn toggle_trace_overlay(&mut self);

    fn show_code(&mut self, _node: &str) {}
    fn show_info(&mut self, _node: &str) {}
    fn add_requested(&mut self, _source: Option<&str>) {}
    /// A connection drag from `source` ended over empty space at a world point.
    fn connection_drag_completed(&mut self, _source: &str, _x: f32, _y: f32) {}
    fn node_selected(&mut self, _node: Option<&str>) {}
    fn node_double_clicked(&mut self, _node: &str) {}
    fn save_layout_requested(&mut self) {}
    fn open_layout_requested(&mut self) {}
    fn search_requested(&mut self) {}
}

/// Host that ignores every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl HostCallbacks for NoopHost {
    fn open_file(&mut self, _path: &Path, _line: Option<usize>) {}
    fn open_editor(&mut self, _node: &str, _path: &Path, _line: Option<usize>) {}
    fn stop_run(&mut self) {}
    fn toggle_trace_overlay(&mut self) {}
}

/// Forwards every request onto an [`EventBus`] so the UI loop can handle
/// it later through an `EventListener`.
#[derive(Debug, Clone)]
pub struct BusHost {
    bus: EventBus,
}

impl BusHost {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl HostCallbacks for BusHost {
    fn open_file(&mut self, path: &Path, line: Option<usize>) {
        self.bus.publish(Event::OpenFile {
            path: path.to_path_buf(),
            line,
        });
    }

    fn open_editor(&mut self, node: &str, path: &Path, line: Option<usize>) {
        self.bus.publish(Event::OpenEditor {
            node: node.to_string(),
            path: path.to_path_buf(),
            line,
        });
    }

    fn stop_run(&mut self) {
        self.bus.publish(Event::StopRun);
    }

    fn toggle_trace_overlay(&mut self) {
        self.bus.publish(Event::ToggleTraceOverlay);
    }

    fn show_code(&mut self, node: &str) {
        self.bus.publish(Event::ShowCode {
            name: node.to_string(),
        });
    }

    fn show_info(&mut self, node: &str) {
        self.bus.publish(Event::ShowNodeInfo {
            name: node.to_string(),
        });
    }

    fn add_requested(&mut self, source: Option<&str>) {
        self.bus.publish(Event::AddRequested {
            source: source.map(str::to_string),
        });
    }

    fn connection_drag_completed(&mut self, source: &str, x: f32, y: f32) {
        self.bus.publish(Event::ConnectionDragCompleted {
            source: source.to_string(),
            x,
            y,
        });
    }

    fn node_selected(&mut self, node: Option<&str>) {
        self.bus.publish(Event::NodeSelected {
            name: node.map(str::to_string),
        });
    }

    fn node_double_clicked(&mut self, node: &str) {
        self.bus.publish(Event::NodeDoubleClicked {
            name: node.to_string(),
        });
    }

    fn save_layout_requested(&mut self) {
        self.bus.publish(Event::SaveLayoutRequested);
    }

    fn open_layout_requested(&mut self) {
        self.bus.publish(Event::OpenLayoutRequested);
    }

    fn search_requested(&mut self) {
        self.bus.publish(Event::SearchRequested);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_host_forwards_requests() {
        let bus = EventBus::new();
        let mut host = BusHost::new(bus.clone());
        host.open_file(Path::new("/tmp/a.rs"), Some(3));
        host.connection_drag_completed("parse", 10.0, -4.0);
        host.node_selected(None);

        let events = bus.drain();
        assert_eq!(
            events,
            vec![
                Event::OpenFile {
                    path: "/tmp/a.rs".into(),
                    line: Some(3)
                },
                Event::ConnectionDragCompleted {
                    source: "parse".into(),
                    x: 10.0,
                    y: -4.0
                },
                Event::NodeSelected { name: None },
            ]
        );
    }
}
