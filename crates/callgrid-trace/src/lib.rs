//! Live call tracing: the line protocol spoken by instrumented programs and
//! the socket listener that receives it off the UI thread.

pub mod listener;
pub mod wire;

pub use listener::{DEFAULT_PORT, ListenerConfig, TraceError, TraceListener};
pub use wire::{TraceEvent, parse_line};
