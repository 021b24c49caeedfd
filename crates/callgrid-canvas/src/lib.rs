//! Headless canvas: scene state, interaction, undo history, live tracing
//! and compiler error overlays for one analyzed file at a time.
//!
//! Nothing here touches a windowing toolkit. A GUI maps its input onto
//! [`input`] events, calls [`Canvas::tick`] on the interval it returns and
//! paints the [`RenderList`] from [`Canvas::render`].

pub mod annotations;
pub mod canvas;
pub mod commands;
pub mod config;
pub mod document;
pub mod errors;
pub mod input;
pub mod interaction;
pub mod pacer;
pub mod render;
pub mod scene;
pub mod session;
pub mod tracer;

pub use annotations::{AnnotationTool, Annotations, Stroke, TextNote};
pub use canvas::Canvas;
pub use commands::{Command, CommandError, CommandHistory};
pub use config::CanvasConfig;
pub use document::{ApplyReport, DocumentError, LayoutDocument};
pub use errors::{ErrorRegistry, FileError};
pub use input::{Key, Modifiers, PointerButton};
pub use interaction::{
    ContextAction, ContextTarget, InteractionContext, InteractionController, InteractionState,
};
pub use pacer::FramePacer;
pub use render::RenderList;
pub use scene::{Scene, Selection};
pub use session::{SessionCache, absolute_path};
pub use tracer::LiveTracer;
