//! Canvas Style System
//!
//! Theme colors, node sizing constants and the per-node color rules shared by
//! the renderer and the hit tester.

use crate::graph::{Node, NodeKind};
use callgrid_core::{Color, Declaration};

// ============================================================================
// Theme
// ============================================================================

pub const COLOR_BACKGROUND: Color = Color::rgb(0x1f, 0x1f, 0x20);
pub const COLOR_DOT: Color = Color::rgba(255, 255, 255, 15);
pub const COLOR_NODE_FILL: Color = Color::rgb(0x3a, 0x3d, 0x41);
pub const COLOR_NODE_FILL_DARK: Color = Color::rgb(0x20, 0x21, 0x24);
pub const COLOR_NODE_BORDER: Color = Color::rgb(0x4a, 0x4d, 0x51);
pub const COLOR_NODE_TEXT: Color = Color::rgb(0xe8, 0xea, 0xed);
pub const COLOR_NODE_SUBTEXT: Color = Color::rgb(0xa9, 0xa9, 0xa9);
pub const COLOR_ENTRY_ACCENT: Color = Color::rgb(0xde, 0xa5, 0x84);
pub const COLOR_ADD_TOOL_BORDER: Color = Color::rgb(0x9a, 0xa0, 0xa6);

pub const COLOR_ERROR: Color = Color::rgb(0xd1, 0x69, 0x69);
pub const COLOR_ERROR_FILL: Color = Color::rgb(0x5a, 0x1e, 0x1e);
pub const COLOR_ERROR_OVERLAY: Color = Color::rgb(0xc2, 0x3a, 0x3a);
pub const COLOR_MODULE: Color = Color::rgb(0x4f, 0xc3, 0xf7);

pub const COLOR_SELECTION_FILL: Color = Color::rgba(0, 120, 215, 50);
pub const COLOR_SELECTION_BORDER: Color = Color::rgba(0, 120, 215, 180);
pub const COLOR_DRAG_PREVIEW: Color = Color::rgba(255, 255, 255, 178);
pub const COLOR_ACTIVE_GLOW: Color = Color::rgba(255, 255, 255, 60);
pub const COLOR_HINT_TEXT: Color = Color::rgb(220, 220, 220);

// ============================================================================
// Geometry
// ============================================================================

pub const DOT_SPACING: f32 = 28.0;
pub const DOT_RADIUS: f32 = 1.8;

pub const NODE_FONT_SIZE: f32 = 14.0;
pub const NODE_MIN_WIDTH: f32 = 100.0;
pub const NODE_MAX_WIDTH: f32 = 300.0;
pub const NODE_TEXT_PADDING: f32 = 40.0;
pub const NODE_VERTICAL_PADDING: f32 = 20.0;
pub const NODE_CORNER_RADIUS: f32 = 8.0;
pub const NODE_ICON_SIZE: f32 = 70.0;
pub const CUSTOM_CONTENT_SIDE: f32 = 60.0;
pub const ADD_TOOL_SIDE: f32 = 80.0;
pub const SQUARE_PADDING: f32 = 40.0;

pub const CONNECTION_WIDTH: f32 = 2.0;
pub const CONNECTION_ERROR_WIDTH: f32 = 3.0;
pub const ARROW_SIZE: f32 = 10.0;
pub const ARROW_HALF_WIDTH: f32 = 6.0;

/// Radius used for bounding boxes and reset-view fitting.
///
/// Grows with complexity, parameter count and name length, each term capped.
pub fn node_radius(decl: &Declaration) -> f32 {
    30.0 + (2.0 * decl.complexity as f32).min(10.0)
        + (1.5 * decl.params.len() as f32).min(8.0)
        + (0.4 * decl.name.chars().count() as f32).min(6.0)
}

/// Fill, border and text colors for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeColors {
    pub fill: Color,
    pub border: Color,
    pub text: Color,
}

/// Resolve the colors a node is drawn with, before opacity is applied.
pub fn node_colors(node: &Node, selected: bool) -> NodeColors {
    if node.error.is_some() {
        return NodeColors {
            fill: COLOR_ERROR_FILL,
            border: if selected {
                COLOR_ERROR_OVERLAY
            } else {
                COLOR_ERROR
            },
            text: COLOR_NODE_TEXT,
        };
    }

    let accent = node.color();
    let border = match node.kind {
        NodeKind::AddTool => COLOR_ADD_TOOL_BORDER,
        NodeKind::EntryFile => COLOR_ENTRY_ACCENT,
        _ if selected => accent.lighten(0.5),
        _ => accent,
    };
    let fill = if node.active {
        COLOR_NODE_FILL.lighten(0.15)
    } else {
        COLOR_NODE_FILL
    };

    NodeColors {
        fill,
        border,
        text: COLOR_NODE_TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_core::DeclarationKind;

    fn decl(name: &str, complexity: u32, params: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: DeclarationKind::Function,
            start_line: 1,
            end_line: 1,
            params: (0..params).map(|i| format!("p{i}")).collect(),
            doc: String::new(),
            return_type: None,
            complexity,
            source: String::new(),
        }
    }

    #[test]
    fn test_node_radius_terms() {
        assert!((node_radius(&decl("ab", 1, 0)) - (30.0 + 2.0 + 0.8)).abs() < 1e-4);
        // every term saturates
        let big = decl(&"x".repeat(40), 20, 12);
        assert!((node_radius(&big) - 54.0).abs() < 1e-4);
    }

    #[test]
    fn test_error_colors_win() {
        let mut node = Node::custom_text("note", "hello");
        node.error = Some(crate::graph::NodeError {
            line: 3,
            message: "boom".into(),
        });
        assert_eq!(node_colors(&node, false).border, COLOR_ERROR);
        assert_eq!(node_colors(&node, true).border, COLOR_ERROR_OVERLAY);
    }
}
