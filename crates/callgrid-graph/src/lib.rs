pub mod camera;
pub mod edge_router;
pub mod geometry;
pub mod graph;
pub mod hit_tester;
pub mod layout;
pub mod style;

pub use camera::{Camera, CameraState};
pub use edge_router::{EdgeCurve, EdgeRouter};
pub use geometry::{Rect, Vec2};
pub use graph::{
    Connection, ConnectionKind, CustomContent, GraphError, GraphModel, Node, NodeError, NodeKind,
};
pub use hit_tester::{FixedMetrics, HitTester, TextMetrics, node_rect};
pub use layout::{GridLayout, GridLayouter, GridPos, LayoutNode, Layouter};
