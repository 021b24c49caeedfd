use crate::geometry::Vec2;
use crate::graph::GraphModel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

impl GridPos {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// True when the two cells share a row or a column.
    pub fn aligned(self, other: GridPos) -> bool {
        self.col == other.col || self.row == other.row
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        (self.col - other.col).abs() + (self.row - other.row).abs()
    }
}

/// Layout input: a node name and the line used to order roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNode {
    pub name: String,
    pub line: usize,
}

impl LayoutNode {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub cells: BTreeMap<String, GridPos>,
}

impl GridLayout {
    pub fn get(&self, name: &str) -> Option<GridPos> {
        self.cells.get(name).copied()
    }

    /// Edges whose endpoints share neither a row nor a column.
    pub fn misaligned<'a>(&self, edges: &'a [(String, String)]) -> Vec<&'a (String, String)> {
        edges
            .iter()
            .filter(|(from, to)| match (self.get(from), self.get(to)) {
                (Some(a), Some(b)) => from != to && !a.aligned(b),
                _ => false,
            })
            .collect()
    }
}

pub trait Layouter {
    fn execute(&self, model: &GraphModel) -> GridLayout;
}

/// Up, right, down, left.
const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Widest ring searched around a parent before falling back to its row.
const MAX_RING: i32 = 30;

/// Orthogonal grid layout.
///
/// Every edge ends up with both endpoints on one row or one column, and no
/// two nodes share a cell. Placement is deterministic for a given node order
/// and edge order.
#[derive(Debug, Clone, Copy)]
pub struct GridLayouter {
    /// Pixel position of cell (0, 0).
    pub margin: Vec2,
    /// Pixel distance between neighbouring cells.
    pub spacing: f32,
    /// Columns between consecutive root origins.
    pub root_gap: i32,
    /// Longest axis-aligned edge the clamp pass tolerates.
    pub clamp_distance: i32,
}

impl Default for GridLayouter {
    fn default() -> Self {
        Self {
            margin: Vec2::new(110.0, 90.0),
            spacing: 400.0,
            root_gap: 3,
            clamp_distance: 6,
        }
    }
}

impl Layouter for GridLayouter {
    fn execute(&self, model: &GraphModel) -> GridLayout {
        let nodes: Vec<LayoutNode> = model
            .nodes()
            .iter()
            .map(|n| LayoutNode::new(n.name.clone(), n.start_line().unwrap_or(usize::MAX)))
            .collect();
        self.arrange(&nodes, &model.layout_edges())
    }
}

impl GridLayouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_pixel(&self, pos: GridPos) -> Vec2 {
        Vec2::new(
            self.margin.x + pos.col as f32 * self.spacing,
            self.margin.y + pos.row as f32 * self.spacing,
        )
    }

    /// Nearest cell for a pixel position.
    pub fn to_grid(&self, point: Vec2) -> GridPos {
        GridPos::new(
            ((point.x - self.margin.x) / self.spacing).round() as i32,
            ((point.y - self.margin.y) / self.spacing).round() as i32,
        )
    }

    pub fn arrange(&self, nodes: &[LayoutNode], edges: &[(String, String)]) -> GridLayout {
        let mut order: Vec<&LayoutNode> = nodes.iter().collect();
        order.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.name.cmp(&b.name)));
        order.dedup_by(|a, b| a.name == b.name);

        let ids: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i))
            .collect();
        let topology = Topology::new(order.len(), edges, &ids);
        let mut grid = Grid::new(order.len(), &topology.neighbours);

        self.place_trees(&mut grid, &topology);
        self.snap_to_parents(&mut grid, &topology, &order);
        self.clamp_long_edges(&mut grid, &topology);
        repair(&mut grid);

        let cells: Vec<GridPos> = grid.cells.iter().flatten().copied().collect();
        let min_col = cells.iter().map(|c| c.col).min().unwrap_or(0);
        let min_row = cells.iter().map(|c| c.row).min().unwrap_or(0);

        let cells = order
            .iter()
            .zip(&grid.cells)
            .filter_map(|(node, cell)| {
                cell.map(|c| {
                    (
                        node.name.clone(),
                        GridPos::new(c.col - min_col, c.row - min_row),
                    )
                })
            })
            .collect();
        GridLayout { cells }
    }

    /// Roots on row 0, `root_gap` columns apart, then breadth-first outward.
    /// Nodes no root reaches start their own tree past the current extent.
    fn place_trees(&self, grid: &mut Grid<'_>, topology: &Topology) {
        let mut roots: Vec<usize> = (0..topology.len())
            .filter(|&i| topology.parents[i].is_empty())
            .collect();
        if roots.is_empty() && topology.len() > 0 {
            roots.push(0);
        }

        let mut root_base = 0;
        for root in roots {
            if grid.cells[root].is_some() {
                continue;
            }
            let cell = grid.free_on_row(GridPos::new(root_base, 0));
            grid.place(root, cell);
            spread(grid, root, &topology.children);
            root_base = cell.col + self.root_gap;
        }

        for node in 0..topology.len() {
            if grid.cells[node].is_some() {
                continue;
            }
            let max_col = grid.occupied.keys().map(|c| c.col).max().unwrap_or(-1);
            let cell = grid.free_on_row(GridPos::new(max_col + 1, 0));
            grid.place(node, cell);
            spread(grid, node, &topology.children);
        }
    }

    /// Pull nodes with several parents onto the row or column of the nearest one.
    fn snap_to_parents(&self, grid: &mut Grid<'_>, topology: &Topology, order: &[&LayoutNode]) {
        for node in 0..topology.len() {
            if topology.parents[node].len() < 2 {
                continue;
            }
            let Some(cell) = grid.cells[node] else {
                continue;
            };

            let mut parents: Vec<(i32, &str, GridPos)> = topology.parents[node]
                .iter()
                .filter_map(|&p| grid.cells[p].map(|pc| (pc.manhattan(cell), order[p].name.as_str(), pc)))
                .collect();
            parents.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

            if parents.first().is_some_and(|&(_, _, nearest)| nearest.aligned(cell)) {
                continue;
            }
            'parents: for &(_, _, parent) in &parents {
                for candidate in [
                    GridPos::new(parent.col, cell.row),
                    GridPos::new(cell.col, parent.row),
                ] {
                    if grid.try_move(node, candidate) {
                        break 'parents;
                    }
                }
            }
        }
    }

    /// Shorten edges longer than `clamp_distance` along their axis.
    fn clamp_long_edges(&self, grid: &mut Grid<'_>, topology: &Topology) {
        for &(from, to) in &topology.edges {
            let (Some(a), Some(b)) = (grid.cells[from], grid.cells[to]) else {
                continue;
            };
            let (dc, dr) = (b.col - a.col, b.row - a.row);
            let along_row = dr == 0 && dc.abs() > self.clamp_distance;
            let along_col = dc == 0 && dr.abs() > self.clamp_distance;
            if !along_row && !along_col {
                continue;
            }

            for k in 0..self.clamp_distance {
                let reach = self.clamp_distance - k;
                let candidate = if along_row {
                    GridPos::new(a.col + dc.signum() * reach, a.row)
                } else {
                    GridPos::new(a.col, a.row + dr.signum() * reach)
                };
                if grid.try_move(to, candidate) {
                    break;
                }
            }
        }
    }
}

/// Move every node with a misaligned edge to a free cell aligned with all of
/// its neighbours. Components where that is impossible are laid out on a
/// fresh row of their own.
fn repair(grid: &mut Grid<'_>) {
    for node in 0..grid.cells.len() {
        if grid.misaligned(node) == 0 {
            continue;
        }
        if let Some(cell) = grid.aligned_cell(node) {
            grid.place(node, cell);
        }
    }

    let mut handled = HashSet::new();
    for node in 0..grid.cells.len() {
        if handled.contains(&node) || grid.misaligned(node) == 0 {
            continue;
        }
        let mut component = grid.component(node);
        handled.extend(component.iter().copied());
        component.sort_by_key(|&n| grid.cells[n].map(|c| (c.col, c.row)));

        for &n in &component {
            if let Some(old) = grid.cells[n].take() {
                grid.occupied.remove(&old);
            }
        }
        let row = grid.occupied.keys().map(|c| c.row).max().map_or(0, |r| r + 2);
        let start = grid.occupied.keys().map(|c| c.col).min().unwrap_or(0);
        tracing::debug!(
            "Laying out {} nodes on row {} to keep their edges aligned",
            component.len(),
            row
        );
        for (i, &n) in component.iter().enumerate() {
            grid.place(n, GridPos::new(start + i as i32, row));
        }
    }
}

fn spread(grid: &mut Grid<'_>, root: usize, children: &[Vec<usize>]) {
    let mut queue = VecDeque::from([root]);
    while let Some(parent) = queue.pop_front() {
        let Some(anchor) = grid.cells[parent] else {
            continue;
        };
        for &child in &children[parent] {
            if grid.cells[child].is_some() {
                continue;
            }
            let cell = grid.free_near(anchor);
            grid.place(child, cell);
            queue.push_back(child);
        }
    }
}

/// Edge structure by node index. Self-loops, unknown names and repeated
/// edges are dropped.
struct Topology {
    edges: Vec<(usize, usize)>,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
    neighbours: Vec<Vec<usize>>,
}

impl Topology {
    fn new(len: usize, edges: &[(String, String)], ids: &HashMap<&str, usize>) -> Self {
        let mut topology = Self {
            edges: Vec::new(),
            children: vec![Vec::new(); len],
            parents: vec![Vec::new(); len],
            neighbours: vec![Vec::new(); len],
        };
        let mut seen = HashSet::new();
        for (from, to) in edges {
            let (Some(&a), Some(&b)) = (ids.get(from.as_str()), ids.get(to.as_str())) else {
                continue;
            };
            if a == b || !seen.insert((a, b)) {
                continue;
            }
            topology.edges.push((a, b));
            topology.children[a].push(b);
            topology.parents[b].push(a);
            if !topology.neighbours[a].contains(&b) {
                topology.neighbours[a].push(b);
                topology.neighbours[b].push(a);
            }
        }
        topology
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

struct Grid<'a> {
    cells: Vec<Option<GridPos>>,
    occupied: HashMap<GridPos, usize>,
    neighbours: &'a [Vec<usize>],
}

impl<'a> Grid<'a> {
    fn new(len: usize, neighbours: &'a [Vec<usize>]) -> Self {
        Self {
            cells: vec![None; len],
            occupied: HashMap::new(),
            neighbours,
        }
    }

    fn is_free(&self, cell: GridPos, ignoring: usize) -> bool {
        self.occupied.get(&cell).is_none_or(|&other| other == ignoring)
    }

    fn place(&mut self, node: usize, cell: GridPos) {
        if let Some(old) = self.cells[node].take() {
            self.occupied.remove(&old);
        }
        self.occupied.insert(cell, node);
        self.cells[node] = Some(cell);
    }

    fn misaligned_at(&self, node: usize, cell: GridPos) -> usize {
        self.neighbours[node]
            .iter()
            .filter_map(|&n| self.cells[n])
            .filter(|&c| !c.aligned(cell))
            .count()
    }

    fn misaligned(&self, node: usize) -> usize {
        self.cells[node].map_or(0, |cell| self.misaligned_at(node, cell))
    }

    /// Move only into a free cell and only if the node's misaligned edge
    /// count does not grow.
    fn try_move(&mut self, node: usize, cell: GridPos) -> bool {
        let Some(current) = self.cells[node] else {
            return false;
        };
        if cell == current || !self.is_free(cell, node) {
            return false;
        }
        if self.misaligned_at(node, cell) > self.misaligned(node) {
            return false;
        }
        self.place(node, cell);
        true
    }

    /// First free cell up, right, down or left of `anchor`, widening one step
    /// at a time up to [`MAX_RING`], then the first free cell right of the
    /// last ring. Always shares a row or column with the anchor.
    fn free_near(&self, anchor: GridPos) -> GridPos {
        for distance in 1..=MAX_RING {
            for (dc, dr) in DIRECTIONS {
                let cell = GridPos::new(anchor.col + dc * distance, anchor.row + dr * distance);
                if !self.occupied.contains_key(&cell) {
                    return cell;
                }
            }
        }
        tracing::debug!("No free cell within {} of {:?}", MAX_RING, anchor);
        self.free_on_row(GridPos::new(anchor.col + MAX_RING + 1, anchor.row))
    }

    /// `start` or the first free cell to its right.
    fn free_on_row(&self, start: GridPos) -> GridPos {
        let mut cell = start;
        while self.occupied.contains_key(&cell) {
            cell.col += 1;
        }
        cell
    }

    /// Free cell on `line` nearest to `from`, searching both ways.
    fn nearest_free_on_line(&self, from: GridPos, horizontal: bool, node: usize) -> GridPos {
        let mut d = 0;
        loop {
            for step in [-d, d] {
                let cell = if horizontal {
                    GridPos::new(from.col + step, from.row)
                } else {
                    GridPos::new(from.col, from.row + step)
                };
                if self.is_free(cell, node) {
                    return cell;
                }
            }
            d += 1;
        }
    }

    /// Nearest free cell sharing a row or column with every placed neighbour.
    fn aligned_cell(&self, node: usize) -> Option<GridPos> {
        let current = self.cells[node]?;
        let around: Vec<GridPos> = self.neighbours[node]
            .iter()
            .filter_map(|&n| self.cells[n])
            .collect();
        let first = *around.first()?;

        let mut candidates = Vec::new();
        for a in &around {
            for b in &around {
                candidates.push(GridPos::new(a.col, b.row));
            }
        }
        if around.iter().all(|c| c.row == first.row) {
            let from = GridPos::new(current.col, first.row);
            candidates.push(self.nearest_free_on_line(from, true, node));
        }
        if around.iter().all(|c| c.col == first.col) {
            let from = GridPos::new(first.col, current.row);
            candidates.push(self.nearest_free_on_line(from, false, node));
        }

        candidates
            .into_iter()
            .filter(|&c| self.is_free(c, node) && around.iter().all(|&n| n.aligned(c)))
            .min_by_key(|&c| (c.manhattan(current), c.row, c.col))
    }

    /// Weakly connected component containing `start`.
    fn component(&self, start: usize) -> Vec<usize> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            members.push(node);
            for &n in &self.neighbours[node] {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nodes(n: usize) -> Vec<LayoutNode> {
        (0..n).map(|i| LayoutNode::new(format!("n{i}"), i + 1)).collect()
    }

    fn edges(pairs: &[(usize, usize)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (format!("n{a}"), format!("n{b}")))
            .collect()
    }

    fn assert_invariants(layout: &GridLayout, count: usize, edges: &[(String, String)]) {
        assert_eq!(layout.cells.len(), count, "every node is placed");
        let unique: HashSet<GridPos> = layout.cells.values().copied().collect();
        assert_eq!(unique.len(), count, "no two nodes share a cell");
        assert!(layout.misaligned(edges).is_empty(), "misaligned: {:?}", layout.misaligned(edges));
        if count > 0 {
            assert_eq!(layout.cells.values().map(|c| c.col).min(), Some(0));
            assert_eq!(layout.cells.values().map(|c| c.row).min(), Some(0));
        }
    }

    #[test]
    fn test_chain_shares_axes() {
        let layouter = GridLayouter::new();
        let edges = edges(&[(0, 1), (1, 2)]);
        let layout = layouter.arrange(&nodes(3), &edges);
        assert_invariants(&layout, 3, &edges);
        let (a, b, c) = (
            layout.get("n0").unwrap(),
            layout.get("n1").unwrap(),
            layout.get("n2").unwrap(),
        );
        assert!(a.aligned(b));
        assert!(b.aligned(c));
    }

    #[test]
    fn test_children_fill_up_right_down_left() {
        let layout = GridLayouter::new().arrange(&nodes(5), &edges(&[(0, 1), (0, 2), (0, 3), (0, 4)]));
        let root = layout.get("n0").unwrap();
        assert_eq!(layout.get("n1").unwrap(), GridPos::new(root.col, root.row - 1));
        assert_eq!(layout.get("n2").unwrap(), GridPos::new(root.col + 1, root.row));
        assert_eq!(layout.get("n3").unwrap(), GridPos::new(root.col, root.row + 1));
        assert_eq!(layout.get("n4").unwrap(), GridPos::new(root.col - 1, root.row));
    }

    #[test]
    fn test_roots_ordered_by_line_and_spaced() {
        let layout = GridLayouter::new().arrange(&nodes(3), &[]);
        assert_eq!(layout.get("n0"), Some(GridPos::new(0, 0)));
        assert_eq!(layout.get("n1"), Some(GridPos::new(3, 0)));
        assert_eq!(layout.get("n2"), Some(GridPos::new(6, 0)));
    }

    #[test]
    fn test_cycle_without_root_is_placed() {
        let edges = edges(&[(0, 1), (1, 2), (2, 0)]);
        let layout = GridLayouter::new().arrange(&nodes(3), &edges);
        assert_invariants(&layout, 3, &edges);
    }

    #[test]
    fn test_empty_graph() {
        let layout = GridLayouter::new().arrange(&[], &[]);
        assert!(layout.cells.is_empty());
    }

    #[test]
    fn test_pixel_mapping() {
        let layouter = GridLayouter::new();
        assert_eq!(layouter.to_pixel(GridPos::new(0, 0)), Vec2::new(110.0, 90.0));
        assert_eq!(layouter.to_pixel(GridPos::new(1, 2)), Vec2::new(510.0, 890.0));
        assert_eq!(layouter.to_grid(Vec2::new(520.0, 870.0)), GridPos::new(1, 2));
    }

    #[test]
    fn test_long_edges_are_clamped() {
        // star with many children pushes later ones far away; the clamp pass
        // pulls them back within reach when cells are free.
        let pairs: Vec<(usize, usize)> = (1..30).map(|i| (0, i)).collect();
        let edges = edges(&pairs);
        let layout = GridLayouter::new().arrange(&nodes(30), &edges);
        assert_invariants(&layout, 30, &edges);
    }

    #[test]
    fn test_diamond_is_aligned() {
        let edges = edges(&[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (1, 4)]);
        let layout = GridLayouter::new().arrange(&nodes(5), &edges);
        assert_invariants(&layout, 5, &edges);
    }

    #[test]
    fn test_ring_search_is_capped() {
        let neighbours = vec![Vec::new(); 4 * MAX_RING as usize + 1];
        let mut grid = Grid::new(neighbours.len(), &neighbours);
        let anchor = GridPos::new(0, 0);
        grid.place(0, anchor);
        let mut node = 1;
        for distance in 1..=MAX_RING {
            for (dc, dr) in DIRECTIONS {
                grid.place(node, GridPos::new(dc * distance, dr * distance));
                node += 1;
            }
        }

        let cell = grid.free_near(anchor);
        assert_eq!(cell, GridPos::new(MAX_RING + 1, 0));
        assert!(cell.aligned(anchor));

        grid.place(node - 1, GridPos::new(MAX_RING + 1, 0));
        assert_eq!(grid.free_near(anchor), GridPos::new(-MAX_RING, 0));
    }

    fn graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (1usize..24).prop_flat_map(|n| {
            (Just(n), prop::collection::vec((0..n, 0..n), 0..n * 3))
        })
    }

    proptest! {
        #[test]
        fn prop_any_graph_is_axis_aligned_and_unique((n, pairs) in graph()) {
            let edges = edges(&pairs);
            let layout = GridLayouter::new().arrange(&nodes(n), &edges);
            assert_invariants(&layout, n, &edges);
        }

        #[test]
        fn prop_dags_are_axis_aligned_and_unique((n, pairs) in graph()) {
            let dag: Vec<(usize, usize)> = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            let edges = edges(&dag);
            let layout = GridLayouter::new().arrange(&nodes(n), &edges);
            assert_invariants(&layout, n, &edges);
        }

        #[test]
        fn prop_disconnected_components((n, pairs) in graph(), (m, more) in graph()) {
            let mut all = pairs;
            all.extend(more.into_iter().map(|(a, b)| (a + n, b + n)));
            let edges = edges(&all);
            let layout = GridLayouter::new().arrange(&nodes(n + m), &edges);
            assert_invariants(&layout, n + m, &edges);
        }

        #[test]
        fn prop_layout_is_deterministic((n, pairs) in graph()) {
            let edges = edges(&pairs);
            let layouter = GridLayouter::new();
            prop_assert_eq!(layouter.arrange(&nodes(n), &edges), layouter.arrange(&nodes(n), &edges));
        }
    }
}
