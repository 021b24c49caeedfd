use callgrid_graph::{GraphModel, GridLayouter, Layouter};
use callgrid_index::analyze_source;

const CHAIN: &str = "fn a(){ b(); }\nfn b(){ c(); }\nfn c(){}\n";

#[test]
fn test_simple_chain_scenario() {
    let analysis = analyze_source(CHAIN, "chain.rs").unwrap();
    assert_eq!(analysis.declaration_count, 3);
    assert_eq!(analysis.callees("a"), ["b"]);
    assert_eq!(analysis.callees("b"), ["c"]);
    assert!(analysis.callees("c").is_empty());

    let mut model = GraphModel::from_analysis(&analysis);
    let layouter = GridLayouter::new();
    let layout = layouter.execute(&model);
    model.apply_layout(&layout, &layouter);

    let cell = |name: &str| model.node(name).and_then(|n| n.grid).unwrap();
    assert!(cell("a").aligned(cell("b")));
    assert!(cell("b").aligned(cell("c")));

    for node in model.nodes() {
        assert_eq!(node.position, layouter.to_pixel(node.grid.unwrap()));
        assert_eq!(node.position, node.original);
    }
}

#[test]
fn test_fixture_layout_keeps_edges_on_axis() {
    let source = include_str!("../../callgrid-index/tests/fixtures/inventory.rs");
    let analysis = analyze_source(source, "inventory.rs").unwrap();
    let model = GraphModel::from_analysis(&analysis);
    let layout = GridLayouter::new().execute(&model);
    let edges = model.layout_edges();
    assert!(!edges.is_empty());
    assert!(layout.misaligned(&edges).is_empty());
    assert_eq!(layout.cells.len(), model.node_count());
}
