use callgrid_core::DeclarationKind;
use callgrid_index::{Analyzer, analyze_source};
use std::fs;
use tempfile::tempdir;

const INVENTORY: &str = include_str!("fixtures/inventory.rs");

#[test]
fn test_inventory_declarations() {
    let analysis = analyze_source(INVENTORY, "inventory.rs").unwrap();

    let expected = [
        ("MAX_STOCK", DeclarationKind::Const),
        ("Sku", DeclarationKind::TypeAlias),
        ("Item", DeclarationKind::Struct),
        ("Movement", DeclarationKind::Enum),
        ("Ledger", DeclarationKind::Trait),
        ("Inventory", DeclarationKind::Struct),
        ("new", DeclarationKind::Method),
        ("receive", DeclarationKind::Method),
        ("ship", DeclarationKind::Method),
        ("entry", DeclarationKind::Method),
        ("record", DeclarationKind::Method),
        ("clamp_stock", DeclarationKind::Function),
        ("main", DeclarationKind::Function),
    ];
    for (name, kind) in expected {
        let decl = analysis
            .declarations
            .get(name)
            .unwrap_or_else(|| panic!("missing {name}"));
        assert_eq!(decl.kind, kind, "{name}");
    }
    assert_eq!(analysis.impl_count, 2);

    // The trait prototype keeps the bare name, the impl method is qualified.
    assert_eq!(analysis.declarations["record"].qualified_name, "Ledger::record");
    assert_eq!(
        analysis.declarations["Inventory::record"].qualified_name,
        "Inventory::record"
    );

    assert_eq!(analysis.declarations["MAX_STOCK"].doc, "Upper bound on stock per item.");
    assert_eq!(analysis.declarations["Item"].doc, "A warehouse item.");
    assert_eq!(analysis.declarations["new"].doc, "Empty inventory.");
    assert_eq!(analysis.declarations["ship"].return_type.as_deref(), Some("Result<u32, String>"));
    assert_eq!(analysis.declarations["ship"].params, vec!["sku", "amount"]);
    assert_eq!(analysis.declarations["ship"].complexity, 2);
}

#[test]
fn test_inventory_call_graph() {
    let analysis = analyze_source(INVENTORY, "inventory.rs").unwrap();

    assert_eq!(analysis.callees("receive"), ["entry", "clamp_stock"]);
    assert_eq!(analysis.callees("ship"), ["entry"]);
    assert_eq!(analysis.callees("Inventory::record"), ["receive", "ship"]);
    assert_eq!(analysis.callees("main"), ["new", "record"]);
    assert!(analysis.callees("clamp_stock").is_empty());
    assert_eq!(analysis.edge_count, analysis.call_edges().len());
}

#[test]
fn test_analyze_file_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("inventory.rs");
    fs::write(&path, INVENTORY).unwrap();

    let analyzer = Analyzer::new();
    let analysis = analyzer.analyze_file(&path).unwrap();
    assert!(analysis.is_ok());
    assert_eq!(analysis.file, path.to_string_lossy());
    assert!(analyzer.last_good(&path.to_string_lossy()).is_some());

    assert!(analyzer.analyze_file(&dir.path().join("missing.rs")).is_err());
}
