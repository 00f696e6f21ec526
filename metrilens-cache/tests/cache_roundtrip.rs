use metrilens_cache::{find, flatten, save, MetricsCache, MetricsNode, MetricsRecord, NodeMetrics};
use tempfile::tempdir;

fn node(symbol: &str, seed: i32) -> MetricsNode {
    MetricsNode::new(
        symbol,
        NodeMetrics {
            maintainability_index: 50.0 + f64::from(seed) / 4.0,
            cyclomatic_complexity: seed,
            coupled_types: (0..seed).map(|i| format!("T{i}")).collect(),
            depth_of_inheritance: if seed % 2 == 0 { Some(seed / 2) } else { None },
            source_lines: i64::from(seed) * 10,
            executable_lines: i64::from(seed) * 3,
        },
    )
}

/// Assembly -> namespace -> 2 types -> members, depth 4, 8 nodes
fn sample_tree() -> MetricsNode {
    node("Shop", 1).with_child(
        node("Shop.Core", 2)
            .with_child(
                node("Shop.Core.Cart", 3)
                    .with_child(node("Shop.Core.Cart.Add(Item)", 4))
                    .with_child(node("Shop.Core.Cart.Total()", 5)),
            )
            .with_child(
                node("Shop.Core.Item", 6)
                    .with_child(node("Shop.Core.Item.Price", 7))
                    .with_child(node("Shop.Core.Item.Item(string)", 8)),
            ),
    )
}

fn pre_order(tree: &MetricsNode, out: &mut Vec<MetricsRecord>) {
    out.push(tree.to_record());
    for child in &tree.children {
        pre_order(child, out);
    }
}

#[test]
fn test_round_trip_preserves_every_node_in_pre_order() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(".Metrics").join("Shop.json");
    let tree = sample_tree();

    assert!(save(&tree, &path));

    let on_disk: Vec<MetricsRecord> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let mut expected = Vec::new();
    pre_order(&tree, &mut expected);

    assert_eq!(on_disk.len(), tree.node_count());
    assert_eq!(on_disk, expected);
    assert_eq!(flatten(&tree), expected);
}

#[test]
fn test_lookup_finds_each_saved_symbol() {
    let temp_dir = tempdir().unwrap();
    let cache = MetricsCache::new(temp_dir.path());
    let tree = sample_tree();
    assert!(cache.save_unit("Shop", &tree));

    for record in flatten(&tree) {
        assert_eq!(cache.lookup("Shop", &record.name), record);
    }

    let missing = cache.lookup("Shop", "Z");
    assert_eq!(missing, MetricsRecord::placeholder("Z"));
}

#[test]
fn test_second_save_replaces_first() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("Unit.json");

    assert!(save(&sample_tree(), &path));
    let replacement = node("Other", 9).with_child(node("Other.Run()", 2));
    assert!(save(&replacement, &path));

    assert_eq!(find(&path, "Shop.Core.Cart"), MetricsRecord::placeholder("Shop.Core.Cart"));
    assert_eq!(find(&path, "Other.Run()").cyclomatic_complexity, 2);

    let on_disk: Vec<MetricsRecord> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 2);
}
