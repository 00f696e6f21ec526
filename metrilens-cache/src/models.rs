//! Data models for the metrics cache
//!
//! `MetricsRecord` is the flattened on-disk shape; `MetricsNode` is the tree
//! handed over by the analysis engine.

use serde::{Deserialize, Serialize};

/// One cached entry, keyed by the symbol's fully-qualified display name.
///
/// Field names are PascalCase on disk. Missing fields read as zero and
/// unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MetricsRecord {
    pub name: String,
    pub maintainability_index: f64,
    pub cyclomatic_complexity: i32,
    /// Count of coupled types
    pub class_coupling: i32,
    /// 0 when not applicable
    pub depth_of_inheritance: i32,
    pub source_lines: i64,
    pub executable_lines: i64,
}

impl MetricsRecord {
    /// Record carrying only the requested name, every metric at zero.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Metrics computed for a single scope by the analysis engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetrics {
    pub maintainability_index: f64,
    pub cyclomatic_complexity: i32,
    /// Named types this scope is coupled to
    pub coupled_types: Vec<String>,
    /// `None` for scopes where inheritance does not apply (members, namespaces)
    pub depth_of_inheritance: Option<i32>,
    pub source_lines: i64,
    pub executable_lines: i64,
}

/// Node of a metrics tree: a symbol, its metrics, and nested scopes in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsNode {
    pub symbol: String,
    #[serde(default)]
    pub metrics: NodeMetrics,
    #[serde(default)]
    pub children: Vec<MetricsNode>,
}

impl MetricsNode {
    pub fn new(symbol: impl Into<String>, metrics: NodeMetrics) -> Self {
        Self {
            symbol: symbol.into(),
            metrics,
            children: Vec::new(),
        }
    }

    /// Append a child scope (builder style)
    pub fn with_child(mut self, child: MetricsNode) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MetricsNode::node_count).sum::<usize>()
    }

    /// Flattened record for this node alone (children excluded)
    pub fn to_record(&self) -> MetricsRecord {
        MetricsRecord {
            name: self.symbol.clone(),
            maintainability_index: self.metrics.maintainability_index,
            cyclomatic_complexity: self.metrics.cyclomatic_complexity,
            class_coupling: i32::try_from(self.metrics.coupled_types.len()).unwrap_or(i32::MAX),
            depth_of_inheritance: self.metrics.depth_of_inheritance.unwrap_or(0),
            source_lines: self.metrics.source_lines,
            executable_lines: self.metrics.executable_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_pascal_case() {
        let record = MetricsRecord {
            name: "Demo.Widget".to_string(),
            maintainability_index: 87.5,
            cyclomatic_complexity: 4,
            class_coupling: 2,
            depth_of_inheritance: 1,
            source_lines: 40,
            executable_lines: 12,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"Name\":\"Demo.Widget\""));
        assert!(json.contains("\"MaintainabilityIndex\":87.5"));
        assert!(json.contains("\"CyclomaticComplexity\":4"));
        assert!(json.contains("\"ClassCoupling\":2"));
        assert!(json.contains("\"DepthOfInheritance\":1"));
        assert!(json.contains("\"SourceLines\":40"));
        assert!(json.contains("\"ExecutableLines\":12"));
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let record: MetricsRecord =
            serde_json::from_str(r#"{"Name":"X","SourceLines":7,"Extra":true}"#).unwrap();
        assert_eq!(record.name, "X");
        assert_eq!(record.source_lines, 7);
        assert_eq!(record.maintainability_index, 0.0);
        assert_eq!(record.depth_of_inheritance, 0);
    }

    #[test]
    fn test_to_record_maps_coupling_and_inheritance() {
        let node = MetricsNode::new(
            "Demo.Widget.Render()",
            NodeMetrics {
                maintainability_index: 71.0,
                cyclomatic_complexity: 3,
                coupled_types: vec!["System.String".into(), "Demo.Canvas".into()],
                depth_of_inheritance: None,
                source_lines: 10,
                executable_lines: 4,
            },
        );
        let record = node.to_record();
        assert_eq!(record.class_coupling, 2);
        assert_eq!(record.depth_of_inheritance, 0);
        assert_eq!(record.name, "Demo.Widget.Render()");
    }

    #[test]
    fn test_node_count() {
        let tree = MetricsNode::new("A", NodeMetrics::default())
            .with_child(
                MetricsNode::new("A.B", NodeMetrics::default())
                    .with_child(MetricsNode::new("A.B.c()", NodeMetrics::default())),
            )
            .with_child(MetricsNode::new("A.D", NodeMetrics::default()));
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_placeholder() {
        let record = MetricsRecord::placeholder("Missing");
        assert_eq!(record.name, "Missing");
        assert_eq!(record.maintainability_index, 0.0);
        assert_eq!(record.executable_lines, 0);
    }
}
