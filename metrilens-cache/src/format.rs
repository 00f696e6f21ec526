//! Rendering of a record for the editor: a one-line description built from a
//! user format string, and the rows of the details table.
//!
//! Placeholders:
//! - `%NM%` name
//! - `%MI%` maintainability index
//! - `%CY%` cyclomatic complexity
//! - `%CC%` class coupling
//! - `%DI%` depth of inheritance
//! - `%SL%` source lines
//! - `%EL%` executable lines

use crate::models::MetricsRecord;

/// Format used when the user has not chosen one
pub const DEFAULT_DESCRIPTION_FORMAT: &str = "MI(%MI%)";

/// Substitute every placeholder in `format` with the record's values.
///
/// An empty format yields an empty description.
pub fn describe(record: &MetricsRecord, format: &str) -> String {
    if format.is_empty() {
        return String::new();
    }

    format
        .replace("%NM%", &record.name)
        .replace("%MI%", &record.maintainability_index.to_string())
        .replace("%CY%", &record.cyclomatic_complexity.to_string())
        .replace("%CC%", &record.class_coupling.to_string())
        .replace("%DI%", &record.depth_of_inheritance.to_string())
        .replace("%SL%", &record.source_lines.to_string())
        .replace("%EL%", &record.executable_lines.to_string())
}

/// One row of the details table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

/// Label/value rows in display order
pub fn details(record: &MetricsRecord) -> Vec<DetailRow> {
    let row = |label, value: String| DetailRow { label, value };

    vec![
        row("Name", record.name.clone()),
        row("Maintainability Index", record.maintainability_index.to_string()),
        row("Cyclomatic Complexity", record.cyclomatic_complexity.to_string()),
        row("Class Coupling", record.class_coupling.to_string()),
        row("Depth Of Inheritance", record.depth_of_inheritance.to_string()),
        row("Source Lines", record.source_lines.to_string()),
        row("Executable Lines", record.executable_lines.to_string()),
    ]
}
