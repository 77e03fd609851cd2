//! Stage table and stage views
//!
//! One parameterised view serves all three columns. The table below is the
//! single place that fixes titles and navigation targets.

mod view;

pub use view::{PreviewTable, StageSnapshot, StageView, SuggestionRow};

use crate::models::StageColumn;

/// Route of the downstream analysis catalog, reached after the last stage
pub const ANALYSIS_ROUTE: &str = "/analysis-catalog";

/// Static description of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    pub column: StageColumn,
    pub title: &'static str,
    pub route: &'static str,
    pub next_route: &'static str,
    pub next_label: &'static str,
}

/// Stages in processing order
pub const STAGES: [StageDefinition; 3] = [
    StageDefinition {
        column: StageColumn::ItemDescription,
        title: "Cosine Similarity Clustering - Item Description",
        route: "/cluster/item-description",
        next_route: "/cluster/importer-name",
        next_label: "Next → Importer Name",
    },
    StageDefinition {
        column: StageColumn::ImporterName,
        title: "Cosine Similarity Clustering - Importer Name",
        route: "/cluster/importer-name",
        next_route: "/cluster/supplier-name",
        next_label: "Next → Supplier Name",
    },
    StageDefinition {
        column: StageColumn::SupplierName,
        title: "Cosine Similarity Clustering - Supplier Name",
        route: "/cluster/supplier-name",
        next_route: ANALYSIS_ROUTE,
        next_label: "Proceed to Analysis →",
    },
];

/// Look up the definition of a column's stage
pub fn definition(column: StageColumn) -> &'static StageDefinition {
    match column {
        StageColumn::ItemDescription => &STAGES[0],
        StageColumn::ImporterName => &STAGES[1],
        StageColumn::SupplierName => &STAGES[2],
    }
}
