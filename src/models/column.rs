//! Stage column model
//!
//! The three text columns that are deduplicated, in the fixed order the
//! pipeline visits them.

use serde::{Deserialize, Serialize};

/// A column deduplicated by one pipeline stage
///
/// Declaration order is the processing order; `Ord` follows it.
///
/// # Example
///
/// ```rust
/// use trade_dedupe_sdk::models::StageColumn;
///
/// assert_eq!(StageColumn::first(), StageColumn::ItemDescription);
/// assert_eq!(StageColumn::ItemDescription.next(), Some(StageColumn::ImporterName));
/// assert_eq!(StageColumn::SupplierName.wire_name(), "Supplier_Name");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageColumn {
    /// Stage 1: item description
    ItemDescription,
    /// Stage 2: importer name
    ImporterName,
    /// Stage 3: supplier name
    SupplierName,
}

impl StageColumn {
    /// Get all columns in processing order
    pub fn all() -> [Self; 3] {
        [Self::ItemDescription, Self::ImporterName, Self::SupplierName]
    }

    /// The first column processed
    pub fn first() -> Self {
        Self::ItemDescription
    }

    /// Column name as it appears in the dataset and on the wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::ItemDescription => "Item_Description",
            Self::ImporterName => "Importer_Name",
            Self::SupplierName => "Supplier_Name",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::ItemDescription => "Item Description",
            Self::ImporterName => "Importer Name",
            Self::SupplierName => "Supplier Name",
        }
    }

    /// Get stage index (1-based)
    pub fn index(&self) -> usize {
        match self {
            Self::ItemDescription => 1,
            Self::ImporterName => 2,
            Self::SupplierName => 3,
        }
    }

    /// The column processed after this one, if any
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::ItemDescription => Some(Self::ImporterName),
            Self::ImporterName => Some(Self::SupplierName),
            Self::SupplierName => None,
        }
    }

    /// The column processed before this one, if any
    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::ItemDescription => None,
            Self::ImporterName => Some(Self::ItemDescription),
            Self::SupplierName => Some(Self::ImporterName),
        }
    }

    /// Whether this is the last column in the pipeline
    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for StageColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl std::str::FromStr for StageColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "item_description" | "1" => Ok(Self::ItemDescription),
            "importer_name" | "2" => Ok(Self::ImporterName),
            "supplier_name" | "3" => Ok(Self::SupplierName),
            _ => Err(format!("Unknown stage column: {}", s)),
        }
    }
}
