use std::collections::BTreeMap;

use super::Dataset;
use crate::error::{BidlensError, Result};

/// Logical grouping axes of the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Category,
    BusinessCategory,
    Industry,
    Family,
    Region,
    District,
    Territory,
}

impl Dimension {
    pub const ALL: [Self; 7] = [
        Self::Category,
        Self::BusinessCategory,
        Self::Industry,
        Self::Family,
        Self::Region,
        Self::District,
        Self::Territory,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::BusinessCategory => "business_category",
            Self::Industry => "industry",
            Self::Family => "family",
            Self::Region => "region",
            Self::District => "district",
            Self::Territory => "territory",
        }
    }

    #[must_use]
    pub const fn target(self) -> DimensionTarget {
        let (dataset, group_column) = match self {
            Self::Category => (Dataset::WeeklyMetricsByCategory, "taxonomy_category"),
            Self::BusinessCategory => (
                Dataset::WeeklyMetricsByBusinessCategory,
                "business_category",
            ),
            Self::Industry => (Dataset::WeeklyMetricsByIndustry, "taxonomy_industry"),
            Self::Family => (Dataset::WeeklyMetricsByFamily, "taxonomy_family"),
            Self::Region => (Dataset::WeeklyMetricsByRegion, "region_name"),
            Self::District => (Dataset::WeeklyMetricsByDistrict, "district_name"),
            Self::Territory => (Dataset::WeeklyMetricsByTerritory, "territory_name"),
        };
        DimensionTarget {
            dataset,
            group_column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionTarget {
    pub dataset: Dataset,
    pub group_column: &'static str,
}

impl DimensionTarget {
    #[must_use]
    pub const fn dataset_name(&self) -> &'static str {
        self.dataset.name()
    }
}

/// Maps dimension names to the dataset and grouping column used for aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSpec {
    targets: BTreeMap<&'static str, DimensionTarget>,
}

impl DimensionSpec {
    #[must_use]
    pub fn new(dimensions: &[Dimension]) -> Self {
        Self {
            targets: dimensions
                .iter()
                .map(|dimension| (dimension.key(), dimension.target()))
                .collect(),
        }
    }

    #[must_use]
    pub fn auction_warehouse() -> Self {
        Self::new(&Dimension::ALL)
    }

    pub fn resolve(&self, name: &str) -> Result<DimensionTarget> {
        let normalized = name.trim().to_ascii_lowercase();
        self.targets
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| BidlensError::UnknownDimension {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.keys().copied()
    }
}

impl Default for DimensionSpec {
    fn default() -> Self {
        Self::auction_warehouse()
    }
}
