pub mod dimension;

pub use dimension::{Dimension, DimensionSpec, DimensionTarget};

/// Datasets of the auction warehouse. Generated SQL takes table identifiers only from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Items,
    WeeklyMetricsSummary,
    WeeklyMetricsByCategory,
    WeeklyMetricsByBusinessCategory,
    WeeklyMetricsByIndustry,
    WeeklyMetricsByFamily,
    WeeklyMetricsByRegion,
    WeeklyMetricsByDistrict,
    WeeklyMetricsByTerritory,
}

impl Dataset {
    pub const ALL: [Self; 9] = [
        Self::Items,
        Self::WeeklyMetricsSummary,
        Self::WeeklyMetricsByCategory,
        Self::WeeklyMetricsByBusinessCategory,
        Self::WeeklyMetricsByIndustry,
        Self::WeeklyMetricsByFamily,
        Self::WeeklyMetricsByRegion,
        Self::WeeklyMetricsByDistrict,
        Self::WeeklyMetricsByTerritory,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::WeeklyMetricsSummary => "weekly_metrics_summary",
            Self::WeeklyMetricsByCategory => "weekly_metrics_by_category",
            Self::WeeklyMetricsByBusinessCategory => "weekly_metrics_by_business_category",
            Self::WeeklyMetricsByIndustry => "weekly_metrics_by_industry",
            Self::WeeklyMetricsByFamily => "weekly_metrics_by_family",
            Self::WeeklyMetricsByRegion => "weekly_metrics_by_region",
            Self::WeeklyMetricsByDistrict => "weekly_metrics_by_district",
            Self::WeeklyMetricsByTerritory => "weekly_metrics_by_territory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub name: String,
    pub allowed: bool,
}

/// Allowlist of dataset names. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCatalog {
    entries: Vec<DatasetEntry>,
}

impl DatasetCatalog {
    /// Entries keep declaration order; a repeated name keeps its first declaration.
    pub fn new<I, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, bool)>,
        N: Into<String>,
    {
        let mut deduped: Vec<DatasetEntry> = Vec::new();
        for (name, allowed) in entries {
            let name = name.into();
            if deduped
                .iter()
                .any(|entry| entry.name.eq_ignore_ascii_case(&name))
            {
                continue;
            }
            deduped.push(DatasetEntry { name, allowed });
        }
        Self { entries: deduped }
    }

    #[must_use]
    pub fn auction_warehouse() -> Self {
        Self::new(Dataset::ALL.iter().map(|dataset| (dataset.name(), true)))
    }

    #[must_use]
    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    /// Unquoted SQL identifiers are case-insensitive, so lookups are too.
    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.allowed && entry.name.eq_ignore_ascii_case(name))
    }

    pub fn allowed_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.allowed)
            .map(|entry| entry.name.as_str())
    }
}

impl Default for DatasetCatalog {
    fn default() -> Self {
        Self::auction_warehouse()
    }
}

#[cfg(test)]
mod tests {
    use super::{Dataset, DatasetCatalog};

    #[test]
    fn warehouse_catalog_allows_every_dataset_in_order() {
        let catalog = DatasetCatalog::auction_warehouse();
        let names = catalog.allowed_names().collect::<Vec<_>>();
        assert_eq!(names.len(), Dataset::ALL.len());
        assert_eq!(names.first(), Some(&"items"));
        assert_eq!(names.last(), Some(&"weekly_metrics_by_territory"));
    }

    #[test]
    fn blocked_entries_are_known_but_not_allowed() {
        let catalog = DatasetCatalog::new([("items", true), ("bidder_accounts", false)]);
        assert!(catalog.is_allowed("ITEMS"));
        assert!(!catalog.is_allowed("bidder_accounts"));
        assert_eq!(catalog.entries().len(), 2);
        assert_eq!(catalog.allowed_names().collect::<Vec<_>>(), vec!["items"]);
    }

    #[test]
    fn duplicate_names_keep_first_declaration() {
        let catalog = DatasetCatalog::new([("items", false), ("Items", true)]);
        assert_eq!(catalog.entries().len(), 1);
        assert!(!catalog.is_allowed("items"));
    }
}
