//! Population-weighted aggregation of region records.
//!
//! The aggregate is built by summing raw figures and deriving percentages
//! from the sums, never by averaging member percentages.

use crate::models::{HealthMeasures, RegionCounts, RegionRecord};

/// Region id given to the aggregate record.
pub const AGGREGATE_ID: &str = "Total";

/// Sum every raw figure across `records`.
///
/// An empty slice yields an all-zero record whose percentages are all the
/// zero-denominator sentinel.
pub fn aggregate(records: &[RegionRecord]) -> RegionRecord {
    let counts: RegionCounts = records.iter().map(|r| *r.counts()).sum();
    let health: HealthMeasures = records.iter().map(|r| *r.health()).sum();
    RegionRecord::new(AGGREGATE_ID, counts, health)
}

/// Ordered region records plus their aggregate. Immutable once built.
#[derive(Debug, Clone)]
pub struct RegionCollection {
    records: Vec<RegionRecord>,
    aggregate: RegionRecord,
}

impl RegionCollection {
    pub fn new(records: Vec<RegionRecord>) -> Self {
        let aggregate = aggregate(&records);
        Self { records, aggregate }
    }

    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    pub fn aggregate(&self) -> &RegionRecord {
        &self.aggregate
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{percentage, Percentages};

    fn record(id: &str, total_population: u64, older: u64, males: u64, core_men: f64) -> RegionRecord {
        RegionRecord::new(
            id,
            RegionCounts {
                total_population,
                older_adults_65_plus: older,
                males_65_plus: males,
                labor_force: total_population / 2,
                unemployed_labor_force: total_population as f64 * 0.03,
                ..RegionCounts::default()
            },
            HealthMeasures {
                core_men,
                teeth_lost: core_men / 2.0,
                ..HealthMeasures::default()
            },
        )
    }

    #[test]
    fn test_single_record_aggregate_matches_record() {
        let only = record("36081", 1000, 150, 60, 24.0);
        let collection = RegionCollection::new(vec![only.clone()]);

        assert_eq!(collection.aggregate().counts(), only.counts());
        assert_eq!(collection.aggregate().health(), only.health());
        assert_eq!(collection.aggregate().percentages(), only.percentages());
        assert_eq!(collection.aggregate().region_id(), AGGREGATE_ID);
    }

    #[test]
    fn test_aggregate_sums_raw_figures() {
        let records = vec![
            record("36005", 1000, 150, 60, 24.0),
            record("36047", 3000, 300, 100, 30.0),
            record("36061", 500, 50, 20, 5.0),
        ];
        let total = aggregate(&records);

        assert_eq!(total.counts().total_population, 4500);
        assert_eq!(total.counts().older_adults_65_plus, 500);
        assert_eq!(total.counts().males_65_plus, 180);
        assert_eq!(total.counts().labor_force, 500 + 1500 + 250);
        assert!((total.health().core_men - 59.0).abs() < 1e-9);
        assert!((total.health().teeth_lost - 29.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_is_weighted_not_mean() {
        // Equal numerators, very different denominators.
        let small = record("a", 100, 50, 10, 5.0);
        let large = record("b", 10_000, 50, 1000, 5.0);
        let total = aggregate(&[small.clone(), large.clone()]);

        let weighted = total.percentages().older_adults_65_plus;
        let mean = (small.percentages().older_adults_65_plus
            + large.percentages().older_adults_65_plus)
            / 2.0;

        assert!((weighted - 100.0 / 10_100.0 * 100.0).abs() < 1e-9);
        assert!((mean - 25.25).abs() < 1e-9);
        assert!((weighted - mean).abs() > 1.0);

        let core_men = total.percentages().core_men;
        assert!((core_men - 10.0 / 1010.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_and_aggregate_use_same_formulas() {
        let records = vec![
            record("36005", 1000, 150, 60, 24.0),
            record("36047", 0, 0, 0, 3.0),
        ];
        let total = aggregate(&records);
        let expected = Percentages::derive(total.counts(), total.health());
        assert_eq!(total.percentages(), expected);

        let summed_counts: RegionCounts = records.iter().map(|r| *r.counts()).sum();
        assert_eq!(
            total.percentages().teeth_lost,
            percentage(13.5, summed_counts.older_adults_65_plus as f64)
        );
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        let collection = RegionCollection::new(Vec::new());
        assert!(collection.is_empty());
        assert_eq!(collection.len(), 0);
        assert_eq!(*collection.aggregate().counts(), RegionCounts::default());
        assert_eq!(collection.aggregate().percentages(), Percentages::default());
    }

    #[test]
    fn test_zero_subgroup_in_aggregate() {
        let records = vec![record("a", 100, 10, 0, 4.0), record("b", 200, 20, 0, 6.0)];
        let total = aggregate(&records);
        assert_eq!(total.percentages().core_men, 0.0);
        assert!((total.percentages().older_adults_65_plus - 10.0).abs() < 1e-9);
    }
}
