//! Per regency-year aggregation of village records.

use std::collections::{BTreeMap, BTreeSet};

use super::loader::IncidentRecord;

/// Summary of every village record for one regency in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct RegencyYear {
    pub regency: String,
    pub year: i32,
    pub total_cases: f64,
    pub mean_cases: f64,
    pub max_cases: f64,
    /// Sample standard deviation; 0 for a single record.
    pub std_cases: f64,
    pub record_count: usize,
    pub district_count: usize,
    pub village_count: usize,
}

#[derive(Default)]
struct Accumulator<'a> {
    values: Vec<f64>,
    districts: BTreeSet<&'a str>,
    villages: BTreeSet<&'a str>,
}

/// Group records by `(regency, year)`, ordered by regency then year.
pub fn aggregate_by_regency_year(records: &[IncidentRecord]) -> Vec<RegencyYear> {
    let mut groups: BTreeMap<(&str, i32), Accumulator<'_>> = BTreeMap::new();
    for record in records {
        let acc = groups
            .entry((record.regency.as_str(), record.year))
            .or_default();
        acc.values.push(record.incidents);
        acc.districts.insert(record.district.as_str());
        acc.villages.insert(record.village.as_str());
    }

    groups
        .into_iter()
        .map(|((regency, year), acc)| {
            let n = acc.values.len();
            let total: f64 = acc.values.iter().sum();
            let mean = total / n as f64;
            let max = acc.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            RegencyYear {
                regency: regency.to_string(),
                year,
                total_cases: total,
                mean_cases: mean,
                max_cases: max,
                std_cases: sample_std(&acc.values, mean),
                record_count: n,
                district_count: acc.districts.len(),
                village_count: acc.villages.len(),
            }
        })
        .collect()
}

/// Sum of incidents per regency across all years.
pub fn historical_totals(records: &[IncidentRecord]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(record.regency.clone()).or_insert(0.0) += record.incidents;
    }
    totals
}

pub(crate) fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(regency: &str, district: &str, village: &str, incidents: f64, year: i32) -> IncidentRecord {
        IncidentRecord {
            province: "JAWA BARAT".into(),
            regency: regency.into(),
            district: district.into(),
            village: village.into(),
            incidents,
            year,
        }
    }

    #[test]
    fn groups_sorted_with_distinct_counts() {
        let records = vec![
            record("KOTA BANDUNG", "COBLONG", "DAGO", 1.0, 2020),
            record("KABUPATEN BOGOR", "CIBINONG", "PAKANSARI", 2.0, 2019),
            record("KABUPATEN BOGOR", "CIBINONG", "TENGAH", 4.0, 2019),
            record("KABUPATEN BOGOR", "CITEUREUP", "TENGAH", 0.0, 2019),
            record("KABUPATEN BOGOR", "CIBINONG", "PAKANSARI", 3.0, 2020),
        ];
        let groups = aggregate_by_regency_year(&records);
        assert_eq!(groups.len(), 3);
        let first = &groups[0];
        assert_eq!((first.regency.as_str(), first.year), ("KABUPATEN BOGOR", 2019));
        assert_eq!(first.total_cases, 6.0);
        assert_eq!(first.mean_cases, 2.0);
        assert_eq!(first.max_cases, 4.0);
        assert!((first.std_cases - 2.0).abs() < 1e-12);
        assert_eq!(first.record_count, 3);
        assert_eq!(first.district_count, 2);
        assert_eq!(first.village_count, 2);

        assert_eq!(groups[1].year, 2020);
        assert_eq!(groups[1].std_cases, 0.0);
        assert_eq!(groups[2].regency, "KOTA BANDUNG");
    }

    #[test]
    fn historical_totals_span_years() {
        let records = vec![
            record("A", "d", "v", 1.0, 2019),
            record("A", "d", "v", 2.5, 2020),
            record("B", "d", "v", 0.0, 2020),
        ];
        let totals = historical_totals(&records);
        assert_eq!(totals["A"], 3.5);
        assert_eq!(totals["B"], 0.0);
    }
}
