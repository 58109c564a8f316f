//! Loader for the raw per-village incident CSV.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ColumnNames;

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column {0:?}")]
    MissingColumn(String),
    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("dataset has no complete records")]
    Empty,
}

/// One village-year observation.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    pub province: String,
    /// Regency or city (kabupaten/kota).
    pub regency: String,
    /// Sub-district (kecamatan).
    pub district: String,
    /// Village (desa/kelurahan).
    pub village: String,
    pub incidents: f64,
    pub year: i32,
}

/// Counts of empty cells found per required column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingValueReport {
    pub per_column: BTreeMap<String, usize>,
    /// Rows skipped because at least one required cell was empty.
    pub dropped_rows: usize,
}

impl MissingValueReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_rows == 0
    }
}

/// Parsed incident table plus load diagnostics.
#[derive(Debug, Clone)]
pub struct IncidentTable {
    pub records: Vec<IncidentRecord>,
    pub missing: MissingValueReport,
    /// Every header of the source file, including unused ones.
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    province: usize,
    regency: usize,
    district: usize,
    village: usize,
    incidents: usize,
    year: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, names: &ColumnNames) -> Result<Self, DatasetLoadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| DatasetLoadError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            province: find(&names.province)?,
            regency: find(&names.regency)?,
            district: find(&names.district)?,
            village: find(&names.village)?,
            incidents: find(&names.incidents)?,
            year: find(&names.year)?,
        })
    }
}

/// Load incident records from a CSV file.
pub fn load_incidents(path: &Path, names: &ColumnNames) -> Result<IncidentTable, DatasetLoadError> {
    let file = File::open(path).map_err(|source| DatasetLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_incidents(file, names)?;
    tracing::info!(
        "Loaded {} incident records from {} ({} incomplete rows dropped)",
        table.records.len(),
        path.display(),
        table.missing.dropped_rows
    );
    Ok(table)
}

/// Parse incident records from any CSV reader.
pub fn read_incidents<R: Read>(
    reader: R,
    names: &ColumnNames,
) -> Result<IncidentTable, DatasetLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let index = ColumnIndex::resolve(&headers, names)?;

    let mut missing = MissingValueReport::default();
    for name in required_names(names) {
        missing.per_column.insert(name.to_string(), 0);
    }

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let line = row.position().map(|pos| pos.line()).unwrap_or(0);
        let cells = [
            (&names.province, row.get(index.province)),
            (&names.regency, row.get(index.regency)),
            (&names.district, row.get(index.district)),
            (&names.village, row.get(index.village)),
            (&names.incidents, row.get(index.incidents)),
            (&names.year, row.get(index.year)),
        ];
        let mut complete = true;
        for (name, cell) in &cells {
            if cell.is_none_or(str::is_empty) {
                complete = false;
                if let Some(count) = missing.per_column.get_mut(name.as_str()) {
                    *count += 1;
                }
            }
        }
        if !complete {
            missing.dropped_rows += 1;
            continue;
        }

        let text = |idx: usize| row.get(idx).unwrap_or_default().to_string();
        let incidents = parse_count(row.get(index.incidents).unwrap_or_default())
            .ok_or_else(|| DatasetLoadError::InvalidValue {
                line,
                column: names.incidents.clone(),
                value: text(index.incidents),
            })?;
        let year = parse_year(row.get(index.year).unwrap_or_default()).ok_or_else(|| {
            DatasetLoadError::InvalidValue {
                line,
                column: names.year.clone(),
                value: text(index.year),
            }
        })?;
        records.push(IncidentRecord {
            province: text(index.province),
            regency: text(index.regency),
            district: text(index.district),
            village: text(index.village),
            incidents,
            year,
        });
    }

    if records.is_empty() {
        return Err(DatasetLoadError::Empty);
    }
    Ok(IncidentTable {
        records,
        missing,
        headers: headers.iter().map(str::to_string).collect(),
    })
}

fn required_names(names: &ColumnNames) -> [&str; 6] {
    [
        &names.province,
        &names.regency,
        &names.district,
        &names.village,
        &names.incidents,
        &names.year,
    ]
}

fn parse_count(raw: &str) -> Option<f64> {
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    // Exports from spreadsheet tools sometimes write years as `2019.0`.
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.abs() < i32::MAX as f64).then_some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,kode_provinsi,nama_provinsi,bps_nama_kabupaten_kota,bps_nama_kecamatan,bps_nama_desa_kelurahan,jumlah_kejadian,satuan,tahun";

    fn parse(body: &str) -> Result<IncidentTable, DatasetLoadError> {
        let text = format!("{HEADER}\n{body}");
        read_incidents(text.as_bytes(), &ColumnNames::default())
    }

    #[test]
    fn reads_required_columns_and_ignores_extra() {
        let table = parse(
            "1,32,JAWA BARAT,KABUPATEN BOGOR,CIBINONG,PAKANSARI,2,KASUS,2019\n\
             2,32,JAWA BARAT,KOTA BANDUNG,COBLONG,DAGO,0,KASUS,2020.0\n",
        )
        .unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].regency, "KABUPATEN BOGOR");
        assert_eq!(table.records[0].incidents, 2.0);
        assert_eq!(table.records[1].year, 2020);
        assert!(table.missing.is_clean());
        assert_eq!(table.headers.len(), 9);
    }

    #[test]
    fn drops_rows_with_empty_cells() {
        let table = parse(
            "1,32,JAWA BARAT,KABUPATEN BOGOR,CIBINONG,PAKANSARI,,KASUS,2019\n\
             2,32,JAWA BARAT,KABUPATEN BOGOR,,PAKANSARI,1,KASUS,\n\
             3,32,JAWA BARAT,KOTA BANDUNG,COBLONG,DAGO,1,KASUS,2019\n",
        )
        .unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.missing.dropped_rows, 2);
        assert_eq!(table.missing.per_column["jumlah_kejadian"], 1);
        assert_eq!(table.missing.per_column["bps_nama_kecamatan"], 1);
        assert_eq!(table.missing.per_column["tahun"], 1);
    }

    #[test]
    fn rejects_unparsable_counts_with_line() {
        let err = parse("1,32,JAWA BARAT,KOTA BANDUNG,COBLONG,DAGO,many,KASUS,2019\n").unwrap_err();
        match err {
            DatasetLoadError::InvalidValue { line, column, value } => {
                assert_eq!(line, 2);
                assert_eq!(column, "jumlah_kejadian");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_header_is_reported() {
        let text = "nama_provinsi,tahun\nJAWA BARAT,2019\n";
        let err = read_incidents(text.as_bytes(), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, DatasetLoadError::MissingColumn(name) if name == "bps_nama_kabupaten_kota"));
    }

    #[test]
    fn empty_body_is_an_error() {
        assert!(matches!(parse(""), Err(DatasetLoadError::Empty)));
    }
}
