//! CSV artifacts shared between pipeline stages.
//!
//! The prepare stage writes the split feature matrices here and the later
//! stages read them back, so every artifact goes through the same
//! serde-backed row types.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::features::{FEATURE_NAMES, FeatureTable, Features, RegencyEncoder};
use super::split::TrainTestIndices;

pub const X_TRAIN_FILE: &str = "X_train.csv";
pub const X_TEST_FILE: &str = "X_test.csv";
pub const Y_TRAIN_FILE: &str = "y_train.csv";
pub const Y_TEST_FILE: &str = "y_test.csv";
pub const PROCESSED_FILE: &str = "data_processed_complete.csv";
pub const FEATURE_LIST_FILE: &str = "feature_list.csv";
pub const ENCODING_FILE: &str = "regency_encoding_mapping.csv";

/// Errors returned when writing or reading stage artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{x_path} has {x_rows} rows but {y_path} has {y_rows}")]
    LengthMismatch {
        x_path: PathBuf,
        x_rows: usize,
        y_path: PathBuf,
        y_rows: usize,
    },
    #[error("invalid content in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Row type of a headed CSV artifact.
///
/// `COLUMNS` lists the serialized field names in declaration order. It is
/// written as the header even when there are no rows.
pub trait CsvRecord: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// Single-column target file row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRow {
    pub at_risk: u8,
}

impl CsvRecord for TargetRow {
    const COLUMNS: &'static [&'static str] = &["at_risk"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingRow {
    pub regency: String,
    pub regency_code: usize,
}

impl CsvRecord for EncodingRow {
    const COLUMNS: &'static [&'static str] = &["regency", "regency_code"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureListRow {
    pub feature_name: String,
    pub feature_index: usize,
}

impl CsvRecord for FeatureListRow {
    const COLUMNS: &'static [&'static str] = &["feature_name", "feature_index"];
}

impl CsvRecord for Features {
    const COLUMNS: &'static [&'static str] = &FEATURE_NAMES;
}

/// Train/test matrices read back from a prepare-stage output directory.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: Vec<Features>,
    pub y_train: Vec<usize>,
    pub x_test: Vec<Features>,
    pub y_test: Vec<usize>,
    pub encoder: RegencyEncoder,
}

impl PreparedData {
    pub fn train_matrix(&self) -> Vec<Vec<f64>> {
        self.x_train.iter().map(Features::to_vec).collect()
    }

    pub fn test_matrix(&self) -> Vec<Vec<f64>> {
        self.x_test.iter().map(Features::to_vec).collect()
    }
}

/// Create `dir` and its parents if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|err| ExportError::io(dir, err))
}

/// Serialize `rows` as a headed CSV file; an empty slice still gets the header.
pub fn write_rows<T: CsvRecord>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|err| ExportError::io(path, err))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer
        .write_record(T::COLUMNS)
        .map_err(|err| ExportError::csv(path, err))?;
    for row in rows {
        writer.serialize(row).map_err(|err| ExportError::csv(path, err))?;
    }
    writer.flush().map_err(|err| ExportError::io(path, err))
}

/// Deserialize every row of a headed CSV file.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ExportError> {
    let file = File::open(path).map_err(|err| ExportError::io(path, err))?;
    let mut reader = csv::Reader::from_reader(file);
    reader
        .deserialize::<T>()
        .map(|row| row.map_err(|err| ExportError::csv(path, err)))
        .collect()
}

pub fn write_text(path: &Path, text: &str) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|err| ExportError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|err| ExportError::io(path, err))
}

/// Write every prepare-stage CSV into `dir`.
pub fn write_prepared(
    dir: &Path,
    table: &FeatureTable,
    split: &TrainTestIndices,
) -> Result<(), ExportError> {
    ensure_dir(dir)?;
    let features = |indices: &[usize]| -> Vec<Features> {
        indices.iter().map(|&i| table.rows[i].features.clone()).collect()
    };
    let targets = |indices: &[usize]| -> Vec<TargetRow> {
        indices
            .iter()
            .map(|&i| TargetRow {
                at_risk: u8::from(table.rows[i].at_risk),
            })
            .collect()
    };
    write_rows(&dir.join(X_TRAIN_FILE), &features(&split.train))?;
    write_rows(&dir.join(X_TEST_FILE), &features(&split.test))?;
    write_rows(&dir.join(Y_TRAIN_FILE), &targets(&split.train))?;
    write_rows(&dir.join(Y_TEST_FILE), &targets(&split.test))?;
    write_processed(&dir.join(PROCESSED_FILE), table)?;

    let feature_list: Vec<FeatureListRow> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(feature_index, name)| FeatureListRow {
            feature_name: name.to_string(),
            feature_index,
        })
        .collect();
    write_rows(&dir.join(FEATURE_LIST_FILE), &feature_list)?;
    write_rows(&dir.join(ENCODING_FILE), &encoding_rows(&table.encoder))?;
    tracing::info!(
        "Wrote prepared data to {} ({} train / {} test rows)",
        dir.display(),
        split.train.len(),
        split.test.len()
    );
    Ok(())
}

pub fn encoding_rows(encoder: &RegencyEncoder) -> Vec<EncodingRow> {
    encoder
        .classes()
        .iter()
        .enumerate()
        .map(|(regency_code, regency)| EncodingRow {
            regency: regency.clone(),
            regency_code,
        })
        .collect()
}

fn write_processed(path: &Path, table: &FeatureTable) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|err| ExportError::io(path, err))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let mut header = vec!["regency", "total_cases"];
    header.extend(FEATURE_NAMES);
    header.push("at_risk");
    writer
        .write_record(&header)
        .map_err(|err| ExportError::csv(path, err))?;
    for row in &table.rows {
        let mut record = vec![row.regency.clone(), row.total_cases.to_string()];
        record.extend(row.features.to_vec().iter().map(f64::to_string));
        record.push(u8::from(row.at_risk).to_string());
        writer
            .write_record(&record)
            .map_err(|err| ExportError::csv(path, err))?;
    }
    writer.flush().map_err(|err| ExportError::io(path, err))
}

/// Read a features CSV with the model column headers.
pub fn read_features(path: &Path) -> Result<Vec<Features>, ExportError> {
    read_rows(path)
}

fn read_targets(path: &Path) -> Result<Vec<usize>, ExportError> {
    let rows: Vec<TargetRow> = read_rows(path)?;
    rows.into_iter()
        .map(|row| match row.at_risk {
            0 | 1 => Ok(usize::from(row.at_risk)),
            other => Err(ExportError::Invalid {
                path: path.to_path_buf(),
                message: format!("target value {other} is not 0 or 1"),
            }),
        })
        .collect()
}

pub fn read_encoder(path: &Path) -> Result<RegencyEncoder, ExportError> {
    let rows: Vec<EncodingRow> = read_rows(path)?;
    RegencyEncoder::from_pairs(
        rows.into_iter()
            .map(|row| (row.regency, row.regency_code))
            .collect(),
    )
    .map_err(|message| ExportError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

/// Load the split matrices written by [`write_prepared`].
pub fn load_prepared(dir: &Path) -> Result<PreparedData, ExportError> {
    let load_pair = |x_name: &str, y_name: &str| -> Result<(Vec<Features>, Vec<usize>), ExportError> {
        let x_path = dir.join(x_name);
        let y_path = dir.join(y_name);
        let x = read_features(&x_path)?;
        let y = read_targets(&y_path)?;
        if x.len() != y.len() {
            return Err(ExportError::LengthMismatch {
                x_path,
                x_rows: x.len(),
                y_path,
                y_rows: y.len(),
            });
        }
        Ok((x, y))
    };
    let (x_train, y_train) = load_pair(X_TRAIN_FILE, Y_TRAIN_FILE)?;
    let (x_test, y_test) = load_pair(X_TEST_FILE, Y_TEST_FILE)?;
    let encoder = read_encoder(&dir.join(ENCODING_FILE))?;
    Ok(PreparedData {
        x_train,
        y_train,
        x_test,
        y_test,
        encoder,
    })
}

/// Header line serde derives for `sample`, for checking `CsvRecord::COLUMNS`.
#[cfg(test)]
pub(crate) fn derived_header<T: Serialize>(sample: &T) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.serialize(sample).expect("serialize sample row");
    let bytes = writer.into_inner().expect("flush sample row");
    String::from_utf8(bytes)
        .expect("utf-8 csv")
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
