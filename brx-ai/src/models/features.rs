//! Feature families, per-family matrices and the aggregated feature record
//!
//! Column naming is `{family}_{stat}`. Families appear in extraction order and
//! statistics in (mean, std, max, min) order; the classifier was trained on
//! exactly this layout.

use ndarray::Array2;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// One named spectral/temporal transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    ChromaStft,
    Mfcc,
    MelSpectrogram,
    SpectralContrast,
    SpectralCentroid,
    SpectralBandwidth,
    SpectralRolloff,
    ZeroCrossingRate,
}

impl FeatureFamily {
    /// Extraction order
    pub const ALL: [FeatureFamily; 8] = [
        FeatureFamily::ChromaStft,
        FeatureFamily::Mfcc,
        FeatureFamily::MelSpectrogram,
        FeatureFamily::SpectralContrast,
        FeatureFamily::SpectralCentroid,
        FeatureFamily::SpectralBandwidth,
        FeatureFamily::SpectralRolloff,
        FeatureFamily::ZeroCrossingRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureFamily::ChromaStft => "chroma_stft",
            FeatureFamily::Mfcc => "mfcc",
            FeatureFamily::MelSpectrogram => "mel_spectrogram",
            FeatureFamily::SpectralContrast => "spectral_contrast",
            FeatureFamily::SpectralCentroid => "spectral_centroid",
            FeatureFamily::SpectralBandwidth => "spectral_bandwidth",
            FeatureFamily::SpectralRolloff => "spectral_rolloff",
            FeatureFamily::ZeroCrossingRate => "zero_crossing_rate",
        }
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistic computed over a whole feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Std,
    Max,
    Min,
}

impl Statistic {
    /// Column order within a family
    pub const ALL: [Statistic; 4] = [Statistic::Mean, Statistic::Std, Statistic::Max, Statistic::Min];

    pub fn as_str(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Max => "max",
            Statistic::Min => "min",
        }
    }
}

/// Column key for a (family, statistic) pair
pub fn feature_key(family: FeatureFamily, stat: Statistic) -> String {
    format!("{}_{}", family.as_str(), stat.as_str())
}

/// Coefficient-bins × time-frames grid for one family of one clip
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    family: FeatureFamily,
    data: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(family: FeatureFamily, data: Array2<f64>) -> Self {
        Self { family, data }
    }

    pub fn family(&self) -> FeatureFamily {
        self.family
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// (bins, frames)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Ordered feature-key → value record for one clip
///
/// Serializes as a JSON object whose key order is the column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (replaces the value if the key already exists)
    pub fn push(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.position(&key) {
            Some(i) => self.values[i] = value,
            None => {
                self.columns.push(key);
                self.values.push(value);
            }
        }
    }

    /// Remove a column, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<f64> {
        let i = self.position(key)?;
        self.columns.remove(i);
        Some(self.values.remove(i))
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.position(key).map(|i| self.values[i])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == key)
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

/// Why a row was not added to a [`FeatureTable`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejected {
    #[error("row '{0}' does not match the table's column layout")]
    ColumnMismatch(String),
    #[error("a row named '{0}' is already present")]
    DuplicateName(String),
}

/// Batch output: one row per clip, keyed by original filename
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<(String, FeatureRecord)>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its columns must match the table's and its name must
    /// be new
    pub fn push_row(&mut self, filename: impl Into<String>, record: FeatureRecord) -> Result<(), RowRejected> {
        let filename = filename.into();
        if record.columns() != self.columns.as_slice() {
            return Err(RowRejected::ColumnMismatch(filename));
        }
        if self.row(&filename).is_some() {
            return Err(RowRejected::DuplicateName(filename));
        }
        self.rows.push((filename, record));
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[(String, FeatureRecord)] {
        &self.rows
    }

    pub fn row(&self, filename: &str) -> Option<&FeatureRecord> {
        self.rows
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

struct Rows<'a>(&'a [(String, FeatureRecord)]);

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, record) in self.0 {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

impl Serialize for FeatureTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut table = serializer.serialize_struct("FeatureTable", 2)?;
        table.serialize_field("columns", &self.columns)?;
        table.serialize_field("rows", &Rows(&self.rows))?;
        table.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        let names: Vec<&str> = FeatureFamily::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "chroma_stft",
                "mfcc",
                "mel_spectrogram",
                "spectral_contrast",
                "spectral_centroid",
                "spectral_bandwidth",
                "spectral_rolloff",
                "zero_crossing_rate"
            ]
        );
        assert_eq!(feature_key(FeatureFamily::Mfcc, Statistic::Std), "mfcc_std");
    }

    #[test]
    fn test_record_preserves_insertion_order() {
        let mut record = FeatureRecord::new();
        record.push("b", 2.0);
        record.push("a", 1.0);
        record.push("c", 3.0);
        assert_eq!(record.remove("a"), Some(1.0));
        assert_eq!(record.columns(), &["b".to_string(), "c".to_string()]);
        assert_eq!(record.remove("missing"), None);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":2.0,"c":3.0}"#);
    }

    #[test]
    fn test_table_rejects_mismatched_columns() {
        let mut first = FeatureRecord::new();
        first.push("x", 1.0);
        let mut other = FeatureRecord::new();
        other.push("y", 1.0);

        let mut table = FeatureTable::new(vec!["x".to_string()]);
        assert_eq!(table.push_row("one.wav", first.clone()), Ok(()));
        assert_eq!(
            table.push_row("two.wav", other),
            Err(RowRejected::ColumnMismatch("two.wav".to_string()))
        );
        assert_eq!(
            table.push_row("one.wav", first),
            Err(RowRejected::DuplicateName("one.wav".to_string()))
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.row("one.wav").and_then(|r| r.get("x")), Some(1.0));

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rows"]["one.wav"]["x"], 1.0);
    }
}
