//! Row parsers for the text input formats.
//!
//! Two shapes are supported: dense (`label f1 f2 ...` with a detected
//! delimiter) and sparse LIBSVM (`label key:value ...`). The dense path
//! rides on the `csv` crate; LIBSVM is parsed by hand.

use crate::core::error::{BoostError, Result};
use crate::core::utils::common::parse_f64;
use std::collections::HashSet;

/// One parsed input row. Feature indices are raw column indices with the
/// label/weight/group columns already removed.
#[derive(Debug, Clone, Default)]
pub struct ParsedLine {
    pub label: f64,
    pub weight: Option<f64>,
    pub query_id: Option<i32>,
    pub features: Vec<(i32, f64)>,
}

/// Special-column layout of a dense file.
#[derive(Debug, Clone)]
pub struct ColumnSetup {
    pub label_col: i32,
    pub weight_col: i32,
    pub group_col: i32,
    pub ignore_cols: HashSet<i32>,
}

impl Default for ColumnSetup {
    fn default() -> Self {
        ColumnSetup {
            label_col: 0,
            weight_col: -1,
            group_col: -1,
            ignore_cols: HashSet::new(),
        }
    }
}

impl ColumnSetup {
    /// Feature index of a raw column, skipping special columns.
    fn feature_index(&self, col: i32) -> i32 {
        let mut idx = col;
        for &special in [self.label_col, self.weight_col, self.group_col]
            .iter()
            .filter(|&&c| c >= 0)
        {
            if special < col {
                idx -= 1;
            }
        }
        for &ignored in &self.ignore_cols {
            if ignored < col {
                idx -= 1;
            }
        }
        idx
    }
}

/// Detected shape of a text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Dense { delimiter: u8 },
    Libsvm,
}

/// Inspects one data line to decide the file's shape and delimiter.
pub fn detect_format(line: &str) -> TextFormat {
    // a key:value token after the label marks LIBSVM
    let mut tokens = line.split_whitespace();
    let _label = tokens.next();
    if let Some(tok) = tokens.next() {
        if let Some(pos) = tok.find(':') {
            if tok[..pos].parse::<i32>().is_ok() && tok[pos + 1..].parse::<f64>().is_ok() {
                return TextFormat::Libsvm;
            }
        }
    }
    let delimiter = if line.contains('\t') {
        b'\t'
    } else if line.contains(',') {
        b','
    } else {
        b' '
    };
    TextFormat::Dense { delimiter }
}

/// Dense row parser over csv records.
#[derive(Debug, Clone)]
pub struct DenseParser {
    delimiter: u8,
    setup: ColumnSetup,
}

impl DenseParser {
    pub fn new(delimiter: u8, setup: ColumnSetup) -> Self {
        DenseParser { delimiter, setup }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Parses one csv record. `row` is only used in error messages.
    pub fn parse_record(&self, record: &csv::StringRecord, row: usize) -> Result<ParsedLine> {
        let mut out = ParsedLine::default();
        let mut found_label = false;
        let mut col = 0i32;
        for field in record.iter() {
            let field = field.trim();
            if field.is_empty() && self.delimiter == b' ' {
                // artifact of repeated spaces
                continue;
            }
            let value = if field.is_empty() {
                f64::NAN
            } else {
                parse_f64(field).map_err(|_| {
                    BoostError::data_loading(format!(
                        "cannot parse value '{}' at row {}, column {}",
                        field, row, col
                    ))
                })?
            };
            if col == self.setup.label_col {
                out.label = value;
                found_label = true;
            } else if col == self.setup.weight_col {
                out.weight = Some(value);
            } else if col == self.setup.group_col {
                out.query_id = Some(value as i32);
            } else if !self.setup.ignore_cols.contains(&col) {
                out.features.push((self.setup.feature_index(col), value));
            }
            col += 1;
        }
        if !found_label {
            return Err(BoostError::data_loading(format!(
                "row {} has no label column",
                row
            )));
        }
        Ok(out)
    }
}

/// Sparse LIBSVM row parser.
#[derive(Debug, Clone)]
pub struct LibsvmParser {
    /// Keys in the file are 1-based.
    one_based: bool,
}

impl LibsvmParser {
    pub fn new(one_based: bool) -> Self {
        LibsvmParser { one_based }
    }

    pub fn parse_line(&self, line: &str, row: usize) -> Result<ParsedLine> {
        let mut out = ParsedLine::default();
        let mut tokens = line.split_whitespace();
        let label_tok = tokens
            .next()
            .ok_or_else(|| BoostError::data_loading(format!("row {} is empty", row)))?;
        out.label = parse_f64(label_tok).map_err(|_| {
            BoostError::data_loading(format!("cannot parse label '{}' at row {}", label_tok, row))
        })?;
        for tok in tokens {
            let pos = tok.find(':').ok_or_else(|| {
                BoostError::data_loading(format!(
                    "malformed token '{}' at row {} (expected key:value)",
                    tok, row
                ))
            })?;
            let mut key: i32 = tok[..pos].parse().map_err(|_| {
                BoostError::data_loading(format!("bad feature index '{}' at row {}", &tok[..pos], row))
            })?;
            if self.one_based {
                key -= 1;
            }
            if key < 0 {
                return Err(BoostError::data_loading(format!(
                    "feature index {} out of range at row {}",
                    tok, row
                )));
            }
            let value = parse_f64(&tok[pos + 1..]).map_err(|_| {
                BoostError::data_loading(format!(
                    "cannot parse value '{}' at row {}",
                    &tok[pos + 1..],
                    row
                ))
            })?;
            out.features.push((key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_libsvm_and_delimiters() {
        assert_eq!(detect_format("1 0:0.5 3:1.2"), TextFormat::Libsvm);
        assert_eq!(detect_format("1\t0.5\t1.2"), TextFormat::Dense { delimiter: b'\t' });
        assert_eq!(detect_format("1,0.5,1.2"), TextFormat::Dense { delimiter: b',' });
        assert_eq!(detect_format("1 0.5 1.2"), TextFormat::Dense { delimiter: b' ' });
    }

    #[test]
    fn dense_parser_splits_special_columns() {
        let mut setup = ColumnSetup::default();
        setup.weight_col = 2;
        let parser = DenseParser::new(b',', setup);
        let record = csv::StringRecord::from(vec!["1.5", "3.0", "0.5", "7.0"]);
        let parsed = parser.parse_record(&record, 0).unwrap();
        assert_eq!(parsed.label, 1.5);
        assert_eq!(parsed.weight, Some(0.5));
        // columns 1 and 3 become features 0 and 1
        assert_eq!(parsed.features, vec![(0, 3.0), (1, 7.0)]);
    }

    #[test]
    fn dense_parser_reports_row_and_column() {
        let parser = DenseParser::new(b',', ColumnSetup::default());
        let record = csv::StringRecord::from(vec!["1.0", "oops"]);
        let err = parser.parse_record(&record, 41).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("41") && msg.contains("column 1"));
    }

    #[test]
    fn libsvm_parser_handles_base() {
        let parser = LibsvmParser::new(true);
        let parsed = parser.parse_line("2 1:0.5 4:1.0", 0).unwrap();
        assert_eq!(parsed.label, 2.0);
        assert_eq!(parsed.features, vec![(0, 0.5), (3, 1.0)]);
        let parser = LibsvmParser::new(false);
        let parsed = parser.parse_line("2 0:0.5", 0).unwrap();
        assert_eq!(parsed.features, vec![(0, 0.5)]);
        assert!(parser.parse_line("1 bad", 3).is_err());
    }
}
