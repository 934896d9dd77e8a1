//! Row-parallel scoring of files and in-memory matrices.

use crate::boosting::Boosting;
use crate::config::Config;
use crate::core::error::Result;
use crate::core::utils::common::{array_to_string, softmax};
use crate::core::utils::log::Log;
use crate::dataset::loader::DatasetLoader;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use std::io::Write;

pub struct Predictor<'a> {
    boosting: &'a Boosting,
    /// Scratch feature vector length: `max_feature_idx + 1`.
    num_features: usize,
    /// Apply the objective's output transform (sigmoid/softmax).
    is_sigmoid: bool,
    /// Emit leaf indices instead of scores.
    predict_leaf_index: bool,
}

impl<'a> Predictor<'a> {
    pub fn new(boosting: &'a Boosting, is_sigmoid: bool, predict_leaf_index: bool) -> Self {
        Predictor {
            boosting,
            num_features: (boosting.gbdt().max_feature_idx() + 1).max(1) as usize,
            is_sigmoid,
            predict_leaf_index,
        }
    }

    /// Raw per-class scores of one sparse row. Used to seed init scores
    /// when training continues from an input model.
    pub fn predict_raw_one_line(&self, features: &[(i32, f64)]) -> Vec<f64> {
        let row = self.densify(features);
        if self.boosting.num_class() > 1 {
            self.boosting.predict_multiclass(&row)
        } else {
            vec![self.boosting.predict_raw(&row)]
        }
    }

    /// Transformed scores of one sparse row.
    pub fn predict_one_line(&self, features: &[(i32, f64)]) -> Vec<f64> {
        let row = self.densify(features);
        if self.boosting.num_class() > 1 {
            let mut out = self.boosting.predict_multiclass(&row);
            if self.is_sigmoid {
                softmax(&mut out);
            }
            out
        } else if self.is_sigmoid {
            vec![self.boosting.predict(&row)]
        } else {
            vec![self.boosting.predict_raw(&row)]
        }
    }

    fn densify(&self, features: &[(i32, f64)]) -> Vec<f64> {
        let mut row = vec![0.0f64; self.num_features];
        for &(f, v) in features {
            if (f as usize) < row.len() {
                row[f as usize] = v;
            }
        }
        row
    }

    /// Scores every row of a text file, one output line per row.
    pub fn predict_file(&self, config: &Config, input: &str, output: &str) -> Result<()> {
        let loader = DatasetLoader::new(config);
        let (_, format, setup) = loader.inspect_file(input)?;
        let mut file = std::fs::File::create(output)?;
        let mut total = 0usize;
        loader.for_each_batch(input, &format, &setup, |_, batch| {
            let lines: Vec<String> = batch
                .par_iter()
                .map(|line| {
                    if self.predict_leaf_index {
                        let row = self.densify(&line.features);
                        let leaves = self.boosting.predict_leaf_index(&row);
                        array_to_string(&leaves, '\t')
                    } else {
                        array_to_string(&self.predict_one_line(&line.features), '\t')
                    }
                })
                .collect();
            for l in &lines {
                writeln!(file, "{}", l)?;
            }
            total += batch.len();
            Ok(())
        })?;
        Log::info(&format!("finished prediction of {} rows to {}", total, output));
        Ok(())
    }

    /// Scores an in-memory matrix; one output row per input row.
    pub fn predict_matrix(&self, features: ArrayView2<'_, f64>) -> Array2<f64> {
        let rows = features.nrows();
        let num_class = self.boosting.num_class().max(1) as usize;
        let mut out = Array2::zeros((rows, num_class));
        let results: Vec<Vec<f64>> = (0..rows)
            .into_par_iter()
            .map(|r| {
                let row: Vec<f64> = features.row(r).to_vec();
                if num_class > 1 {
                    let mut v = self.boosting.predict_multiclass(&row);
                    if self.is_sigmoid {
                        softmax(&mut v);
                    }
                    v
                } else if self.is_sigmoid {
                    vec![self.boosting.predict(&row)]
                } else {
                    vec![self.boosting.predict_raw(&row)]
                }
            })
            .collect();
        for (r, values) in results.into_iter().enumerate() {
            for (c, v) in values.into_iter().enumerate() {
                out[(r, c)] = v;
            }
        }
        out
    }
}
