//! Text and binary dataset loading.
//!
//! One-round loading parses the whole file into memory, samples rows for
//! bin construction, then materialises the binned columns. Two-round
//! loading streams the file twice instead: once to count rows and draw a
//! reservoir sample, once to push rows batch by batch.

use crate::config::Config;
use crate::core::constants::K_LOAD_BATCH_SIZE;
use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label};
use crate::core::utils::log::Log;
use crate::core::utils::random::Random;
use crate::dataset::bin_mapper::{BinMapper, K_ZERO_BOUND};
use crate::dataset::dataset::Dataset;
use crate::dataset::feature::Feature;
use crate::dataset::metadata::Metadata;
use crate::dataset::parser::{
    detect_format, ColumnSetup, DenseParser, LibsvmParser, ParsedLine, TextFormat,
};
use rayon::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Scores raw rows of an input model, used to seed init scores when
/// training continues from an existing model.
pub type PredictFunction<'a> = &'a (dyn Fn(&[(i32, f64)]) -> Vec<f64> + Sync);

pub struct DatasetLoader<'a> {
    config: &'a Config,
    rank: i32,
    num_machines: i32,
    predict_fun: Option<PredictFunction<'a>>,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(config: &'a Config) -> Self {
        DatasetLoader {
            config,
            rank: 0,
            num_machines: 1,
            predict_fun: None,
        }
    }

    /// Configures the distributed row slice this machine keeps when the
    /// input is not pre-partitioned.
    pub fn with_partition(mut self, rank: i32, num_machines: i32) -> Self {
        self.rank = rank;
        self.num_machines = num_machines;
        self
    }

    pub fn with_predict_fun(mut self, predict_fun: PredictFunction<'a>) -> Self {
        self.predict_fun = Some(predict_fun);
        self
    }

    /// Loads the training dataset, from the binary sibling file when one
    /// exists, from text otherwise.
    pub fn load_train(&self) -> Result<Dataset> {
        let filename = &self.config.io.data_filename;
        let bin_path = format!("{}.bin", filename);
        if Path::new(&bin_path).exists() {
            let mut data = Dataset::load_from_binary(&bin_path)?;
            self.load_init_scores(&mut data, None)?;
            return Ok(data);
        }
        let mut data = self.load_text(filename, None)?;
        if self.config.io.is_save_binary_file {
            data.save_binary_file(None)?;
        }
        Ok(data)
    }

    /// Loads a validation dataset binned with the training dataset's
    /// mappers.
    pub fn load_valid(&self, filename: &str, train: &Dataset) -> Result<Dataset> {
        self.load_text(filename, Some(train))
    }

    fn load_text(&self, filename: &str, align_to: Option<&Dataset>) -> Result<Dataset> {
        let (header_names, format, setup) = self.inspect_file(filename)?;

        let mut rows: Vec<ParsedLine> = Vec::new();
        let mut num_total_features: i32 = align_to.map_or(0, |t| t.num_total_features());

        if self.config.io.use_two_round_loading && align_to.is_none() {
            // round one: count and reservoir-sample
            let sample_target = self.config.io.bin_construct_sample_cnt.max(1) as usize;
            let mut random = Random::with_seed(self.config.io.data_random_seed);
            let mut sampled: Vec<ParsedLine> = Vec::with_capacity(sample_target);
            let mut num_data: usize = 0;
            self.for_each_batch(filename, &format, &setup, |start, batch| {
                for (i, line) in batch.into_iter().enumerate() {
                    let row = start + i;
                    for &(f, _) in &line.features {
                        num_total_features = num_total_features.max(f + 1);
                    }
                    if row < sample_target {
                        sampled.push(line);
                    } else {
                        let j = random.next_int(0, row as i32 + 1) as usize;
                        if j < sample_target {
                            sampled[j] = line;
                        }
                    }
                    num_data = row + 1;
                }
                Ok(())
            })?;
            if num_data == 0 {
                return Err(BoostError::data_loading(format!("{} has no data rows", filename)));
            }
            let dataset = self.build_from_sample(
                filename,
                num_data,
                num_total_features,
                &sampled,
                sampled.len().min(num_data),
            )?;
            // round two: stream rows into the columns and metadata
            let mut dataset = dataset;
            let mut labels = vec![0.0f32; num_data];
            let mut weights: Vec<Label> = Vec::new();
            let mut query_ids: Vec<DataSize> = Vec::new();
            self.for_each_batch(filename, &format, &setup, |start, batch| {
                collect_metadata(&batch, start, &mut labels, &mut weights, &mut query_ids);
                push_batch(&mut dataset.features, start as DataSize, &batch, num_total_features)?;
                Ok(())
            })?;
            if let Some(names) = header_names {
                dataset.feature_names = names;
            }
            if let TextFormat::Dense { .. } = format {
                dataset.label_idx = setup.label_col;
            }
            self.finish(&mut dataset, labels, weights, query_ids, filename)?;
            return Ok(dataset);
        }

        // one-round: everything in memory
        self.for_each_batch(filename, &format, &setup, |_, mut batch| {
            for line in &batch {
                for &(f, _) in &line.features {
                    num_total_features = num_total_features.max(f + 1);
                }
            }
            rows.append(&mut batch);
            Ok(())
        })?;
        if self.num_machines > 1 && !self.config.io.is_pre_partition && align_to.is_none() {
            let rank = self.rank;
            let num_machines = self.num_machines;
            let mut keep = 0usize;
            for i in 0..rows.len() {
                if (i as i32) % num_machines == rank {
                    rows.swap(keep, i);
                    keep += 1;
                }
            }
            rows.truncate(keep);
        }
        let num_data = rows.len();
        if num_data == 0 {
            return Err(BoostError::data_loading(format!("{} has no data rows", filename)));
        }

        let mut dataset = match align_to {
            Some(train) => {
                for line in &rows {
                    for &(f, _) in &line.features {
                        if f >= train.num_total_features() {
                            return Err(BoostError::dataset(format!(
                                "validation feature index {} is out of the training range {}",
                                f,
                                train.num_total_features()
                            )));
                        }
                    }
                }
                self.build_aligned(train, num_data)?
            }
            None => {
                let sample_cnt = (self.config.io.bin_construct_sample_cnt.max(1) as usize).min(num_data);
                let mut random = Random::with_seed(self.config.io.data_random_seed);
                let sample_idx = random.sample(num_data as i32, sample_cnt as i32);
                let sampled: Vec<ParsedLine> = sample_idx
                    .iter()
                    .map(|&i| rows[i as usize].clone())
                    .collect();
                self.build_from_sample(filename, num_data, num_total_features, &sampled, sample_cnt)?
            }
        };

        let mut labels = vec![0.0f32; num_data];
        let mut weights: Vec<Label> = Vec::new();
        let mut query_ids: Vec<DataSize> = Vec::new();
        collect_metadata(&rows, 0, &mut labels, &mut weights, &mut query_ids);
        let declared_features = dataset.num_total_features();
        for start in (0..num_data).step_by(K_LOAD_BATCH_SIZE) {
            let end = (start + K_LOAD_BATCH_SIZE).min(num_data);
            push_batch(
                &mut dataset.features,
                start as DataSize,
                &rows[start..end],
                declared_features,
            )?;
        }
        if align_to.is_none() {
            dataset.feature_names = header_names
                .unwrap_or_else(|| feature_default_names(dataset.num_total_features()));
            if let TextFormat::Dense { .. } = format {
                dataset.label_idx = setup.label_col;
            }
        }
        self.finish(&mut dataset, labels, weights, query_ids, filename)?;
        Ok(dataset)
    }

    /// Reads the first line(s) to fix header names, format and the
    /// special-column layout.
    pub(crate) fn inspect_file(
        &self,
        filename: &str,
    ) -> Result<(Option<Vec<String>>, TextFormat, ColumnSetup)> {
        let file = std::fs::File::open(filename).map_err(|e| {
            BoostError::data_loading(format!("cannot open {}: {}", filename, e))
        })?;
        let mut reader = BufReader::new(file);
        let mut first = String::new();
        reader.read_line(&mut first)?;
        let mut data_line = first.trim_end().to_string();
        if self.config.io.has_header {
            let mut second = String::new();
            reader.read_line(&mut second)?;
            data_line = second.trim_end().to_string();
        }
        if data_line.is_empty() {
            return Err(BoostError::data_loading(format!("{} has no data rows", filename)));
        }
        let format = detect_format(&data_line);

        let header_columns: Option<Vec<String>> = if self.config.io.has_header {
            let delim = match format {
                TextFormat::Dense { delimiter: b' ' } => None,
                TextFormat::Dense { delimiter } => Some(delimiter as char),
                TextFormat::Libsvm => None,
            };
            let first = first.trim_end();
            Some(match delim {
                Some(d) => first.split(d).map(|s| s.trim().to_string()).collect(),
                None => first.split_whitespace().map(|s| s.to_string()).collect(),
            })
        } else {
            None
        };

        let mut setup = ColumnSetup::default();
        if let TextFormat::Dense { .. } = format {
            setup.label_col = resolve_column(
                &self.config.io.label_column,
                header_columns.as_deref(),
                0,
            )?;
            setup.weight_col = resolve_column(
                &self.config.io.weight_column,
                header_columns.as_deref(),
                -1,
            )?;
            setup.group_col = resolve_column(
                &self.config.io.group_column,
                header_columns.as_deref(),
                -1,
            )?;
            for spec in &self.config.io.ignore_columns {
                setup
                    .ignore_cols
                    .insert(resolve_column(spec, header_columns.as_deref(), -1)?);
            }
            setup.ignore_cols.remove(&-1);
        }

        // header names minus the special columns give the feature names
        let feature_names = header_columns.map(|cols| {
            cols.iter()
                .enumerate()
                .filter(|&(i, _)| {
                    let col = i as i32;
                    col != setup.label_col
                        && col != setup.weight_col
                        && col != setup.group_col
                        && !setup.ignore_cols.contains(&col)
                })
                .map(|(_, name)| name.clone())
                .collect()
        });
        Ok((feature_names, format, setup))
    }

    /// Streams the file as parsed-row batches.
    pub(crate) fn for_each_batch<F>(
        &self,
        filename: &str,
        format: &TextFormat,
        setup: &ColumnSetup,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(usize, Vec<ParsedLine>) -> Result<()>,
    {
        match *format {
            TextFormat::Dense { delimiter } => {
                let parser = DenseParser::new(delimiter, setup.clone());
                let mut reader = csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(self.config.io.has_header)
                    .flexible(true)
                    .trim(csv::Trim::All)
                    .from_path(filename)?;
                let mut start = 0usize;
                let mut batch: Vec<csv::StringRecord> = Vec::with_capacity(K_LOAD_BATCH_SIZE);
                let mut record = csv::StringRecord::new();
                loop {
                    let more = reader.read_record(&mut record)?;
                    if more {
                        batch.push(record.clone());
                    }
                    if batch.len() >= K_LOAD_BATCH_SIZE || (!more && !batch.is_empty()) {
                        let parsed: Result<Vec<ParsedLine>> = batch
                            .par_iter()
                            .enumerate()
                            .map(|(i, rec)| parser.parse_record(rec, start + i))
                            .collect();
                        f(start, parsed?)?;
                        start += batch.len();
                        batch.clear();
                    }
                    if !more {
                        break;
                    }
                }
                Ok(())
            }
            TextFormat::Libsvm => {
                let parser = LibsvmParser::new(self.config.io.sparse_one_based);
                let file = std::fs::File::open(filename)?;
                let reader = BufReader::new(file);
                let mut lines = reader.lines();
                if self.config.io.has_header {
                    let _ = lines.next();
                }
                let mut start = 0usize;
                let mut batch: Vec<String> = Vec::with_capacity(K_LOAD_BATCH_SIZE);
                loop {
                    let mut done = false;
                    while batch.len() < K_LOAD_BATCH_SIZE {
                        match lines.next() {
                            Some(line) => {
                                let line = line?;
                                if !line.trim().is_empty() {
                                    batch.push(line);
                                }
                            }
                            None => {
                                done = true;
                                break;
                            }
                        }
                    }
                    if !batch.is_empty() {
                        let parsed: Result<Vec<ParsedLine>> = batch
                            .par_iter()
                            .enumerate()
                            .map(|(i, line)| parser.parse_line(line, start + i))
                            .collect();
                        f(start, parsed?)?;
                        start += batch.len();
                        batch.clear();
                    }
                    if done {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Fits bin mappers on the sampled rows and allocates the dataset
    /// skeleton (columns still empty).
    fn build_from_sample(
        &self,
        filename: &str,
        num_data: usize,
        num_total_features: i32,
        sampled: &[ParsedLine],
        sample_cnt: usize,
    ) -> Result<Dataset> {
        if num_total_features <= 0 {
            return Err(BoostError::data_loading(format!(
                "{} has no feature columns",
                filename
            )));
        }
        let mut per_feature: Vec<Vec<f64>> = vec![Vec::new(); num_total_features as usize];
        for line in sampled {
            for &(f, v) in &line.features {
                if !v.is_nan() && v.abs() > K_ZERO_BOUND {
                    per_feature[f as usize].push(v);
                }
            }
        }
        let max_bin = self.config.io.max_bin;
        let mappers: Vec<BinMapper> = per_feature
            .into_par_iter()
            .map(|values| BinMapper::find_bin(&values, sample_cnt, max_bin))
            .collect();

        let mut used_feature_map = vec![-1i32; num_total_features as usize];
        let mut features: Vec<Feature> = Vec::new();
        for (col, mapper) in mappers.into_iter().enumerate() {
            if mapper.is_trivial() {
                continue;
            }
            used_feature_map[col] = features.len() as i32;
            features.push(Feature::new(
                col as i32,
                mapper,
                num_data as DataSize,
                self.config.io.is_enable_sparse,
            ));
        }
        if features.is_empty() {
            return Err(BoostError::dataset(format!(
                "{} has no usable feature: every column is constant",
                filename
            )));
        }
        Log::info(&format!(
            "using {} of {} features ({} rows)",
            features.len(),
            num_total_features,
            num_data
        ));
        Ok(Dataset {
            data_filename: filename.to_string(),
            num_data: num_data as DataSize,
            num_class: self.config.objective.num_class,
            num_total_features,
            used_feature_map,
            features,
            feature_names: feature_default_names(num_total_features),
            label_idx: 0,
            metadata: Metadata::new(num_data as DataSize, self.config.objective.num_class),
        })
    }

    fn build_aligned(&self, train: &Dataset, num_data: usize) -> Result<Dataset> {
        let features: Vec<Feature> = train
            .features
            .iter()
            .map(|f| {
                Feature::new(
                    f.feature_index(),
                    f.bin_mapper().clone(),
                    num_data as DataSize,
                    self.config.io.is_enable_sparse,
                )
            })
            .collect();
        Ok(Dataset {
            data_filename: String::new(),
            num_data: num_data as DataSize,
            num_class: train.num_class(),
            num_total_features: train.num_total_features(),
            used_feature_map: train.used_feature_map.clone(),
            features,
            feature_names: train.feature_names().to_vec(),
            label_idx: train.label_idx(),
            metadata: Metadata::new(num_data as DataSize, train.num_class()),
        })
    }

    /// Metadata assembly and the final seal.
    fn finish(
        &self,
        dataset: &mut Dataset,
        labels: Vec<Label>,
        weights: Vec<Label>,
        query_ids: Vec<DataSize>,
        filename: &str,
    ) -> Result<()> {
        dataset.features.par_iter_mut().for_each(|f| f.finish_load());
        dataset.metadata_mut().set_label(labels)?;

        // aux files override in-file columns
        let weight_file = load_values_file(&format!("{}.weight", filename))?;
        match weight_file {
            Some(values) => dataset
                .metadata_mut()
                .set_weights(values.into_iter().map(|v| v as Label).collect())?,
            None => dataset.metadata_mut().set_weights(weights)?,
        }
        let query_file = load_values_file(&format!("{}.query", filename))?;
        match query_file {
            Some(counts) => dataset
                .metadata_mut()
                .set_query_counts(&counts.into_iter().map(|v| v as DataSize).collect::<Vec<_>>())?,
            None => {
                if !query_ids.is_empty() {
                    dataset.metadata_mut().set_query_ids(&query_ids)?;
                }
            }
        }
        self.load_init_scores(dataset, Some(filename))?;
        dataset.metadata().check_labels()?;
        Ok(())
    }

    fn load_init_scores(&self, dataset: &mut Dataset, filename: Option<&str>) -> Result<()> {
        let num_class = dataset.num_class() as usize;
        let num_data = dataset.num_data() as usize;
        let init_path = if !self.config.io.input_init_score.is_empty() {
            Some(self.config.io.input_init_score.clone())
        } else {
            filename.map(|f| format!("{}.init", f))
        };
        if let Some(path) = init_path {
            if Path::new(&path).exists() {
                let mut scores = vec![0.0f64; num_data * num_class];
                let reader = BufReader::new(std::fs::File::open(&path)?);
                let mut row = 0usize;
                for line in reader.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    if row >= num_data {
                        return Err(BoostError::dataset(format!(
                            "{} has more rows than the dataset ({})",
                            path, num_data
                        )));
                    }
                    let values: Vec<f64> = line
                        .split_whitespace()
                        .map(crate::core::utils::common::parse_f64)
                        .collect::<Result<_>>()?;
                    if values.len() != num_class {
                        return Err(BoostError::dataset(format!(
                            "{} row {} has {} values, expected {}",
                            path,
                            row,
                            values.len(),
                            num_class
                        )));
                    }
                    for (c, &v) in values.iter().enumerate() {
                        scores[c * num_data + row] = v;
                    }
                    row += 1;
                }
                if row != num_data {
                    return Err(BoostError::dataset(format!(
                        "{} has {} rows, expected {}",
                        path, row, num_data
                    )));
                }
                dataset.metadata_mut().set_init_score(scores)?;
                return Ok(());
            }
        }
        // continued training seeds init scores from the input model
        if let (Some(predict_fun), Some(filename)) = (self.predict_fun, filename) {
            let (_, format, setup) = self.inspect_file(filename)?;
            let mut scores = vec![0.0f64; num_data * num_class];
            let mut loader_rows = 0usize;
            self.for_each_batch(filename, &format, &setup, |start, batch| {
                let outputs: Vec<Vec<f64>> = batch
                    .par_iter()
                    .map(|line| predict_fun(&line.features))
                    .collect();
                for (i, out) in outputs.into_iter().enumerate() {
                    for (c, &v) in out.iter().enumerate().take(num_class) {
                        scores[c * num_data + start + i] = v;
                    }
                }
                loader_rows = start + batch.len();
                Ok(())
            })?;
            if loader_rows == num_data {
                dataset.metadata_mut().set_init_score(scores)?;
            }
        }
        Ok(())
    }
}

fn feature_default_names(num_total_features: i32) -> Vec<String> {
    (0..num_total_features).map(|i| format!("Column_{}", i)).collect()
}

/// `index`, `name:<column>` or empty (`default`).
fn resolve_column(spec: &str, header: Option<&[String]>, default: i32) -> Result<i32> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(default);
    }
    if let Some(name) = spec.strip_prefix("name:") {
        let header = header.ok_or_else(|| {
            BoostError::config(format!(
                "column '{}' is given by name but the file has no header",
                spec
            ))
        })?;
        return header
            .iter()
            .position(|h| h == name)
            .map(|i| i as i32)
            .ok_or_else(|| BoostError::config(format!("column name '{}' not in header", name)));
    }
    spec.parse::<i32>()
        .map_err(|_| BoostError::config(format!("cannot parse column spec '{}'", spec)))
}

fn collect_metadata(
    batch: &[ParsedLine],
    start: usize,
    labels: &mut [Label],
    weights: &mut Vec<Label>,
    query_ids: &mut Vec<DataSize>,
) {
    for (i, line) in batch.iter().enumerate() {
        labels[start + i] = line.label as Label;
        if let Some(w) = line.weight {
            if weights.is_empty() && start + i > 0 {
                weights.resize(start + i, 1.0);
            }
            weights.push(w as Label);
        }
        if let Some(q) = line.query_id {
            query_ids.push(q);
        }
    }
}

/// Scatters a row batch into per-feature buffers, then bins and pushes
/// the columns in parallel.
fn push_batch(
    features: &mut [Feature],
    _batch_start: DataSize,
    batch: &[ParsedLine],
    num_total_features: i32,
) -> Result<()> {
    let mut map = vec![-1i32; num_total_features as usize];
    for (inner, f) in features.iter().enumerate() {
        map[f.feature_index() as usize] = inner as i32;
    }
    let mut columns: Vec<Vec<(DataSize, f64)>> = vec![Vec::new(); features.len()];
    for (i, line) in batch.iter().enumerate() {
        let row = _batch_start + i as DataSize;
        for &(f, v) in &line.features {
            if f < 0 || f >= num_total_features {
                return Err(BoostError::dataset(format!(
                    "feature index {} out of declared range {} at row {}",
                    f, num_total_features, row
                )));
            }
            let inner = map[f as usize];
            if inner >= 0 {
                columns[inner as usize].push((row, v));
            }
        }
    }
    features
        .par_iter_mut()
        .zip(columns.par_iter())
        .for_each(|(feature, column)| {
            for &(row, v) in column {
                feature.push(row, v);
            }
        });
    Ok(())
}

/// Reads a one-value-per-line auxiliary file if it exists.
fn load_values_file(path: &str) -> Result<Option<Vec<f64>>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        out.push(crate::core::utils::common::parse_f64(t)?);
    }
    Ok(Some(out))
}
