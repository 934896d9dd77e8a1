//! Numeric constants shared by the training pipeline.

/// Default maximum number of bins per feature.
pub const DEFAULT_MAX_BIN: i32 = 255;

/// Sparse rate above which a feature column is stored sparsely.
pub const K_SPARSE_THRESHOLD: f64 = 0.8;

/// Small epsilon for gain and probability comparisons.
pub const K_EPSILON: f64 = 1e-15;

/// Minimum score, used to initialise split gains.
pub const K_MIN_SCORE: f64 = f64::NEG_INFINITY;

/// Sigmoid outputs are clipped into [K_SIGMOID_EPS, 1 - K_SIGMOID_EPS]
/// before taking logs in the loss metrics.
pub const K_SIGMOID_EPS: f64 = 1e-15;

/// Minimum rows per thread block in parallel range loops.
pub const K_MIN_BLOCK_SIZE: i32 = 1024;

/// Minimum rows per thread chunk in the partition split.
pub const K_MIN_SPLIT_BLOCK_SIZE: i32 = 1000;

/// Number of rows sampled for bin boundary construction by default.
pub const DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT: i32 = 200_000;

/// Row batch size for streaming (two-round) data loading.
pub const K_LOAD_BATCH_SIZE: usize = 65_536;
