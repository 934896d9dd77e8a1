//! Storage layer: binned feature columns, leaf-ordered views and the
//! decision tree node table.

pub mod bin;
pub mod dense_bin;
pub mod ordered_bin;
pub mod sparse_bin;
pub mod tree;
