//! Data input: batching labelled entries into train/test/control splits
//!
//! - [`input`] - the [`DataInput`] aggregator and its load options
//! - [`split`] - split storage and the seeded partitioning

pub mod input;
pub mod split;

pub use input::{BatchSummary, DataInput, LoadOptions, SplitOptions};
pub use split::{partition_indices, DataSplit, RowValues, SplitKind, SPLIT_SEED};
