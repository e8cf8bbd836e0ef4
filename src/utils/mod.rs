//! Utility functions and types

pub mod data_loader;

pub use data_loader::{column_names, f64_column, i32_column, DataLoader, DataSaver};
