//! 基础设施层：持有落盘资源，只暴露能力

pub mod atomic_file;
pub mod checkpoint_store;
pub mod output_store;

pub use checkpoint_store::{CheckpointMap, CheckpointStore};
pub use output_store::{load_prior_output, write_output, OutputRow};
