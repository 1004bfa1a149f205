pub mod batch;
pub mod item;
pub mod loaders;

pub use batch::{Batch, BatchPlan};
pub use item::{Item, ItemId, ScoreResult, Verdict};
pub use loaders::load_items;
