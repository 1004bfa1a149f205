pub mod items_loader;

pub use items_loader::load_items;
