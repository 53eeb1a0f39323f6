pub mod durable_store;
pub mod selection_store;

pub use durable_store::{JsonFileStore, SharedDurableStore};
pub use selection_store::{reconcile_selection, SelectionFallback, SelectionStore};
