// Build pipeline: split, merge, index
pub mod external_sort;

// Index catalog and offset-addressed lookups
pub mod index;

pub mod constants;
pub mod error;
pub mod server;
pub mod utils;

// Re-export main types for convenience
pub use error::{Result, SkudexError};
pub use external_sort::{build_sorted_index, BuildConfig, BuildPipeline, BuildStats, Record};
pub use index::{load_index, lookup, IndexCatalog, IndexEntry, IndexLayout, RangeLookup};
