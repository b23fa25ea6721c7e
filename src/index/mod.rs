pub mod builder;
pub mod catalog;
pub mod constants;
pub mod layout;
pub mod lookup;

pub use builder::{IndexBuilder, IndexEntry};
pub use catalog::{load_index, IndexCatalog};
pub use layout::IndexLayout;
pub use lookup::{lookup, RangeLookup};
