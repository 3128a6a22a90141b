mod error;
mod eval;
mod expression;
mod field;
mod order;
mod parse_filter;
mod pipeline;
mod projection;
mod store;

pub use bson::{Bson, Document};
pub use error::StoreError;
pub use store::{FindOptions, Sort, SortDirection, Store};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
