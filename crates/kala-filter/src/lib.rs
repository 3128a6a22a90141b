//! Field-level access filtering for document queries and writes.
//!
//! Reads are pruned against a whitelist of field names (filter, projection,
//! sort and aggregation pipelines). Writes are either pruned against a
//! whitelist or checked against a policy query by staging the candidate
//! document in a side collection.

mod aggregate;
mod coerce;
mod error;
mod probe;
mod read;
mod shape;
mod sort;
mod whitelist;
mod write;

pub use aggregate::{DEFAULT_LIMIT, append_limit, filter_aggregate, strip_write_out};
pub use coerce::{Coercion, UuidRepresentation, coerce, coerce_document};
pub use error::FilterError;
pub use probe::StagingProbe;
pub use read::{ReadFilter, filter_read};
pub use shape::Shape;
pub use sort::parse_sort;
pub use whitelist::Whitelist;
pub use write::filter_write;
