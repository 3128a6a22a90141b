mod config;
mod error;
mod http;
mod request;

pub use config::{KalaConfig, ReadConfig, WriteConfig, WriteMode};
pub use error::HandlerError;
pub use http::KalaHttp;
pub use request::{AggregateRequest, ListRequest, QueryParams};
