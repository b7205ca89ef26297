#[cfg(any(test, feature = "test_utilities"))]
pub mod test_helpers;

mod coordinator;
mod deleter;
mod dependency;
mod error;
mod executor;
mod filter;
mod models;
mod parallel_runner;
mod postgres_client_wrapper;
mod quoting;
mod schema_reader;
mod statement;
mod status;

pub use coordinator::*;
pub use dependency::*;
pub use error::*;
pub use executor::*;
pub use filter::*;
pub use models::*;
pub use postgres_client_wrapper::{FromRow, PostgresClientWrapper};
pub use quoting::IdentifierQuoter;
pub use schema_reader::SchemaReader;
pub use statement::*;
pub use status::*;
