//! matcher-core
//!
//! Shared domain types, the error taxonomy, layered settings and the two seam
//! traits (`CorpusSource`, `CacheStore`) the engine crates are written against.
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod request;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use request::{SearchRequest, SearchRequestInput};
pub use types::{first_per_id, GeoFilter, Language, Strategy, WorkerDocument, WorkerId};
