//! Shared data model and error taxonomy for the iris fetch/extraction service.
//!
//! Every other crate in the workspace depends on this one; it carries no
//! dependency back toward them.

pub mod error;
pub mod fingerprint;
pub mod model;

pub use error::{ErrorInfo, ErrorKind, IrisError, IrisResult};
pub use model::{
    ExtractFlags, FetchRequest, FetchResult, Link, Metadata, StructuredData, WaitStrategy,
};
