//! Request and response bodies of the public API.

pub mod nl_query;

pub use nl_query::{JsonRow, NlQueryRequest, NlQueryResponse};
