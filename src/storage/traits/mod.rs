//! Storage backend traits.

mod datastore;

pub use datastore::{GraphDatastore, Params, Record, params};
