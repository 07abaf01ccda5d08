pub mod accessors;
pub mod models;
pub mod native_types;
pub mod snapshot;
