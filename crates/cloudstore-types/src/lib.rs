//! Foundation types for cloudstore.
//!
//! This crate holds the pure-data vocabulary shared by every other cloudstore
//! crate. Nothing here performs I/O.
//!
//! # Key Types
//!
//! - [`Query`] — Prefix/delimiter/limit descriptor consumed by store listings
//! - [`MetaData`] — String-to-string mapping attached to an object
//! - [`ObjectInfo`] — What a backend knows about a remote object
//! - [`validate_object_name`] — Rules every object name must satisfy

pub mod error;
pub mod info;
pub mod metadata;
pub mod names;
pub mod query;

pub use error::{TypeError, TypeResult};
pub use info::ObjectInfo;
pub use metadata::MetaData;
pub use names::validate_object_name;
pub use query::Query;
