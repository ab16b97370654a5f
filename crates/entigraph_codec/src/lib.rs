//! # EntiGraph Codec
//!
//! Dynamic field values and their exchange formats for EntiGraph.
//!
//! This crate provides:
//! - [`Value`], the totally ordered dynamic value stored in entity fields
//! - JSON conversion through `serde_json`
//! - CBOR conversion through `ciborium`
//!
//! ## Usage
//!
//! ```
//! use entigraph_codec::{from_cbor, to_cbor, Value};
//!
//! let value = Value::object([("name", Value::from("Alice"))]);
//! let bytes = to_cbor(&value).unwrap();
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, from_json, from_json_str};
pub use encoder::{to_cbor, to_json, to_json_string};
pub use error::{CodecError, CodecResult};
pub use value::Value;
