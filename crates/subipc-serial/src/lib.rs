//! Message values and serialization profiles.
//!
//! A [`Value`] is what applications exchange over a channel. Before a value
//! reaches the transport it is checked against the channel's [`Profile`]:
//!
//! - [`Profile::Advanced`] keeps shared and cyclic arrays/objects, dates,
//!   byte buffers and non-finite numbers, but rejects values that cannot
//!   cross a process boundary (functions, symbols, promises, ...).
//! - [`Profile::Json`] applies each object's [`ToJson`] hook and then
//!   requires the result to fit JSON's value model, without cycles.
//!
//! Validation runs ahead of any write, so a rejected value never leaves a
//! partial frame on the wire.

mod advanced;
pub mod error;
mod json;
mod path;
pub mod profile;
pub mod validate;
pub mod value;

pub use error::{Result, SerialError};
pub use json::{from_json, to_json};
pub use profile::Profile;
pub use validate::validate;
pub use value::{Array, ArrayRef, Object, ObjectRef, ToJson, Value};
