//! Core types for juntdb
//!
//! This crate defines the foundational types used throughout the system:
//! - Value / SemanticKind: the closed set of field values and their kinds
//! - Tensor: n-dimensional arrays and their binary blob format
//! - codec: safe text encoding for list and mapping values
//! - Identity / IdentityGenerator: 17-digit timestamp row keys
//! - Record: the field map callers hand to the store
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod identity;
pub mod record;
pub mod tensor;
pub mod value;

pub use codec::TextCodecError;
pub use error::{Error, Result};
pub use identity::{Clock, FixedClock, Identity, IdentityGenerator, SystemClock, IDENTITY_WIDTH};
pub use record::{Record, IDENTITY_FIELD};
pub use tensor::{ElementType, Tensor, TensorData, TensorError};
pub use value::{CallableRef, SemanticKind, Value};
