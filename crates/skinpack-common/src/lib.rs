//! Common utilities for skinpack.
//!
//! This crate provides the binary plumbing shared by the texture crates:
//!
//! - [`BinaryReader`] - Zero-copy reading from byte slices
//! - [`ReadExt`] / [`WriteExt`] - Fixed-layout structure I/O over streams

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::{BinaryReader, ReadExt, WriteExt};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
