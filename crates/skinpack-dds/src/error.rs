//! Error types for DDS handling.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::format::FourCC;

/// Errors that can occur when working with DDS files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] skinpack_common::Error),

    /// Invalid DDS magic.
    #[error("invalid DDS magic: expected 'DDS ', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Pixel format outside the supported set.
    #[error("DDS fourCC not supported: {0}")]
    UnsupportedFormat(FourCC),

    /// DX10 header naming a DXGI format this crate has no name for.
    #[error("unknown DXGI format: {0}")]
    UnknownDxgiFormat(u32),

    /// No image has been loaded into the mipmap manager.
    #[error("no images loaded")]
    Empty,

    /// The mip generation tool could not be started.
    #[error("failed to start mip generation tool {path}: {source}")]
    ToolSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mip generation tool exited unsuccessfully.
    #[error("mip generation tool failed: {0}")]
    ToolFailed(ExitStatus),

    /// The mip generation tool finished without writing its output file.
    #[error("mip generation tool did not produce {0}")]
    MissingToolOutput(PathBuf),

    /// The mip generation tool's output did not merge into the texture.
    #[error("mip generation output was not merged: {0}")]
    ToolOutputRejected(String),
}

/// Result type for DDS operations.
pub type Result<T> = std::result::Result<T, Error>;
