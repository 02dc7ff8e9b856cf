//! DDS handling for skin texture packing.
//!
//! Skins usually ship each texture several times, one file per resolution.
//! This crate reads and writes DDS headers, normalizes them into the handful of
//! formats the asset packer accepts, and merges the per-resolution files into a
//! single DDS with a complete mip chain:
//!
//! - [`Header`] - DDS header codec and format normalization
//! - [`MipmapManager`] - Collects mip levels from sibling files and writes the result
//! - [`TexConv`] - Fills missing levels by running the texconv tool
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use skinpack_dds::{MipmapManager, ScratchDir, TexConv};
//!
//! let mut manager: MipmapManager = MipmapManager::default();
//! for path in ["4k/body.dds", "2k/body.dds"] {
//!     let outcome = manager.load_image(&mut BufReader::new(File::open(path)?))?;
//!     if let Some(warning) = outcome.warning() {
//!         eprintln!("{path}: {warning}");
//!     }
//! }
//!
//! manager.convert()?;
//! if manager.has_missing_mips() {
//!     let scratch = ScratchDir::prepare(std::env::temp_dir().join("skinpack"))?;
//!     manager.generate_missing_mips(&TexConv::new("texconv.exe"), &scratch)?;
//!     manager.convert()?;
//! }
//! manager.save(&mut File::create("body.dds")?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub mod format;
mod header;
mod log;
mod mipmap;
mod texconv;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
pub use format::{block_size, AlphaMode, DxgiFormat, FourCC, ResourceDimension};
pub use header::{DdsHeader, DdsHeaderDxt10, DdsPixelFormat, Header};
pub use log::{DebugLog, TracingLog};
pub use mipmap::{DimensionError, LoadOutcome, MipmapManager, SiblingMismatch};
pub use texconv::{MipTool, ScratchDir, TexConv, ToolFormat};

/// DDS file magic bytes ("DDS ").
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
