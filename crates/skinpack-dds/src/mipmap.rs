//! Mipmap merging for one logical texture.
//!
//! Skins often ship the same texture several times at different resolutions,
//! one file per resolution folder. [`MipmapManager`] collects the levels from
//! all of those files, works out which levels of the chain are still missing,
//! can have an external tool fill the gaps, and writes a single DDS with the
//! whole chain, largest level first.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use skinpack_common::ReadExt;
use thiserror::Error;
use uuid::Uuid;

use crate::format::{DxgiFormat, FourCC};
use crate::header::{DdsHeader, Header};
use crate::log::{DebugLog, TracingLog};
use crate::texconv::{MipTool, ScratchDir, ToolFormat};
use crate::{Error, Result};

/// Why a sibling image was left out of the merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiblingMismatch {
    /// The image uses a different fourCC than the images already loaded.
    #[error("fourCC ({actual}) for added image does not match existing images ({expected})")]
    FourCC { expected: FourCC, actual: FourCC },

    /// Both images are DX10 but with different DXGI formats.
    #[error("DXGI format for added image ({actual}) does not match existing images ({expected})")]
    DxgiFormat {
        expected: DxgiFormat,
        actual: DxgiFormat,
    },
}

impl SiblingMismatch {
    fn between(current: &Header, added: &Header) -> Option<Self> {
        if current.four_cc() != added.four_cc() {
            return Some(Self::FourCC {
                expected: current.four_cc(),
                actual: added.four_cc(),
            });
        }
        match (current.dxgi_format(), added.dxgi_format()) {
            (Some(expected), Some(actual)) if expected != actual => {
                Some(Self::DxgiFormat { expected, actual })
            }
            _ => None,
        }
    }
}

/// Dimensions the asset packer cannot use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("Invalid image aspect ratio {width}x{height}, valid aspect ratios: 1:1, 1:2, 2:1")]
    AspectRatio { width: u32, height: u32 },

    #[error("Invalid image dimensions {width}x{height}, dimensions must be powers of 2")]
    NotPowerOfTwo { width: u32, height: u32 },
}

impl DimensionError {
    /// Check that an image is 1:1, 1:2 or 2:1 with power-of-two sides.
    pub fn check(width: u32, height: u32) -> Option<Self> {
        let (w, h) = (u64::from(width), u64::from(height));
        if !(w == h || w == 2 * h || h == 2 * w) {
            return Some(Self::AspectRatio { width, height });
        }
        if !width.is_power_of_two() || !height.is_power_of_two() {
            return Some(Self::NotPowerOfTwo { width, height });
        }
        None
    }
}

/// What happened to an image passed to [`MipmapManager::load_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The image was merged; `levels` new mip levels were stored.
    Loaded { levels: usize },
    /// The image belongs to a different texture and was dropped.
    Rejected(SiblingMismatch),
    /// The image has unusable dimensions and was dropped.
    InvalidDimensions(DimensionError),
}

impl LoadOutcome {
    /// A description of the problem, if the image was not merged.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Loaded { .. } => None,
            Self::Rejected(mismatch) => Some(mismatch.to_string()),
            Self::InvalidDimensions(error) => Some(error.to_string()),
        }
    }
}

/// Holds every known mip level of one texture.
///
/// Levels are keyed by pixel count (width × height), so the same level coming
/// from two different files lands on the same key. The first file to provide a
/// level wins; load the highest quality source first.
pub struct MipmapManager<L = TracingLog> {
    mipmaps: BTreeMap<u64, Vec<u8>>,
    header: Option<Header>,
    log: L,
}

impl Default for MipmapManager<TracingLog> {
    fn default() -> Self {
        Self::new(TracingLog)
    }
}

impl<L: DebugLog> MipmapManager<L> {
    /// Create an empty manager reporting diagnostics to `log`.
    pub fn new(log: L) -> Self {
        Self {
            mipmaps: BTreeMap::new(),
            header: None,
            log,
        }
    }

    /// Number of distinct mip levels held.
    pub fn mip_count(&self) -> usize {
        self.mipmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mipmaps.is_empty()
    }

    /// The header of the highest-resolution image accepted so far.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Pixel counts of the stored levels, ascending.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = u64> + '_ {
        self.mipmaps.keys().copied()
    }

    /// Raw bytes of the level with the given pixel count.
    pub fn mip(&self, pixel_count: u64) -> Option<&[u8]> {
        self.mipmaps.get(&pixel_count).map(Vec::as_slice)
    }

    /// Load one DDS image and merge its levels.
    ///
    /// Structural problems are errors. An image that does not belong with the
    /// ones already loaded, or has unusable dimensions, is dropped and reported
    /// through the returned [`LoadOutcome`].
    pub fn load_image<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<LoadOutcome> {
        let header = Header::decode(reader)?;

        if let Some(mismatch) = self
            .header
            .as_ref()
            .and_then(|current| SiblingMismatch::between(current, &header))
        {
            self.log.debug(&mismatch.to_string());
            return Ok(LoadOutcome::Rejected(mismatch));
        }

        if let Some(error) = DimensionError::check(header.width(), header.height()) {
            self.log.debug(&error.to_string());
            return Ok(LoadOutcome::InvalidDimensions(error));
        }

        let levels = self.read_levels(&header, reader)?;

        let adopt = levels > 0
            && self
                .header
                .as_ref()
                .map_or(true, |current| header.pixel_count() >= current.pixel_count());
        if adopt {
            self.header = Some(header);
        }

        Ok(LoadOutcome::Loaded { levels })
    }

    fn read_levels<R: Read + ?Sized>(&mut self, header: &Header, reader: &mut R) -> Result<usize> {
        let pitch = header.pitch_or_linear_size() as usize;
        // Every level holds at least one compressed block.
        let floor = header.block_size();
        let mut stored = 0;

        for level in 0..header.mipmap_count().max(1) {
            let width = header.width().checked_shr(level).unwrap_or(0).max(1);
            let height = header.height().checked_shr(level).unwrap_or(0).max(1);
            let key = u64::from(width) * u64::from(height);

            let data = if pitch == 0 {
                self.log.debug(
                    "DDS file did not have pitchOrLinearSize set, assuming the DDS file has no mipmaps",
                );
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                if data.is_empty() {
                    self.log.debug("DDS file has no image data");
                    break;
                }
                data
            } else {
                let size = pitch.checked_shr(level.saturating_mul(2)).unwrap_or(0).max(floor);
                let data = reader.read_up_to(size)?;
                if data.is_empty() {
                    self.log.debug(&format!("Stream ended before mip level {level}"));
                    break;
                }
                if data.len() < size {
                    self.log.debug(&format!(
                        "Mip level {level} is truncated: expected {size} bytes, got {}",
                        data.len()
                    ));
                }
                data
            };

            if self.mipmaps.contains_key(&key) {
                self.log
                    .debug(&format!("Already have mip level {width}x{height}, skipping"));
            } else {
                self.log
                    .debug(&format!("Found mip level:\n Width: {width} Height: {height}"));
                self.mipmaps.insert(key, data);
                stored += 1;
            }

            if pitch == 0 {
                break;
            }
        }

        Ok(stored)
    }

    /// Whether any level of the full chain is missing.
    pub fn has_missing_mips(&self) -> bool {
        !self.missing_mips().is_empty()
    }

    /// Pixel counts of the levels missing from the full chain, largest first.
    ///
    /// Square textures end at 1×1. 2:1 and 1:2 textures end at 2×1 and then
    /// carry one more 1×1 level.
    pub fn missing_mips(&self) -> Vec<u64> {
        let Some(top) = self.mipmaps.keys().next_back().copied() else {
            return Vec::new();
        };

        let square = is_perfect_square(top);
        let terminal = if square { 1 } else { 2 };

        let mut missing = Vec::new();
        let mut key = top;
        while key > terminal {
            key /= 4;
            if key == 0 {
                break;
            }
            if !self.mipmaps.contains_key(&key) {
                missing.push(key);
            }
        }

        if !square && !self.mipmaps.contains_key(&1) {
            missing.push(1);
        }

        missing
    }

    /// The format argument the mip tool needs for this texture.
    pub fn tool_format(&self) -> Result<ToolFormat> {
        ToolFormat::for_header(self.header.as_ref().ok_or(Error::Empty)?)
    }

    /// Fill the gaps in the chain with an external tool.
    ///
    /// Writes the largest level alone to `scratch`, has `tool` build a full
    /// chain from it and loads the result back in. Call [`convert`] first so
    /// the tool's output carries the same format tag as the loaded images.
    ///
    /// [`convert`]: MipmapManager::convert
    pub fn generate_missing_mips<T: MipTool + ?Sized>(
        &mut self,
        tool: &T,
        scratch: &ScratchDir,
    ) -> Result<()> {
        if !self.has_missing_mips() {
            return Ok(());
        }

        let format = self.tool_format()?;
        let input = scratch.before().join(format!("{}.dds", Uuid::new_v4()));
        {
            let mut writer = BufWriter::new(File::create(&input)?);
            self.save_no_mipmaps(&mut writer)?;
            writer.flush()?;
        }

        self.log.debug("Starting texconv");
        let output = tool.generate(&format, &input, scratch.after(), &self.log)?;

        self.log.debug("Loading file generated by texconv");
        let mut reader = BufReader::new(File::open(&output)?);
        match self.load_image(&mut reader)? {
            LoadOutcome::Loaded { .. } => Ok(()),
            outcome => Err(Error::ToolOutputRejected(
                outcome.warning().unwrap_or_default(),
            )),
        }
    }

    /// Normalize the representative header's format.
    ///
    /// Only the header changes; the stored levels are left alone.
    pub fn convert(&mut self) -> Result<()> {
        let header = self.header.as_ref().ok_or(Error::Empty)?;
        let payload_len = self.mipmaps.values().next_back().map_or(0, Vec::len);
        let normalized = header.normalized(payload_len, &self.log)?;
        self.header = Some(normalized);
        Ok(())
    }

    /// Write the merged texture: header, then every level, largest first.
    pub fn save<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let header = self.finalized_header(self.mipmaps.len())?;
        header.encode(writer)?;
        for data in self.mipmaps.values().rev() {
            writer.write_all(data)?;
        }
        Ok(())
    }

    /// Write only the largest level, as input for the mip tool.
    pub fn save_no_mipmaps<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let header = self.finalized_header(1)?;
        header.encode(writer)?;
        let largest = self.mipmaps.values().next_back().ok_or(Error::Empty)?;
        writer.write_all(largest)?;
        Ok(())
    }

    fn finalized_header(&self, mip_count: usize) -> Result<Header> {
        let header = self.header.as_ref().ok_or(Error::Empty)?;
        let largest = self.mipmaps.values().next_back().ok_or(Error::Empty)?;

        let header = header
            .with_pitch_or_linear_size(largest.len() as u32)
            .with_mipmap_count(mip_count as u32);
        if mip_count > 1 {
            return Ok(header
                .with_flags(header.flags() | DdsHeader::FLAG_MIPMAPCOUNT)
                .with_caps(header.caps() | DdsHeader::CAPS_MIPMAP | DdsHeader::CAPS_COMPLEX));
        }
        Ok(header)
    }
}

fn is_perfect_square(n: u64) -> bool {
    let root = (n as f64).sqrt() as u64;
    (root.saturating_sub(1)..=root + 1).any(|r| r.checked_mul(r) == Some(n))
}
