//! DDS header structures and the header codec.
//!
//! [`DdsHeader`], [`DdsPixelFormat`] and [`DdsHeaderDxt10`] mirror the on-disk
//! layout byte for byte. [`Header`] wraps them as an immutable value that keeps
//! the DX10 extension and the `DX10` fourCC in lockstep: every transformation
//! returns a new `Header` instead of editing fields in place.

use std::io::{Read, Write};

use skinpack_common::{BinaryReader, ReadExt, WriteExt};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::format::{block_size, AlphaMode, DxgiFormat, FourCC, ResourceDimension};
use crate::log::DebugLog;
use crate::{Error, Result, DDS_MAGIC};

/// DDS file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DdsHeader {
    /// Header size (should be 124).
    pub size: u32,
    /// Header flags.
    pub flags: u32,
    /// Image height.
    pub height: u32,
    /// Image width.
    pub width: u32,
    /// Pitch or linear size.
    pub pitch_or_linear_size: u32,
    /// Depth (for volume textures).
    pub depth: u32,
    /// Number of mipmap levels.
    pub mipmap_count: u32,
    /// Reserved.
    pub reserved1: [u32; 11],
    /// Pixel format.
    pub pixel_format: DdsPixelFormat,
    /// Surface capabilities.
    pub caps: u32,
    /// Surface capabilities 2.
    pub caps2: u32,
    /// Surface capabilities 3.
    pub caps3: u32,
    /// Surface capabilities 4.
    pub caps4: u32,
    /// Reserved.
    pub reserved2: u32,
}

impl DdsHeader {
    /// Expected header size.
    pub const SIZE: u32 = 124;

    pub const FLAG_CAPS: u32 = 0x1;
    pub const FLAG_HEIGHT: u32 = 0x2;
    pub const FLAG_WIDTH: u32 = 0x4;
    pub const FLAG_PIXELFORMAT: u32 = 0x1000;
    /// `DDSD_MIPMAPCOUNT`: the mip count field is valid.
    pub const FLAG_MIPMAPCOUNT: u32 = 0x20000;
    /// `DDSD_LINEARSIZE`: the pitch field holds a compressed linear size.
    pub const FLAG_LINEARSIZE: u32 = 0x80000;

    /// `DDSCAPS_COMPLEX`.
    pub const CAPS_COMPLEX: u32 = 0x8;
    /// `DDSCAPS_TEXTURE`.
    pub const CAPS_TEXTURE: u32 = 0x1000;
    /// `DDSCAPS_MIPMAP`.
    pub const CAPS_MIPMAP: u32 = 0x400000;

    /// Check if this is a DX10 extended header.
    pub fn is_dx10(&self) -> bool {
        self.pixel_format.four_cc == FourCC::DX10
    }
}

/// DDS pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DdsPixelFormat {
    /// Structure size (should be 32).
    pub size: u32,
    /// Pixel format flags.
    pub flags: u32,
    /// Four-character code for compression.
    pub four_cc: FourCC,
    /// Number of bits per pixel (for uncompressed).
    pub rgb_bit_count: u32,
    /// Red bit mask.
    pub r_bit_mask: u32,
    /// Green bit mask.
    pub g_bit_mask: u32,
    /// Blue bit mask.
    pub b_bit_mask: u32,
    /// Alpha bit mask.
    pub a_bit_mask: u32,
}

impl DdsPixelFormat {
    /// Expected structure size.
    pub const SIZE: u32 = 32;
    /// `DDPF_FOURCC`: the fourCC field is valid.
    pub const FLAG_FOURCC: u32 = 0x4;
}

/// DX10 extended header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DdsHeaderDxt10 {
    /// DXGI format.
    pub dxgi_format: DxgiFormat,
    /// Resource dimension.
    pub resource_dimension: ResourceDimension,
    /// Misc flags.
    pub misc_flag: u32,
    /// Array size.
    pub array_size: u32,
    /// Alpha mode.
    pub alpha_mode: AlphaMode,
}

impl DdsHeaderDxt10 {
    /// A single 2D texture of the given format.
    pub const fn texture_2d(dxgi_format: DxgiFormat) -> Self {
        Self {
            dxgi_format,
            resource_dimension: ResourceDimension::TEXTURE2D,
            misc_flag: 0,
            array_size: 1,
            alpha_mode: AlphaMode::UNKNOWN,
        }
    }
}

/// A decoded DDS header, with its DX10 extension when the fourCC asks for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    base: DdsHeader,
    dx10: Option<DdsHeaderDxt10>,
}

impl Header {
    /// Build a header for a single-level, fourCC-compressed 2D texture.
    ///
    /// Passing [`FourCC::DX10`] attaches an extension with an unknown DXGI
    /// format; use [`Header::new_dx10`] to name one.
    pub fn new(width: u32, height: u32, four_cc: FourCC) -> Self {
        let base = DdsHeader {
            size: DdsHeader::SIZE,
            flags: DdsHeader::FLAG_CAPS
                | DdsHeader::FLAG_HEIGHT
                | DdsHeader::FLAG_WIDTH
                | DdsHeader::FLAG_PIXELFORMAT,
            height,
            width,
            pitch_or_linear_size: 0,
            depth: 0,
            mipmap_count: 0,
            reserved1: [0; 11],
            pixel_format: DdsPixelFormat {
                size: DdsPixelFormat::SIZE,
                flags: DdsPixelFormat::FLAG_FOURCC,
                four_cc,
                rgb_bit_count: 0,
                r_bit_mask: 0,
                g_bit_mask: 0,
                b_bit_mask: 0,
                a_bit_mask: 0,
            },
            caps: DdsHeader::CAPS_TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        };
        let dx10 = (four_cc == FourCC::DX10).then(|| DdsHeaderDxt10::texture_2d(DxgiFormat::UNKNOWN));
        Self { base, dx10 }
    }

    /// Build a header for a single-level DX10 texture.
    pub fn new_dx10(width: u32, height: u32, dxgi_format: DxgiFormat) -> Self {
        Self::new(width, height, FourCC::DX10).retarget_to_extended(dxgi_format)
    }

    /// Decode a header from a stream.
    ///
    /// The stream is left positioned on the first payload byte.
    pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != DDS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let base: DdsHeader = reader.read_struct()?;
        let dx10 = if base.is_dx10() {
            Some(reader.read_struct()?)
        } else {
            None
        };

        Ok(Self { base, dx10 })
    }

    /// Parse a header from a complete file in memory.
    ///
    /// Returns the header and the payload that follows it.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.read_bytes(4)?;
        if magic != DDS_MAGIC {
            let mut actual = [0u8; 4];
            actual.copy_from_slice(magic);
            return Err(Error::InvalidMagic(actual));
        }

        let base: DdsHeader = reader.read_struct()?;
        let dx10 = if base.is_dx10() {
            Some(reader.read_struct()?)
        } else {
            None
        };

        Ok((Self { base, dx10 }, reader.remaining_bytes()))
    }

    /// Encode the header, extension included when present.
    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(DDS_MAGIC)?;
        writer.write_struct(&self.base)?;
        if let Some(dx10) = &self.dx10 {
            writer.write_struct(dx10)?;
        }
        Ok(())
    }

    /// Encoded size in bytes, magic included.
    pub fn encoded_len(&self) -> usize {
        let dx10 = if self.dx10.is_some() {
            std::mem::size_of::<DdsHeaderDxt10>()
        } else {
            0
        };
        DDS_MAGIC.len() + std::mem::size_of::<DdsHeader>() + dx10
    }

    /// The fixed-layout part of the header.
    pub fn raw(&self) -> &DdsHeader {
        &self.base
    }

    /// The DX10 extension, present iff the fourCC is `DX10`.
    pub fn dx10(&self) -> Option<&DdsHeaderDxt10> {
        self.dx10.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.base.width
    }

    pub fn height(&self) -> u32 {
        self.base.height
    }

    /// Width times height of the top level.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.base.width) * u64::from(self.base.height)
    }

    pub fn flags(&self) -> u32 {
        self.base.flags
    }

    pub fn caps(&self) -> u32 {
        self.base.caps
    }

    pub fn pitch_or_linear_size(&self) -> u32 {
        self.base.pitch_or_linear_size
    }

    pub fn mipmap_count(&self) -> u32 {
        self.base.mipmap_count
    }

    pub fn four_cc(&self) -> FourCC {
        self.base.pixel_format.four_cc
    }

    pub fn is_dx10(&self) -> bool {
        self.dx10.is_some()
    }

    /// The DXGI format, for DX10 headers.
    pub fn dxgi_format(&self) -> Option<DxgiFormat> {
        self.dx10.map(|dx10| dx10.dxgi_format)
    }

    /// Bytes per compressed 4x4 block.
    pub fn block_size(&self) -> usize {
        block_size(self.four_cc(), self.dxgi_format())
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.base.flags = flags;
        self
    }

    pub fn with_caps(mut self, caps: u32) -> Self {
        self.base.caps = caps;
        self
    }

    pub fn with_pitch_or_linear_size(mut self, pitch_or_linear_size: u32) -> Self {
        self.base.pitch_or_linear_size = pitch_or_linear_size;
        self
    }

    pub fn with_mipmap_count(mut self, mipmap_count: u32) -> Self {
        self.base.mipmap_count = mipmap_count;
        self
    }

    /// Switch to the DX10 representation with the given format.
    ///
    /// This is the only way to reach the extended form; there is no way back.
    pub fn retarget_to_extended(mut self, dxgi_format: DxgiFormat) -> Self {
        self.base.pixel_format.four_cc = FourCC::DX10;
        self.dx10 = Some(DdsHeaderDxt10::texture_2d(dxgi_format));
        self
    }

    /// Rename a legacy tag. Never used to enter or leave the DX10 form.
    fn renamed(mut self, four_cc: FourCC) -> Self {
        debug_assert!(four_cc != FourCC::DX10 && !self.is_dx10());
        self.base.pixel_format.four_cc = four_cc;
        self
    }

    /// Normalize a source header into the shape the asset packer accepts.
    ///
    /// `payload_len` is the number of payload bytes that followed the header;
    /// it repairs a zero pitch. Only a closed set of formats is supported.
    pub fn normalized<L: DebugLog + ?Sized>(&self, payload_len: usize, log: &L) -> Result<Self> {
        let mut header = *self;

        if header.pitch_or_linear_size() == 0 {
            log.debug(&format!(
                "DDS file did not have pitchOrLinearSize set, setting to {payload_len}"
            ));
            header = header.with_pitch_or_linear_size(payload_len as u32);
        }

        const LINEAR_FLAGS: u32 = DdsHeader::FLAG_MIPMAPCOUNT | DdsHeader::FLAG_LINEARSIZE;

        match header.four_cc() {
            FourCC::DXT1 => Ok(header.retarget_to_extended(DxgiFormat::BC1_UNORM_SRGB)),
            FourCC::ATI2 | FourCC::BC5U => {
                if header.four_cc() == FourCC::ATI2 {
                    log.debug("DDS file is using ATI2, changing to BC5U");
                    header = header.renamed(FourCC::BC5U);
                }
                Ok(header.with_flags(header.flags() | LINEAR_FLAGS))
            }
            FourCC::BC4U => Ok(header
                .with_flags(header.flags() | LINEAR_FLAGS)
                .with_caps(header.caps() | DdsHeader::CAPS_MIPMAP | DdsHeader::CAPS_COMPLEX)),
            FourCC::DX10 => Ok(header),
            other => {
                log.debug(&format!("DDS file is using {other}, which is unsupported."));
                Err(Error::UnsupportedFormat(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dds_bytes, dds_dx10_bytes};

    fn quiet(_: &str) {}

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<DdsHeader>(), DdsHeader::SIZE as usize);
        assert_eq!(std::mem::size_of::<DdsPixelFormat>(), DdsPixelFormat::SIZE as usize);
        assert_eq!(std::mem::size_of::<DdsHeaderDxt10>(), 20);
    }

    #[test]
    fn test_decode_encode_is_identity() {
        let file = dds_bytes(*b"BC4U", 64, 32, 1024, 3, &[0xAB; 16]);
        let mut stream = &file[..];

        let header = Header::decode(&mut stream).unwrap();
        assert_eq!(stream, &[0xAB; 16]);

        let mut out = Vec::new();
        header.encode(&mut out).unwrap();
        assert_eq!(out, file[..128]);
        assert_eq!(header.encoded_len(), 128);
    }

    #[test]
    fn test_dx10_decode_encode_is_identity() {
        let file = dds_dx10_bytes(DxgiFormat::BC7_UNORM.0, 128, 128, 16384, 1, &[1, 2, 3]);
        let (header, payload) = Header::parse(&file).unwrap();

        assert!(header.is_dx10());
        assert_eq!(header.dxgi_format(), Some(DxgiFormat::BC7_UNORM));
        assert_eq!(payload, &[1, 2, 3]);

        let mut out = Vec::new();
        header.encode(&mut out).unwrap();
        assert_eq!(out, file[..148]);
    }

    #[test]
    fn test_extension_tracks_four_cc() {
        let legacy = Header::parse(&dds_bytes(*b"DXT1", 4, 4, 8, 1, &[])).unwrap().0;
        assert!(!legacy.is_dx10());
        assert!(legacy.dx10().is_none());
        assert_eq!(legacy.encoded_len(), 128);

        let extended = legacy.retarget_to_extended(DxgiFormat::BC1_UNORM);
        assert_eq!(extended.four_cc(), FourCC::DX10);
        assert!(extended.raw().is_dx10());
        assert_eq!(extended.encoded_len(), 148);

        assert!(Header::new(4, 4, FourCC::DX10).is_dx10());
        assert!(!Header::new(4, 4, FourCC::BC5U).is_dx10());
    }

    #[test]
    fn test_retarget_fields() {
        let header = Header::new(256, 256, FourCC::DXT1).retarget_to_extended(DxgiFormat::BC1_UNORM_SRGB);
        let dx10 = header.dx10().unwrap();

        assert_eq!(dx10.dxgi_format, DxgiFormat::BC1_UNORM_SRGB);
        assert_eq!(dx10.resource_dimension, ResourceDimension::TEXTURE2D);
        assert_eq!(dx10.alpha_mode, AlphaMode::UNKNOWN);
        assert_eq!(dx10.array_size, 1);
        assert_eq!(dx10.misc_flag, 0);
    }

    #[test]
    fn test_invalid_magic() {
        let mut file = dds_bytes(*b"DXT1", 4, 4, 8, 1, &[]);
        file[..4].copy_from_slice(b"PNG ");

        assert!(matches!(Header::decode(&mut &file[..]), Err(Error::InvalidMagic(m)) if &m == b"PNG "));
        assert!(matches!(Header::parse(&file), Err(Error::InvalidMagic(_))));
    }

    #[test]
    fn test_truncated_header_is_io_error() {
        let file = dds_bytes(*b"DXT1", 4, 4, 8, 1, &[]);
        assert!(matches!(Header::decode(&mut &file[..60]), Err(Error::Io(_))));
        assert!(matches!(Header::parse(&file[..60]), Err(Error::Common(_))));
    }

    #[test]
    fn test_normalize_ati2() {
        let header = Header::new(64, 64, FourCC::ATI2).with_pitch_or_linear_size(4096);
        let normalized = header.normalized(4096, &quiet).unwrap();

        assert_eq!(normalized.four_cc(), FourCC::BC5U);
        assert!(!normalized.is_dx10());
        assert_eq!(normalized.flags() & DdsHeader::FLAG_LINEARSIZE, DdsHeader::FLAG_LINEARSIZE);
        assert_eq!(normalized.flags() & DdsHeader::FLAG_MIPMAPCOUNT, DdsHeader::FLAG_MIPMAPCOUNT);
    }

    #[test]
    fn test_normalize_dxt1_retargets() {
        let header = Header::new(64, 64, FourCC::DXT1).with_pitch_or_linear_size(2048);
        let normalized = header.normalized(2048, &quiet).unwrap();

        assert_eq!(normalized.four_cc(), FourCC::DX10);
        assert_eq!(normalized.dxgi_format(), Some(DxgiFormat::BC1_UNORM_SRGB));
        assert_eq!(normalized.pitch_or_linear_size(), 2048);
    }

    #[test]
    fn test_normalize_bc4u_forces_linear_bits() {
        let header = Header::new(64, 64, FourCC::BC4U).with_pitch_or_linear_size(2048);
        let normalized = header.normalized(2048, &quiet).unwrap();

        assert_eq!(normalized.four_cc(), FourCC::BC4U);
        assert_ne!(normalized.flags() & DdsHeader::FLAG_LINEARSIZE, 0);
        assert_ne!(normalized.caps() & DdsHeader::CAPS_MIPMAP, 0);
        assert_ne!(normalized.caps() & DdsHeader::CAPS_COMPLEX, 0);

        let ati1 = Header::new(64, 64, FourCC::ATI1).normalized(2048, &quiet);
        assert!(matches!(ati1, Err(Error::UnsupportedFormat(FourCC::ATI1))));
    }

    #[test]
    fn test_normalize_dx10_passes_through() {
        let header = Header::new_dx10(64, 64, DxgiFormat::BC7_UNORM).with_pitch_or_linear_size(4096);
        assert_eq!(header.normalized(4096, &quiet).unwrap(), header);
    }

    #[test]
    fn test_normalize_rejects_unknown_tag() {
        let header = Header::new(64, 64, FourCC(*b"XYZW")).with_pitch_or_linear_size(16);
        let err = header.normalized(16, &quiet).unwrap_err();

        assert!(matches!(err, Error::UnsupportedFormat(tag) if tag == FourCC(*b"XYZW")));
        assert!(err.to_string().contains("XYZW"));
    }

    #[test]
    fn test_normalize_repairs_zero_pitch() {
        let header = Header::new(64, 64, FourCC::BC5U);
        assert_eq!(header.pitch_or_linear_size(), 0);

        let normalized = header.normalized(4096, &quiet).unwrap();
        assert_eq!(normalized.pitch_or_linear_size(), 4096);
        // The source value is untouched.
        assert_eq!(header.pitch_or_linear_size(), 0);
    }
}
