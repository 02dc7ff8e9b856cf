//! Synthetic DDS files for tests, written field by field.

use byteorder::{LittleEndian, WriteBytesExt};

fn write_base(out: &mut Vec<u8>, four_cc: [u8; 4], width: u32, height: u32, pitch: u32, mip_count: u32) {
    out.extend_from_slice(b"DDS ");
    let fields = [124, 0x1007, height, width, pitch, 0, mip_count];
    for field in fields {
        out.write_u32::<LittleEndian>(field).unwrap();
    }
    for reserved in 0..11u32 {
        out.write_u32::<LittleEndian>(reserved * 3).unwrap();
    }
    out.write_u32::<LittleEndian>(32).unwrap();
    out.write_u32::<LittleEndian>(0x4).unwrap();
    out.extend_from_slice(&four_cc);
    for mask in [0u32, 0, 0, 0, 0] {
        out.write_u32::<LittleEndian>(mask).unwrap();
    }
    for caps in [0x1000u32, 0, 0, 0, 0] {
        out.write_u32::<LittleEndian>(caps).unwrap();
    }
}

/// A legacy (fourCC) DDS file followed by `payload`.
pub fn dds_bytes(
    four_cc: [u8; 4],
    width: u32,
    height: u32,
    pitch: u32,
    mip_count: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    write_base(&mut out, four_cc, width, height, pitch, mip_count);
    out.extend_from_slice(payload);
    out
}

/// A DX10 DDS file with the given DXGI format followed by `payload`.
pub fn dds_dx10_bytes(
    dxgi_format: u32,
    width: u32,
    height: u32,
    pitch: u32,
    mip_count: u32,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    write_base(&mut out, *b"DX10", width, height, pitch, mip_count);
    for field in [dxgi_format, 3, 0, 1, 0] {
        out.write_u32::<LittleEndian>(field).unwrap();
    }
    out.extend_from_slice(payload);
    out
}

/// Bytes of a full block-compressed mip chain, each level filled with its
/// level index so tests can tell levels apart.
pub fn chain_payload(width: u32, height: u32, levels: u32, block: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for level in 0..levels {
        let w = (width >> level).max(1) as usize;
        let h = (height >> level).max(1) as usize;
        let size = w.div_ceil(4).max(1) * h.div_ceil(4).max(1) * block;
        out.extend(std::iter::repeat(level as u8).take(size));
    }
    out
}
