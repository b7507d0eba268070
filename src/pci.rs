//! PCI expansion-ROM image assembler (spec.md §2 component 13).
//!
//! Lays out the 28-byte ROM header (signature `0xAA55`, 22 reserved bytes,
//! a little-endian pointer to the PCI Data Structure, and a 2-byte pad)
//! followed by the 24-byte PCI Data Structure (`"PCIR"` signature, vendor/
//! device ID, VPD pointer, this structure's own length and revision, a
//! 24-bit class code, the image length in 512-byte blocks, an image
//! revision, a code type, and the last-image flag byte). Several images
//! can be concatenated into one ROM; only the final one gets its
//! last-image flag bit set.

use crate::bits::{push_le16, push_le24, store_le16};

pub const ROM_SIGNATURE: u16 = 0xaa55;
pub const PCI_DATA_SIGNATURE: u32 = 0x5043_4952; // "PCIR", big-endian on the wire
pub const ROM_HEADER_LEN: usize = 28;
pub const PCI_DATA_STRUCT_LEN: usize = 24;
pub const PCI_DATA_STRUCT_REV: u8 = 0;

/// Code-type values the PCI Data Structure's `code_type` byte may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum CodeType {
    X86Pc = 0x00,
    OpenFirmware = 0x01,
    Hpr = 0x02,
    Efi = 0x03,
}

bitflags::bitflags! {
    /// The single `last_image_flag` byte: bit 7 marks the final image in a
    /// concatenated ROM; the rest is reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LastImageFlag: u8 {
        const LAST_IMAGE = 0x80;
    }
}

/// Fields the tokenizer's `pci-header`/`pci-end`/`set-last-image` family of
/// words accumulate before the image is assembled.
#[derive(Debug, Clone)]
pub struct PciImageParams {
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u32,
    pub code_type: CodeType,
    pub code_revision: u16,
    pub image_revision: u8,
    pub vpd_pointer: u16,
    pub is_last_image: bool,
}

impl Default for PciImageParams {
    fn default() -> Self {
        PciImageParams {
            vendor_id: 0,
            device_id: 0,
            class_code: 0,
            code_type: CodeType::OpenFirmware,
            code_revision: 0,
            image_revision: 0,
            vpd_pointer: 0,
            is_last_image: true,
        }
    }
}

/// Assemble one PCI expansion-ROM image: the 28-byte ROM header, the
/// 24-byte PCI Data Structure immediately after it, then `body` (the
/// tokenized FCode), padded to a multiple of 512 bytes as the image-length
/// field requires.
pub fn assemble_image(params: &PciImageParams, body: &[u8]) -> Vec<u8> {
    let data_ptr = ROM_HEADER_LEN as u16;
    let unpadded_len = ROM_HEADER_LEN + PCI_DATA_STRUCT_LEN + body.len();
    let block_count = unpadded_len.div_ceil(512);
    let padded_len = block_count * 512;

    let mut out = Vec::with_capacity(padded_len);

    // ROM header.
    push_le16_as_be(&mut out, ROM_SIGNATURE);
    out.extend(std::iter::repeat_n(0u8, 0x16));
    push_le16(&mut out, data_ptr);
    push_le16(&mut out, 0); // padd

    // PCI Data Structure.
    push_be32_wire(&mut out, PCI_DATA_SIGNATURE);
    push_le16(&mut out, params.vendor_id);
    push_le16(&mut out, params.device_id);
    push_le16(&mut out, params.vpd_pointer);
    push_le16(&mut out, PCI_DATA_STRUCT_LEN as u16);
    out.push(PCI_DATA_STRUCT_REV);
    push_le24(&mut out, params.class_code);
    push_le16(&mut out, block_count as u16);
    push_le16(&mut out, params.code_revision);
    out.push(params.code_type.into());
    let flag = if params.is_last_image {
        LastImageFlag::LAST_IMAGE
    } else {
        LastImageFlag::empty()
    };
    out.push(flag.bits());
    push_le16(&mut out, 0); // reserved_2

    debug_assert_eq!(out.len(), ROM_HEADER_LEN + PCI_DATA_STRUCT_LEN);

    out.extend_from_slice(body);
    out.resize(padded_len, 0);
    out
}

fn push_le16_as_be(buf: &mut Vec<u8>, value: u16) {
    buf.push((value >> 8) as u8);
    buf.push(value as u8);
}

fn push_be32_wire(buf: &mut Vec<u8>, value: u32) {
    buf.push((value >> 24) as u8);
    buf.push((value >> 16) as u8);
    buf.push((value >> 8) as u8);
    buf.push(value as u8);
}

/// Given several already-assembled images meant to be concatenated into
/// one ROM, clear every `last_image_flag` byte except the final image's
/// (spec.md: "only the last gets the last-image flag").
pub fn concatenate_images(mut images: Vec<Vec<u8>>) -> Vec<u8> {
    let flag_offset = ROM_HEADER_LEN + 4 + 2 + 2 + 2 + 2 + 1 + 3 + 2 + 2 + 1;
    let last = images.len().saturating_sub(1);
    for (i, image) in images.iter_mut().enumerate() {
        if i != last {
            if let Some(b) = image.get_mut(flag_offset) {
                *b &= !LastImageFlag::LAST_IMAGE.bits();
            }
        } else if let Some(b) = image.get_mut(flag_offset) {
            *b |= LastImageFlag::LAST_IMAGE.bits();
        }
    }
    images.concat()
}

/// Read back the fields this module wrote, for the detokenizer's PCI
/// header display (spec.md §2 component 14, PCI-header parsing counterpart).
pub fn parse_rom_header(data: &[u8]) -> Option<(u16, u16)> {
    let signature = crate::bits::fetch_be16(data, 0)?;
    if signature != ROM_SIGNATURE {
        return None;
    }
    let data_ptr = crate::bits::fetch_le16(data, 0x18)?;
    Some((signature, data_ptr))
}

pub fn parse_pci_data_struct(data: &[u8], at: usize) -> Option<PciDataView> {
    let signature = crate::bits::fetch_be32(data, at)?;
    if signature != PCI_DATA_SIGNATURE {
        return None;
    }
    Some(PciDataView {
        vendor_id: crate::bits::fetch_le16(data, at + 4)?,
        device_id: crate::bits::fetch_le16(data, at + 6)?,
        vpd_pointer: crate::bits::fetch_le16(data, at + 8)?,
        class_code: crate::bits::fetch_le24(data, at + 13)?,
        image_length_blocks: crate::bits::fetch_le16(data, at + 16)?,
        code_type: *data.get(at + 20)?,
        last_image_flag: *data.get(at + 21)?,
    })
}

/// Parsed view of one PCI Data Structure, used by the detokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDataView {
    pub vendor_id: u16,
    pub device_id: u16,
    pub vpd_pointer: u16,
    pub class_code: u32,
    pub image_length_blocks: u16,
    pub code_type: u8,
    pub last_image_flag: u8,
}

impl PciDataView {
    pub fn is_last_image(&self) -> bool {
        self.last_image_flag & LastImageFlag::LAST_IMAGE.bits() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> PciImageParams {
        PciImageParams {
            vendor_id: 0x10ee,
            device_id: 0x0001,
            class_code: 0x020000,
            code_type: CodeType::OpenFirmware,
            code_revision: 1,
            image_revision: 0,
            vpd_pointer: 0,
            is_last_image: true,
        }
    }

    #[test]
    fn header_is_padded_to_512_byte_multiple() {
        let img = assemble_image(&sample_params(), &[0u8; 10]);
        assert_eq!(img.len() % 512, 0);
        assert!(img.len() >= 512);
    }

    #[test]
    fn rom_signature_and_data_pointer_roundtrip() {
        let img = assemble_image(&sample_params(), &[0x47, 0x00]);
        let (sig, data_ptr) = parse_rom_header(&img).unwrap();
        assert_eq!(sig, ROM_SIGNATURE);
        assert_eq!(data_ptr, ROM_HEADER_LEN as u16);
        let view = parse_pci_data_struct(&img, data_ptr as usize).unwrap();
        assert_eq!(view.vendor_id, 0x10ee);
        assert_eq!(view.class_code, 0x020000);
        assert!(view.is_last_image());
    }

    #[test]
    fn only_final_concatenated_image_keeps_last_image_flag() {
        let a = assemble_image(&sample_params(), &[0x01]);
        let b = assemble_image(&sample_params(), &[0x02]);
        let combined = concatenate_images(vec![a, b]);
        let (_, first_ptr) = parse_rom_header(&combined).unwrap();
        let first_view = parse_pci_data_struct(&combined, first_ptr as usize).unwrap();
        assert!(!first_view.is_last_image());
    }
}
