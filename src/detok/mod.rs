//! Detokenizer (spec.md §2 component 14): turns a tokenized FCode byte
//! stream back into a readable listing of Forth-ish source.
//!
//! Mirrors `detok/decode.c`'s structure: a header decoder that validates
//! the starter/format/checksum/length fields, then a block walker that
//! prints one line per token, using the same [`crate::tables`] this
//! crate's tokenizer compiles from, plus any `-f` user-supplied FCode
//! table (component 14's "dictionary" half, in [`dictionary`]).

pub mod dictionary;

use crate::bits::{fetch_be16, fetch_be32, sign_extend_16, sign_extend_8};
use crate::config::Config;
use crate::diag::{Diagnostics, Location};
use crate::pci;
use crate::tables::{self, Terminator};
use dictionary::UserFcodeTable;

const BLIT: u16 = 0x010;
const BQUOTE: u16 = 0x012;
const BBRANCH: u16 = 0x013;
const BQBRANCH: u16 = 0x014;
const BLOOP: u16 = 0x015;
const BPLUSLOOP: u16 = 0x016;
const BDO: u16 = 0x017;
const BQDO: u16 = 0x018;
const BOF: u16 = 0x01c;
const NEW_TOKEN: u16 = 0x0b5;
const NAMED_TOKEN: u16 = 0x0b6;
const OFFSET16: u16 = 0x0cc;
const EXTERNAL_TOKEN: u16 = 0x0ca;

/// One line of detokenized output, the unit the `-n`/`-o` flags annotate
/// with a line number or byte offset (spec.md §6.5).
#[derive(Debug, Clone)]
pub struct DecodedLine {
    pub byte_offset: usize,
    pub text: String,
}

/// Outcome of decoding one FCode block header.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub starter_name: &'static str,
    pub offsets_16bit: bool,
    pub format: u8,
    pub stored_checksum: u16,
    pub computed_checksum: u16,
    pub length: u32,
    /// Byte offset of the starter token itself. `length` is measured from
    /// here (spec.md §6.1/§8.1-2), not from `body_start`.
    pub starter_offset: usize,
    pub body_start: usize,
}

pub struct Detokenizer {
    pub config: Config,
    pub diags: Diagnostics,
    pub user_tokens: UserFcodeTable,
    indent: i32,
    /// Branch/loop offset width of the block currently being walked, seeded
    /// from each header's `offsets_16bit` and flippable mid-block by the
    /// `offset16` token (spec.md §4.5).
    offsets_16bit: bool,
}

impl Detokenizer {
    pub fn new(config: Config) -> Self {
        Detokenizer {
            config,
            diags: Diagnostics::new(),
            user_tokens: UserFcodeTable::new(),
            indent: 0,
            offsets_16bit: true,
        }
    }

    fn loc(&self, byte_offset: usize) -> Location {
        Location::new("<fcode>", byte_offset as u32)
    }

    /// Resolve a token to its printable name: a user-supplied name from
    /// `-f` takes precedence (spec.md §6.6: "a user FCode table can
    /// override or add to the standard names"), falling back to the
    /// standard builtin table, then an `unnamed-fcode` placeholder.
    fn name_for(&self, token: u16) -> String {
        if let Some(name) = self.user_tokens.lookup(token) {
            return name.to_string();
        }
        if let Some(entry) = tables::lookup_by_token(token) {
            return entry.name.to_string();
        }
        format!("(unnamed-fcode 0x{token:03x})")
    }

    /// Decode a whole byte stream, possibly containing several concatenated
    /// PCI-ROM images or FCode blocks, into a flat listing.
    pub fn decode(&mut self, data: &[u8]) -> Vec<DecodedLine> {
        let mut out = Vec::new();
        let mut pos = 0usize;

        if let Some((_sig, data_ptr)) = pci::parse_rom_header(data) {
            out.push(self.line(0, "( PCI expansion-ROM header detected )".to_string()));
            if let Some(view) = pci::parse_pci_data_struct(data, data_ptr as usize) {
                out.push(self.line(
                    0,
                    format!(
                        "( vendor=0x{:04x} device=0x{:04x} class=0x{:06x} last-image={} )",
                        view.vendor_id,
                        view.device_id,
                        view.class_code,
                        view.is_last_image()
                    ),
                ));
            }
            pos = data_ptr as usize + pci::PCI_DATA_STRUCT_LEN;
        }

        loop {
            if pos >= data.len() {
                break;
            }
            match self.decode_header(data, pos) {
                Some(header) => {
                    self.offsets_16bit = header.offsets_16bit;
                    out.push(self.header_lines(&header));
                    let block_end = header.starter_offset + header.length as usize;
                    let end_reached = self.decode_block(data, header.body_start, block_end.min(data.len()), &mut out);
                    pos = block_end.max(header.body_start);
                    if !end_reached && !self.config.continue_past_end0 {
                        break;
                    }
                }
                None => {
                    out.push(self.line(pos, "( invalid FCode start byte; stopping )".to_string()));
                    break;
                }
            }
        }
        out
    }

    fn header_lines(&mut self, header: &HeaderInfo) -> DecodedLine {
        let ok = if header.stored_checksum == header.computed_checksum {
            "Ok".to_string()
        } else {
            format!("should be 0x{:04x}", header.computed_checksum)
        };
        self.line(
            header.body_start,
            format!(
                "{}  ( {}-bit offsets, format=0x{:02x}, checksum=0x{:04x} {}, len=0x{:x} )",
                header.starter_name,
                if header.offsets_16bit { 16 } else { 8 },
                header.format,
                header.stored_checksum,
                ok,
                header.length
            ),
        )
    }

    fn line(&self, byte_offset: usize, text: String) -> DecodedLine {
        let prefixed = if self.config.show_byte_offsets {
            format!("{byte_offset:06x}: {text}")
        } else if self.config.show_line_numbers {
            format!("{byte_offset}: {text}")
        } else {
            text
        };
        DecodedLine { byte_offset, text: prefixed }
    }

    /// Parse the FCode block header starting at `pos`: starter byte,
    /// format byte, 16-bit checksum, 32-bit length (spec.md §6.2).
    pub fn decode_header(&mut self, data: &[u8], pos: usize) -> Option<HeaderInfo> {
        let starter_raw = *data.get(pos)?;
        let (starter_name, offsets_16bit) = match starter_raw {
            0xf0 => ("start0", true),
            0xf1 => ("start1", true),
            0xf2 => ("start2", true),
            0xf3 => ("start4", true),
            0xfd => ("version1", false),
            _ => return None,
        };
        let format = *data.get(pos + 1)?;
        let stored_checksum = fetch_be16(data, pos + 2)?;
        let length = fetch_be32(data, pos + 4)?;
        let body_start = pos + 8;
        // `length` is measured from the starter token (spec.md §6.1/§8.1-2:
        // `fc_block_end = fc_block_start + fclen`), not from `body_start`.
        let end = (pos + length as usize).min(data.len());
        let computed_checksum = checksum_of(data.get(body_start..end).unwrap_or(&[]));
        Some(HeaderInfo {
            starter_name,
            offsets_16bit,
            format,
            stored_checksum,
            computed_checksum,
            length,
            starter_offset: pos,
            body_start,
        })
    }

    /// Walk one FCode block body, emitting one line per token. Returns
    /// `true` if an `end0`/`end1` terminator was actually seen.
    fn decode_block(&mut self, data: &[u8], mut pos: usize, end: usize, out: &mut Vec<DecodedLine>) -> bool {
        while pos < end {
            let start = pos;
            let Some((token, consumed)) = read_token(data, pos) else {
                out.push(self.line(start, "( truncated token )".to_string()));
                return false;
            };
            pos += consumed;

            if token == Terminator::End0 as u16 || token == Terminator::End1 as u16 {
                out.push(self.line(start, "end0".to_string()));
                return true;
            }

            match token {
                BLIT => {
                    let Some(value) = fetch_be32(data, pos) else {
                        out.push(self.line(start, "( truncated literal )".to_string()));
                        return false;
                    };
                    pos += 4;
                    out.push(self.line(start, format!("{} ( 0x{:x} )", value as i32, value)));
                }
                BQUOTE => {
                    let Some(len) = data.get(pos).copied() else {
                        out.push(self.line(start, "( truncated string )".to_string()));
                        return false;
                    };
                    pos += 1;
                    let len = len as usize;
                    let text = data.get(pos..pos + len).unwrap_or(&[]);
                    pos += len;
                    out.push(self.line(start, format!("\" {}", String::from_utf8_lossy(text))));
                }
                BBRANCH | BQBRANCH | BOF => {
                    let Some(off) = self.read_offset(data, pos) else {
                        out.push(self.line(start, "( truncated branch offset )".to_string()));
                        return false;
                    };
                    let (value, width) = off;
                    let target = (pos as i64 + value as i64) as usize;
                    pos += width;
                    out.push(self.line(
                        start,
                        format!("{} ( -> 0x{:x} )", self.name_for(token), target),
                    ));
                }
                BDO | BQDO => {
                    let Some((_, width)) = self.read_offset(data, pos) else {
                        out.push(self.line(start, "( truncated do offset )".to_string()));
                        return false;
                    };
                    pos += width;
                    self.indent += 1;
                    out.push(self.line(start, self.name_for(token)));
                }
                BLOOP | BPLUSLOOP => {
                    let Some((_, width)) = self.read_offset(data, pos) else {
                        out.push(self.line(start, "( truncated loop offset )".to_string()));
                        return false;
                    };
                    pos += width;
                    self.indent = (self.indent - 1).max(0);
                    out.push(self.line(start, self.name_for(token)));
                }
                0xf0..=0xf3 | 0xfd => {
                    // Nested FCode starter inside one stream: re-enter the
                    // header decoder at this position instead of treating
                    // it as an ordinary token (spec.md: multiple blocks may
                    // be concatenated).
                    if let Some(header) = self.decode_header(data, start) {
                        self.offsets_16bit = header.offsets_16bit;
                        out.push(self.header_lines(&header));
                        pos = header.body_start;
                    } else {
                        out.push(self.line(start, "( malformed nested header )".to_string()));
                    }
                }
                OFFSET16 => {
                    self.offsets_16bit = true;
                    out.push(self.line(start, self.name_for(token)));
                }
                NEW_TOKEN => {
                    let Some((assigned, consumed)) = read_token(data, pos) else {
                        out.push(self.line(start, "( truncated new-token )".to_string()));
                        return false;
                    };
                    pos += consumed;
                    let loc = self.loc(start);
                    self.user_tokens.insert(assigned, "(unnamed-fcode)".to_string(), &mut self.diags, loc);
                    out.push(self.line(start, format!("{} 0x{:03x}", self.name_for(token), assigned)));
                }
                NAMED_TOKEN | EXTERNAL_TOKEN => {
                    let Some(len) = data.get(pos).copied() else {
                        out.push(self.line(start, "( truncated token name )".to_string()));
                        return false;
                    };
                    pos += 1;
                    let len = len as usize;
                    let name_bytes = data.get(pos..pos + len).unwrap_or(&[]);
                    pos += len;
                    let name = String::from_utf8_lossy(name_bytes).to_string();
                    let Some((assigned, consumed)) = read_token(data, pos) else {
                        out.push(self.line(start, "( truncated new-token )".to_string()));
                        return false;
                    };
                    pos += consumed;
                    let loc = self.loc(start);
                    self.user_tokens.insert(assigned, name.clone(), &mut self.diags, loc);
                    out.push(self.line(start, format!("{} {} 0x{:03x}", self.name_for(token), name, assigned)));
                }
                _ => {
                    out.push(self.line(start, self.name_for(token)));
                }
            }
        }
        false
    }

    /// Read a branch offset field: 16-bit unless the header says 8-bit
    /// (`version1`, spec.md §6.3). Returns the sign-extended value and the
    /// number of bytes consumed.
    fn read_offset(&self, data: &[u8], pos: usize) -> Option<(i32, usize)> {
        if self.current_offsets_are_16bit() {
            let raw = fetch_be16(data, pos)?;
            Some((sign_extend_16(raw), 2))
        } else {
            let raw = *data.get(pos)?;
            Some((sign_extend_8(raw), 1))
        }
    }

    fn current_offsets_are_16bit(&self) -> bool {
        self.offsets_16bit
    }
}

fn read_token(data: &[u8], pos: usize) -> Option<(u16, usize)> {
    let first = *data.get(pos)?;
    if first == 0 || first >= 0x10 {
        Some((first as u16, 1))
    } else {
        let second = *data.get(pos + 1)?;
        Some((((first as u16) << 8) | second as u16, 2))
    }
}

fn checksum_of(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Emitter;
    use crate::tables::Starter;

    #[test]
    fn decodes_a_trivial_block() {
        let mut e = Emitter::new();
        let hdr = e.emit_fcodehdr(Starter::Start1);
        e.emit_fcode(0x047); // dup
        e.finish_fcodehdr(hdr, Terminator::End0);
        let bytes = e.into_bytes();

        let mut d = Detokenizer::new(Config::default());
        let lines = d.decode(&bytes);
        assert!(lines.iter().any(|l| l.text.contains("start1")));
        assert!(lines.iter().any(|l| l.text.contains("dup")));
        assert!(lines.iter().any(|l| l.text.contains("end0")));
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let mut e = Emitter::new();
        let hdr = e.emit_fcodehdr(Starter::Start1);
        e.emit_fcode(0x047);
        e.finish_fcodehdr(hdr, Terminator::End0);
        let mut bytes = e.into_bytes();
        bytes[2] ^= 0xff; // corrupt the stored checksum
        let mut d = Detokenizer::new(Config::default());
        let lines = d.decode(&bytes);
        assert!(lines[0].text.contains("should be"));
    }

    #[test]
    fn literal_decodes_with_signed_value() {
        let mut e = Emitter::new();
        let hdr = e.emit_fcodehdr(Starter::Start1);
        e.emit_literal(BLIT, -5);
        e.finish_fcodehdr(hdr, Terminator::End0);
        let bytes = e.into_bytes();
        let mut d = Detokenizer::new(Config::default());
        let lines = d.decode(&bytes);
        assert!(lines.iter().any(|l| l.text.starts_with("-5")));
    }
}
