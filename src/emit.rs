//! Emitter (spec.md §2 component 7): turns tokens, literals, and strings
//! into bytes in the output buffer, and assembles the FCode block header
//! and its checksum/length fixup.
//!
//! `Emitter` owns the output position counter (OPC) the rest of the
//! compiler needs for back-patching flow-control branches. Token encoding
//! follows spec.md §6.1: a value `< 0x100` is a single byte; a value
//! `>= 0x100` is emitted as two bytes, the first carrying the high nibble
//! (itself always in `[0x01,0x0f]`, since the token space tops out at
//! `0xfff`) and the second the low byte. `0x00` alone (not followed by
//! anything special) is the single-byte `end0`.

use crate::bits::{push_be16, push_be32, store_be16, store_be32};
use crate::tables::{Starter, Terminator};

/// Running output buffer plus the output position counter used for
/// branch back-patching.
#[derive(Debug, Default)]
pub struct Emitter {
    buf: Vec<u8>,
}

/// A previously written header whose checksum/length fields are still
/// waiting to be patched in by `finish_fcodehdr`.
pub struct OpenHeader {
    /// Byte offset of the starter token itself. The stored length field
    /// covers the whole block -- starter through terminator inclusive,
    /// per spec.md §6.1/§8.1-2 (`decode_fcode_block`'s `fc_block_start`/
    /// `fc_block_end = fc_block_start + fclen`).
    starter_offset: usize,
    /// Byte offset of the first byte *after* the 32-bit length field --
    /// the checksum is computed from here through the terminator
    /// inclusive, per spec.md §6.2.
    body_start: usize,
    checksum_field: usize,
    length_field: usize,
    offsets_16bit: bool,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter { buf: Vec::new() }
    }

    /// Current output position counter.
    pub fn opc(&self) -> usize {
        self.buf.len()
    }

    pub fn emit_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Emit a raw FCode number using the 1-or-2-byte encoding (spec.md
    /// §6.1). Use this for token values that are *not* in the single-token
    /// builtin table dispatch path, e.g. a user-assigned FCode number.
    pub fn emit_fcode(&mut self, token: u16) {
        if token < 0x100 {
            self.buf.push(token as u8);
        } else {
            self.buf.push((token >> 8) as u8);
            self.buf.push(token as u8);
        }
    }

    /// Emit a named builtin/user token -- currently identical to
    /// `emit_fcode`, kept distinct because callers reason about "a token
    /// looked up by name" versus "a raw numeric value" differently.
    pub fn emit_token(&mut self, token: u16) {
        self.emit_fcode(token);
    }

    /// Emit `b(lit) <value>`: the literal opcode followed by a 32-bit
    /// big-endian value (spec.md: FCode literals are always 32 bits wide
    /// regardless of host `isize`).
    pub fn emit_literal(&mut self, lit_token: u16, value: i32) {
        self.emit_fcode(lit_token);
        push_be32(&mut self.buf, value as u32);
    }

    /// Emit `b(") <len-byte><bytes>` for strings shorter than 256 bytes (the
    /// only length `b(")` supports; longer strings are a caller-level
    /// error, not this module's concern).
    pub fn emit_string(&mut self, string_token: u16, text: &[u8]) {
        self.emit_fcode(string_token);
        self.buf.push(text.len() as u8);
        self.buf.extend_from_slice(text);
    }

    /// Start an FCode block header: the starter token, a format byte
    /// (always `0x08`, "FCode with checksum" per spec.md §6.2), and
    /// placeholder checksum/length fields to be patched by
    /// `finish_fcodehdr`.
    pub fn emit_fcodehdr(&mut self, starter: Starter) -> OpenHeader {
        let starter_offset = self.buf.len();
        let raw: u16 = starter.into();
        self.emit_fcode(raw);
        self.buf.push(0x08); // format byte
        let checksum_field = self.buf.len();
        push_be16(&mut self.buf, 0);
        let length_field = self.buf.len();
        push_be32(&mut self.buf, 0);
        OpenHeader {
            starter_offset,
            body_start: self.buf.len(),
            checksum_field,
            length_field,
            offsets_16bit: starter.is_16bit_offsets(),
        }
    }

    pub fn offsets_are_16bit(&self, header: &OpenHeader) -> bool {
        header.offsets_16bit
    }

    /// Emit the block terminator and patch the header's checksum and
    /// length fields. The length covers the whole block, starter through
    /// terminator inclusive (spec.md §6.1/§8.1-2); the checksum covers the
    /// narrower range from just after the length field through the
    /// terminator, inclusive (spec.md §6.2: "checksum = 16-bit sum mod
    /// 2^16 over bytes from after the length field through the terminator
    /// inclusive").
    pub fn finish_fcodehdr(&mut self, header: OpenHeader, terminator: Terminator) {
        self.emit_fcode(terminator as u16);
        let end = self.buf.len();
        let len = (end - header.starter_offset) as u32;
        store_be32(&mut self.buf, header.length_field, len);
        let checksum = checksum_of(&self.buf[header.body_start..end]);
        store_be16(&mut self.buf, header.checksum_field, checksum);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Reserve a 16-bit branch-offset field at the current OPC, writing
    /// zero for now, and return its offset for a later `patch_offset16`.
    /// Flow-control constructs use this for every forward or backward
    /// branch they compile, since the destination is rarely known yet.
    pub fn reserve_offset16(&mut self) -> usize {
        let at = self.buf.len();
        push_be16(&mut self.buf, 0);
        at
    }

    /// Reserve a 1-byte branch-offset field, the `version1` header's narrow
    /// counterpart to `reserve_offset16` (spec.md §6.3).
    pub fn reserve_offset8(&mut self) -> usize {
        let at = self.buf.len();
        self.buf.push(0);
        at
    }

    /// Patch a previously emitted 8-bit branch offset (spec.md §6.3: "An
    /// 8-bit branch offset value 0x80 must sign-extend to -128").
    pub fn patch_offset8(&mut self, at: usize, offset: i32) {
        self.buf[at] = offset as u8;
    }

    /// Patch a previously emitted 16-bit branch offset.
    pub fn patch_offset16(&mut self, at: usize, offset: i32) {
        store_be16(&mut self.buf, at, offset as u16);
    }

    /// Replace everything from `from` to the current end with `replacement`.
    /// Used by the PCI image assembler to wrap an already-finished FCode
    /// block (header, body and terminator all patched) in its ROM header
    /// without disturbing anything emitted before `from`.
    pub fn splice_from(&mut self, from: usize, replacement: Vec<u8>) {
        self.buf.truncate(from);
        self.buf.extend(replacement);
    }
}

/// 16-bit sum-of-bytes checksum, mod 2^16.
fn checksum_of(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_token_is_one_byte() {
        let mut e = Emitter::new();
        e.emit_fcode(0x047); // dup
        assert_eq!(e.bytes(), &[0x47]);
    }

    #[test]
    fn large_token_is_two_bytes() {
        let mut e = Emitter::new();
        e.emit_fcode(0x800);
        assert_eq!(e.bytes(), &[0x08, 0x00]);
    }

    #[test]
    fn header_length_covers_whole_block_checksum_covers_body_and_terminator() {
        let mut e = Emitter::new();
        let hdr = e.emit_fcodehdr(Starter::Start1);
        e.emit_fcode(0x047); // one body byte: dup
        e.finish_fcodehdr(hdr, Terminator::End0);
        let bytes = e.bytes();
        // starter(1) + format(1) + checksum(2) + length(4) + body(1) + end0(1)
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[0], 0xf1); // start1
        assert_eq!(bytes[1], 0x08); // format byte
        let len = crate::bits::fetch_be32(bytes, 4).unwrap();
        assert_eq!(len, 10); // starter through end0, inclusive
        let checksum = crate::bits::fetch_be16(bytes, 2).unwrap();
        assert_eq!(checksum, (0x47u16 + 0x00u16) & 0xffff);
    }

    #[test]
    fn literal_is_32_bits_big_endian() {
        let mut e = Emitter::new();
        e.emit_literal(0x010, -1);
        assert_eq!(e.bytes(), &[0x10, 0xff, 0xff, 0xff, 0xff]);
    }
}
