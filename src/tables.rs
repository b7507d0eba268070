//! Built-in tables (spec.md §2 component 16): the standard FCode token
//! assignment list for `[0x000, 0x254]`, shared — as a single source of
//! truth, per the design note in spec.md §9 ("Token table co-maintenance")
//! — by both the tokenizer's core vocabulary and the detokenizer's
//! number-to-name table.
//!
//! Data only: names and numbers are fixed by IEEE 1275-1994 and its 64-bit
//! addendum. A handful of entries are `Definer::Value`/`Variable`/`Defer`/
//! `Constant` rather than a plain token, matching the handful the C table
//! enters with `BI_FCODE_VALUE`/`BI_FCODE_VRBLE`/`BI_FCODE_DEFER`/
//! `BI_FCODE_CONST` macros; everything else is a generic single-token word.

use crate::vocab::Definer;

/// One row of the standard-token table. Several names may share the same
/// `token` (documented synonyms); `obsolete` marks tokens the standard
/// deprecated but that must still decode.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinToken {
    pub token: u16,
    pub name: &'static str,
    pub definer: Definer,
    pub obsolete: bool,
}

const fn tok(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::BuiltinFcode,
        obsolete: false,
    }
}

const fn obs(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::BuiltinFcode,
        obsolete: true,
    }
}

const fn value(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::Value,
        obsolete: false,
    }
}

const fn vrble(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::Variable,
        obsolete: false,
    }
}

const fn defer(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::Defer,
        obsolete: false,
    }
}

const fn constant(token: u16, name: &'static str) -> BuiltinToken {
    BuiltinToken {
        token,
        name,
        definer: Definer::Constant,
        obsolete: false,
    }
}

/// The standard FCode token table, `tokens_table` in `toke/dictionary.c`.
pub static TOKENS_TABLE: &[BuiltinToken] = &[
    tok(0x000, "end0"),
    tok(0x010, "b(lit)"),
    tok(0x011, "b(')"),
    tok(0x012, "b(\")"),
    tok(0x013, "bbranch"),
    tok(0x014, "b?branch"),
    tok(0x015, "b(loop)"),
    tok(0x016, "b(+loop)"),
    tok(0x017, "b(do)"),
    tok(0x018, "b(?do)"),
    tok(0x019, "i"),
    tok(0x01a, "j"),
    tok(0x01b, "b(leave)"),
    tok(0x01c, "b(of)"),
    tok(0x01d, "execute"),
    tok(0x01e, "+"),
    tok(0x01f, "-"),
    tok(0x020, "*"),
    tok(0x021, "/"),
    tok(0x022, "mod"),
    tok(0x023, "and"),
    tok(0x024, "or"),
    tok(0x025, "xor"),
    tok(0x026, "invert"),
    tok(0x026, "not"),
    tok(0x027, "lshift"),
    tok(0x027, "<<"),
    tok(0x028, "rshift"),
    tok(0x028, ">>"),
    tok(0x029, ">>a"),
    tok(0x02a, "/mod"),
    tok(0x02b, "u/mod"),
    tok(0x02c, "negate"),
    tok(0x02d, "abs"),
    tok(0x02e, "min"),
    tok(0x02f, "max"),
    tok(0x030, ">r"),
    tok(0x031, "r>"),
    tok(0x032, "r@"),
    tok(0x033, "exit"),
    tok(0x034, "0="),
    tok(0x035, "0<>"),
    tok(0x036, "0<"),
    tok(0x037, "0<="),
    tok(0x038, "0>"),
    tok(0x039, "0>="),
    tok(0x03a, "<"),
    tok(0x03b, ">"),
    tok(0x03c, "="),
    tok(0x03d, "<>"),
    tok(0x03e, "u>"),
    tok(0x03f, "u<="),
    tok(0x040, "u<"),
    tok(0x041, "u>="),
    tok(0x042, ">="),
    tok(0x043, "<="),
    tok(0x044, "between"),
    tok(0x045, "within"),
    tok(0x046, "drop"),
    tok(0x047, "dup"),
    tok(0x048, "over"),
    tok(0x049, "swap"),
    tok(0x04A, "rot"),
    tok(0x04b, "-rot"),
    tok(0x04c, "tuck"),
    tok(0x04d, "nip"),
    tok(0x04e, "pick"),
    tok(0x04f, "roll"),
    tok(0x050, "?dup"),
    tok(0x051, "depth"),
    tok(0x052, "2drop"),
    tok(0x053, "2dup"),
    tok(0x054, "2over"),
    tok(0x055, "2swap"),
    tok(0x056, "2rot"),
    tok(0x057, "2/"),
    tok(0x058, "u2/"),
    tok(0x059, "2*"),
    tok(0x05a, "/c"),
    tok(0x05b, "/w"),
    tok(0x05c, "/l"),
    tok(0x05d, "/n"),
    tok(0x05e, "ca+"),
    tok(0x05f, "wa+"),
    tok(0x060, "la+"),
    tok(0x061, "na+"),
    tok(0x062, "char+"),
    tok(0x062, "ca1+"),
    tok(0x063, "wa1+"),
    tok(0x064, "la1+"),
    tok(0x065, "cell+"),
    tok(0x065, "na1+"),
    tok(0x066, "chars"),
    tok(0x066, "/c*"),
    tok(0x067, "/w*"),
    tok(0x068, "/l*"),
    tok(0x069, "cells"),
    tok(0x069, "/n*"),
    tok(0x06a, "on"),
    tok(0x06b, "off"),
    tok(0x06c, "+!"),
    tok(0x06d, "@"),
    tok(0x06e, "l@"),
    tok(0x06f, "w@"),
    tok(0x070, "<w@"),
    tok(0x071, "c@"),
    tok(0x072, "!"),
    tok(0x073, "l!"),
    tok(0x074, "w!"),
    tok(0x075, "c!"),
    tok(0x076, "2@"),
    tok(0x077, "2!"),
    tok(0x078, "move"),
    tok(0x079, "fill"),
    tok(0x07a, "comp"),
    tok(0x07b, "noop"),
    tok(0x07c, "lwsplit"),
    tok(0x07d, "wljoin"),
    tok(0x07e, "lbsplit"),
    tok(0x07f, "bljoin"),
    tok(0x080, "wbflip"),
    tok(0x080, "flip"),
    tok(0x081, "upc"),
    tok(0x082, "lcc"),
    tok(0x083, "pack"),
    tok(0x084, "count"),
    tok(0x085, "body>"),
    tok(0x086, ">body"),
    tok(0x087, "fcode-revision"),
    tok(0x087, "version"),
    vrble(0x088, "span"),
    tok(0x089, "unloop"),
    tok(0x08a, "expect"),
    tok(0x08b, "alloc-mem"),
    tok(0x08c, "free-mem"),
    tok(0x08d, "key?"),
    tok(0x08e, "key"),
    tok(0x08f, "emit"),
    tok(0x090, "type"),
    tok(0x091, "(cr"),
    tok(0x092, "cr"),
    vrble(0x093, "#out"),
    vrble(0x094, "#line"),
    tok(0x095, "hold"),
    tok(0x096, "<#"),
    tok(0x097, "u#>"),
    tok(0x098, "sign"),
    tok(0x099, "u#"),
    tok(0x09a, "u#s"),
    tok(0x09b, "u."),
    tok(0x09c, "u.r"),
    tok(0x09d, "."),
    tok(0x09e, ".r"),
    tok(0x09f, ".s"),
    vrble(0x0a0, "base"),
    obs(0x0a1, "convert"),
    tok(0x0a2, "$number"),
    tok(0x0a3, "digit"),
    constant(0x0a4, "-1"),
    constant(0x0a4, "true"),
    constant(0x0a5, "0"),
    constant(0x0a5, "false"),
    constant(0x0a5, "struct"),
    constant(0x0a6, "1"),
    constant(0x0a7, "2"),
    constant(0x0a8, "3"),
    constant(0x0a9, "bl"),
    constant(0x0aa, "bs"),
    constant(0x0ab, "bell"),
    tok(0x0ac, "bounds"),
    tok(0x0ad, "here"),
    tok(0x0ae, "aligned"),
    tok(0x0af, "wbsplit"),
    tok(0x0b0, "bwjoin"),
    tok(0x0b1, "b(<mark)"),
    tok(0x0b2, "b(>resolve)"),
    obs(0x0b3, "set-token-table"),
    obs(0x0b4, "set-table"),
    tok(0x0b5, "new-token"),
    tok(0x0b6, "named-token"),
    tok(0x0b7, "b(:)"),
    tok(0x0b8, "b(value)"),
    tok(0x0b9, "b(variable)"),
    tok(0x0ba, "b(constant)"),
    tok(0x0bb, "b(create)"),
    tok(0x0bc, "b(defer)"),
    tok(0x0bd, "b(buffer:)"),
    tok(0x0be, "b(field)"),
    obs(0x0bf, "b(code)"),
    tok(0x0c0, "instance"),
    tok(0x0c2, "b(;)"),
    tok(0x0c3, "b(to)"),
    tok(0x0c4, "b(case)"),
    tok(0x0c5, "b(endcase)"),
    tok(0x0c6, "b(endof)"),
    tok(0x0c7, "#"),
    tok(0x0c8, "#s"),
    tok(0x0c9, "#>"),
    tok(0x0ca, "external-token"),
    tok(0x0cb, "$find"),
    tok(0x0cc, "offset16"),
    tok(0x0cd, "evaluate"),
    tok(0x0cd, "eval"),
    tok(0x0d0, "c,"),
    tok(0x0d1, "w,"),
    tok(0x0d2, "l,"),
    tok(0x0d3, ","),
    tok(0x0d4, "um*"),
    tok(0x0d4, "u*x"),
    tok(0x0d5, "um/mod"),
    tok(0x0d5, "xu/mod"),
    tok(0x0d8, "d+"),
    tok(0x0d8, "x+"),
    tok(0x0d9, "d-"),
    tok(0x0d9, "x-"),
    tok(0x0da, "get-token"),
    tok(0x0db, "set-token"),
    vrble(0x0dc, "state"),
    tok(0x0dd, "compile,"),
    tok(0x0de, "behavior"),
    tok(0x0f0, "start0"),
    tok(0x0f1, "start1"),
    tok(0x0f2, "start2"),
    tok(0x0f3, "start4"),
    tok(0x0fc, "ferror"),
    tok(0x0fd, "version1"),
    obs(0x0fe, "4-byte-id"),
    tok(0x0ff, "end1"),
    obs(0x101, "dma-alloc"),
    tok(0x102, "my-address"),
    tok(0x103, "my-space"),
    obs(0x104, "memmap"),
    tok(0x105, "free-virtual"),
    obs(0x106, ">physical"),
    obs(0x10f, "my-params"),
    tok(0x110, "property"),
    tok(0x110, "attribute"),
    tok(0x111, "encode-int"),
    tok(0x111, "xdrint"),
    tok(0x112, "encode+"),
    tok(0x112, "xdr+"),
    tok(0x113, "encode-phys"),
    tok(0x113, "xdrphys"),
    tok(0x114, "encode-string"),
    tok(0x114, "xdrstring"),
    tok(0x115, "encode-bytes"),
    tok(0x115, "xdrbytes"),
    tok(0x116, "reg"),
    obs(0x117, "intr"),
    obs(0x118, "driver"),
    tok(0x119, "model"),
    tok(0x11a, "device-type"),
    tok(0x11b, "parse-2int"),
    tok(0x11b, "decode-2int"),
    tok(0x11c, "is-install"),
    tok(0x11d, "is-remove"),
    tok(0x11e, "is-selftest"),
    tok(0x11f, "new-device"),
    tok(0x120, "diagnostic-mode?"),
    obs(0x121, "display-status"),
    tok(0x122, "memory-test-issue"),
    obs(0x123, "group-code"),
    vrble(0x124, "mask"),
    tok(0x125, "get-msecs"),
    tok(0x126, "ms"),
    tok(0x127, "finish-device"),
    tok(0x128, "decode-phys"),
    tok(0x12b, "interpose"),
    tok(0x130, "map-low"),
    tok(0x130, "map-sbus"),
    tok(0x131, "sbus-intr>cpu"),
    value(0x150, "#lines"),
    value(0x151, "#columns"),
    value(0x152, "line#"),
    value(0x153, "column#"),
    value(0x154, "inverse?"),
    value(0x155, "inverse-screen?"),
    defer(0x157, "draw-character"),
    defer(0x158, "reset-screen"),
    defer(0x159, "toggle-cursor"),
    defer(0x15a, "erase-screen"),
    defer(0x15b, "blink-screen"),
    defer(0x15c, "invert-screen"),
    defer(0x15d, "insert-characters"),
    defer(0x15e, "delete-characters"),
    defer(0x15f, "insert-lines"),
    defer(0x160, "delete-lines"),
    defer(0x161, "draw-logo"),
    value(0x162, "frame-buffer-adr"),
    value(0x163, "screen-height"),
    value(0x164, "screen-width"),
    value(0x165, "window-top"),
    value(0x166, "window-left"),
    tok(0x16a, "default-font"),
    tok(0x16b, "set-font"),
    value(0x16c, "char-height"),
    value(0x16d, "char-width"),
    tok(0x16e, ">font"),
    value(0x16f, "fontbytes"),
    tok(0x180, "fb8-draw-character"),
    tok(0x181, "fb8-reset-screen"),
    tok(0x182, "fb8-toggle-cursor"),
    tok(0x183, "fb8-erase-screen"),
    tok(0x184, "fb8-blink-screen"),
    tok(0x185, "fb8-invert-screen"),
    tok(0x186, "fb8-insert-characters"),
    tok(0x187, "fb8-delete-characters"),
    tok(0x188, "fb8-insert-lines"),
    tok(0x189, "fb8-delete-lines"),
    tok(0x18a, "fb8-draw-logo"),
    tok(0x18b, "fb8-install"),
    tok(0x1a4, "mac-address"),
    tok(0x201, "device-name"),
    tok(0x201, "name"),
    tok(0x202, "my-args"),
    value(0x203, "my-self"),
    tok(0x204, "find-package"),
    tok(0x205, "open-package"),
    tok(0x206, "close-package"),
    tok(0x207, "find-method"),
    tok(0x208, "call-package"),
    tok(0x209, "$call-parent"),
    tok(0x20a, "my-parent"),
    tok(0x20b, "ihandle>phandle"),
    tok(0x20d, "my-unit"),
    tok(0x20e, "$call-method"),
    tok(0x20f, "$open-package"),
    obs(0x210, "processor-type"),
    obs(0x211, "firmware-version"),
    obs(0x212, "fcode-version"),
    tok(0x213, "alarm"),
    tok(0x214, "(is-user-word)"),
    tok(0x215, "suspend-fcode"),
    tok(0x216, "abort"),
    tok(0x217, "catch"),
    tok(0x218, "throw"),
    tok(0x219, "user-abort"),
    tok(0x21a, "get-my-property"),
    tok(0x21a, "get-my-attribute"),
    tok(0x21b, "decode-int"),
    tok(0x21b, "xdrtoint"),
    tok(0x21c, "decode-string"),
    tok(0x21c, "xdrtostring"),
    tok(0x21d, "get-inherited-property"),
    tok(0x21d, "get-inherited-attribute"),
    tok(0x21e, "delete-property"),
    tok(0x21e, "delete-attribute"),
    tok(0x21f, "get-package-property"),
    tok(0x21f, "get-package-attribute"),
    tok(0x220, "cpeek"),
    tok(0x221, "wpeek"),
    tok(0x222, "lpeek"),
    tok(0x223, "cpoke"),
    tok(0x224, "wpoke"),
    tok(0x225, "lpoke"),
    tok(0x226, "lwflip"),
    tok(0x227, "lbflip"),
    tok(0x228, "lbflips"),
    tok(0x230, "rb@"),
    tok(0x231, "rb!"),
    tok(0x232, "rw@"),
    tok(0x233, "rw!"),
    tok(0x234, "rl@"),
    tok(0x235, "rl!"),
    tok(0x236, "wbflips"),
    tok(0x236, "wflips"),
    tok(0x237, "lwflips"),
    tok(0x237, "lflips"),
    tok(0x23b, "child"),
    tok(0x23c, "peer"),
    tok(0x23d, "next-property"),
    tok(0x23e, "byte-load"),
    tok(0x23f, "set-args"),
    tok(0x240, "left-parse-string"),
    tok(0x22e, "rx@"),
    tok(0x22f, "rx!"),
    tok(0x241, "bxjoin"),
    tok(0x242, "<l@"),
    tok(0x243, "lxjoin"),
    tok(0x244, "wxjoin"),
    tok(0x245, "x,"),
    tok(0x246, "x@"),
    tok(0x247, "x!"),
    tok(0x248, "/x"),
    tok(0x249, "/x*"),
    tok(0x24a, "xa+"),
    tok(0x24b, "xa1+"),
    tok(0x24c, "xbflip"),
    tok(0x24d, "xbflips"),
    tok(0x24e, "xbsplit"),
    tok(0x24f, "xlflip"),
    tok(0x250, "xlflips"),
    tok(0x251, "xlsplit"),
    tok(0x252, "xwflip"),
    tok(0x253, "xwflips"),
    tok(0x254, "xwsplit"),
];

/// FCode-block starter tokens (spec.md §6.1). `Version1` uses 8-bit branch
/// offsets; the `Start*` family uses 16-bit offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u16)]
pub enum Starter {
    Start0 = 0x0f0,
    Start1 = 0x0f1,
    Start2 = 0x0f2,
    Start4 = 0x0f3,
    Version1 = 0x0fd,
}

impl Starter {
    pub fn is_16bit_offsets(self) -> bool {
        !matches!(self, Starter::Version1)
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "start0" => Some(Starter::Start0),
            "start1" => Some(Starter::Start1),
            "start2" => Some(Starter::Start2),
            "start4" => Some(Starter::Start4),
            "version1" => Some(Starter::Version1),
            _ => None,
        }
    }
}

/// FCode-block terminator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u16)]
pub enum Terminator {
    End0 = 0x000,
    End1 = 0x0ff,
}

/// Look up a builtin token by exact (case-insensitive) name; returns the
/// first match, matching the chain's "most recently added / first match"
/// rule for the synonyms entered later in the same table.
pub fn lookup_by_name(name: &str) -> Option<&'static BuiltinToken> {
    TOKENS_TABLE
        .iter()
        .rev()
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

pub fn lookup_by_token(token: u16) -> Option<&'static BuiltinToken> {
    TOKENS_TABLE.iter().find(|t| t.token == token)
}

/// All names sharing a token value, in table order (used by the
/// detokenizer to pick the canonical/first name for an unverbose print).
pub fn names_for_token(token: u16) -> impl Iterator<Item = &'static str> {
    TOKENS_TABLE
        .iter()
        .filter(move |t| t.token == token)
        .map(|t| t.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_token() {
        assert_eq!(lookup_by_name("dup").map(|t| t.token), Some(0x047));
        assert_eq!(lookup_by_name("DUP").map(|t| t.token), Some(0x047));
    }

    #[test]
    fn synonyms_share_token() {
        let names: Vec<_> = names_for_token(0x026).collect();
        assert!(names.contains(&"invert"));
        assert!(names.contains(&"not"));
    }

    #[test]
    fn starter_offset_mode() {
        assert!(Starter::Start1.is_16bit_offsets());
        assert!(!Starter::Version1.is_16bit_offsets());
    }
}
