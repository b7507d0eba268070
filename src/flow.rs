//! Control-flow compiler (spec.md §2 component 8): `IF`/`THEN`/`ELSE`,
//! `BEGIN`/`AGAIN`/`UNTIL`/`WHILE`/`REPEAT`, `DO`/`?DO`/`LOOP`/`+LOOP`, and
//! `CASE`/`OF`/`ENDOF`/`ENDCASE`.
//!
//! Each construct pushes a tagged mark onto `control_stack` recording the
//! output position counter (OPC) and source line at the moment of the
//! opening word, so a mismatched closer (`THEN` with no `IF`, end-of-file
//! with an unresolved `BEGIN`, …) can be reported against where the
//! construct started, not just where the error was noticed (spec.md: "a
//! flow-mark stack with tag+OPC+source-line for imbalance diagnostics").
//! Loop nesting is tracked separately so `i`/`j`/`unloop`/`leave` can be
//! rejected outside of any `DO`.

use crate::diag::{Diagnostics, Location};
use crate::emit::Emitter;

const BBRANCH: u16 = 0x013;
const BQBRANCH: u16 = 0x014;
const BLOOP: u16 = 0x015;
const BPLUSLOOP: u16 = 0x016;
const BDO: u16 = 0x017;
const BQDO: u16 = 0x018;
const TOK_I: u16 = 0x019;
const TOK_J: u16 = 0x01a;
const BLEAVE: u16 = 0x01b;
const BOF: u16 = 0x01c;
const BCASE: u16 = 0x0c4;
const BENDCASE: u16 = 0x0c5;
const BENDOF: u16 = 0x0c6;
const BMARK: u16 = 0x0b1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowTag {
    If,
    Else,
    Begin,
    While,
    Do,
    QDo,
    Case,
    Of,
}

impl FlowTag {
    fn keyword(self) -> &'static str {
        match self {
            FlowTag::If => "if",
            FlowTag::Else => "else",
            FlowTag::Begin => "begin",
            FlowTag::While => "while",
            FlowTag::Do => "do",
            FlowTag::QDo => "?do",
            FlowTag::Case => "case",
            FlowTag::Of => "of",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FlowMark {
    tag: FlowTag,
    /// For forward-branch constructs (`if`/`else`/`while`/`of`), the offset
    /// of the 16-bit placeholder field to patch once the destination is
    /// known. For backward-branch constructs (`begin`, `do`/`?do`'s loop
    /// start), the OPC of the destination itself.
    opc: usize,
    line: u32,
}

/// Drives the control-stack and loop-nesting state for one compilation
/// unit. Holds no emitter or diagnostics of its own -- those are passed in
/// per call, matching the rest of the core's "no hidden global state"
/// design (spec.md §5).
#[derive(Debug)]
pub struct FlowControl {
    control_stack: Vec<FlowMark>,
    loop_depth: u32,
    /// Heuristic-only balance counter for `>r`/`r>` (spec.md: "heuristic,
    /// non-authoritative return-stack balance check"). Never causes a
    /// hard error, only a warning at `;`/end-of-definition.
    return_stack_balance: i32,
    /// Whether the FCode block currently being compiled uses 16-bit branch
    /// offsets (every `start0`/`start1`/`start2`/`start4` header) or 8-bit
    /// ones (`version1`). Set by the tokenizer when it opens a header;
    /// defaults to 16-bit to match this crate's implicit default header.
    offs16: bool,
}

impl Default for FlowControl {
    fn default() -> Self {
        FlowControl {
            control_stack: Vec::new(),
            loop_depth: 0,
            return_stack_balance: 0,
            offs16: true,
        }
    }
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the tokenizer once it knows which starter opened the
    /// current FCode block (spec.md §4.5 "Offset policy").
    pub fn set_offset_width(&mut self, offs16: bool) {
        self.offs16 = offs16;
    }

    fn field_width(&self) -> usize {
        if self.offs16 { 2 } else { 1 }
    }

    fn reserve_offset(&self, e: &mut Emitter) -> usize {
        if self.offs16 { e.reserve_offset16() } else { e.reserve_offset8() }
    }

    fn patch_offset(&self, e: &mut Emitter, at: usize, offset: i32) {
        if self.offs16 {
            e.patch_offset16(at, offset);
        } else {
            e.patch_offset8(at, offset);
        }
    }

    fn push(&mut self, tag: FlowTag, opc: usize, line: u32) {
        self.control_stack.push(FlowMark { tag, opc, line });
    }

    fn pop_expecting(
        &mut self,
        expected: &[FlowTag],
        diags: &mut Diagnostics,
        loc: Location,
        closer: &str,
    ) -> Option<FlowMark> {
        match self.control_stack.pop() {
            Some(mark) if expected.contains(&mark.tag) => Some(mark),
            Some(mark) => {
                diags.error(
                    loc,
                    format!(
                        "`{closer}` does not match `{}` opened at line {}",
                        mark.tag.keyword(),
                        mark.line
                    ),
                );
                self.control_stack.push(mark);
                None
            }
            None => {
                diags.error(loc, format!("`{closer}` with no open flow-control construct"));
                None
            }
        }
    }

    fn here(e: &Emitter) -> usize {
        e.opc()
    }

    /// Forward branch offset from `from` (position of the placeholder
    /// field) to `to` (destination), as a signed 16-bit delta.
    fn forward_offset(from_field: usize, to: usize) -> i32 {
        to as i32 - from_field as i32
    }

    fn backward_offset(from_field: usize, dest: usize) -> i32 {
        dest as i32 - from_field as i32
    }

    pub fn emit_if(&mut self, e: &mut Emitter, line: u32) {
        e.emit_fcode(BQBRANCH);
        let field = self.reserve_offset(e);
        self.push(FlowTag::If, field, line);
    }

    pub fn emit_then(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(mark) = self.pop_expecting(&[FlowTag::If, FlowTag::Else], diags, loc, "then")
        else {
            return;
        };
        let dest = Self::here(e);
        let off = Self::forward_offset(mark.opc, dest);
        self.patch_offset(e, mark.opc, off);
    }

    pub fn emit_else(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(if_mark) = self.pop_expecting(&[FlowTag::If], diags, loc.clone(), "else") else {
            return;
        };
        e.emit_fcode(BBRANCH);
        let else_field = self.reserve_offset(e);
        let dest = Self::here(e);
        let off = Self::forward_offset(if_mark.opc, dest);
        self.patch_offset(e, if_mark.opc, off);
        self.push(FlowTag::Else, else_field, loc.line);
    }

    pub fn emit_begin(&mut self, e: &mut Emitter, line: u32) {
        let mark = Self::here(e);
        e.emit_fcode(BMARK);
        self.push(FlowTag::Begin, mark, line);
    }

    pub fn emit_again(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(mark) = self.pop_expecting(&[FlowTag::Begin], diags, loc, "again") else {
            return;
        };
        e.emit_fcode(BBRANCH);
        let field = self.reserve_offset(e);
        let off = Self::backward_offset(field, mark.opc);
        self.patch_offset(e, field, off);
    }

    pub fn emit_until(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(mark) = self.pop_expecting(&[FlowTag::Begin], diags, loc, "until") else {
            return;
        };
        e.emit_fcode(BQBRANCH);
        let field = self.reserve_offset(e);
        let off = Self::backward_offset(field, mark.opc);
        self.patch_offset(e, field, off);
    }

    pub fn emit_while(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        if !matches!(self.control_stack.last().map(|m| m.tag), Some(FlowTag::Begin)) {
            diags.error(loc.clone(), "`while` with no matching `begin`");
            return;
        }
        e.emit_fcode(BQBRANCH);
        let field = self.reserve_offset(e);
        self.push(FlowTag::While, field, loc.line);
    }

    pub fn emit_repeat(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(while_mark) =
            self.pop_expecting(&[FlowTag::While], diags, loc.clone(), "repeat")
        else {
            return;
        };
        let Some(begin_mark) =
            self.pop_expecting(&[FlowTag::Begin], diags, loc, "repeat")
        else {
            return;
        };
        e.emit_fcode(BBRANCH);
        let back_field = self.reserve_offset(e);
        let back_off = Self::backward_offset(back_field, begin_mark.opc);
        self.patch_offset(e, back_field, back_off);
        let dest = Self::here(e);
        let fwd_off = Self::forward_offset(while_mark.opc, dest);
        self.patch_offset(e, while_mark.opc, fwd_off);
    }

    pub fn mark_do(&mut self, e: &mut Emitter, line: u32, questionable: bool) {
        e.emit_fcode(if questionable { BQDO } else { BDO });
        let exit_field = self.reserve_offset(e);
        self.push(
            if questionable { FlowTag::QDo } else { FlowTag::Do },
            exit_field,
            line,
        );
        self.loop_depth += 1;
    }

    pub fn resolve_loop(
        &mut self,
        e: &mut Emitter,
        diags: &mut Diagnostics,
        loc: Location,
        plus_loop: bool,
    ) {
        let Some(mark) =
            self.pop_expecting(&[FlowTag::Do, FlowTag::QDo], diags, loc, "loop/+loop")
        else {
            return;
        };
        let loop_start = mark.opc + self.field_width(); // first instruction after do's offset field
        e.emit_fcode(if plus_loop { BPLUSLOOP } else { BLOOP });
        let back_field = self.reserve_offset(e);
        let back_off = Self::backward_offset(back_field, loop_start);
        self.patch_offset(e, back_field, back_off);
        let exit_dest = Self::here(e);
        let exit_off = Self::forward_offset(mark.opc, exit_dest);
        self.patch_offset(e, mark.opc, exit_off);
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }

    pub fn emit_case(&mut self, e: &mut Emitter, line: u32) {
        e.emit_fcode(BCASE);
        self.push(FlowTag::Case, Self::here(e), line);
    }

    pub fn emit_of(&mut self, e: &mut Emitter, line: u32) {
        e.emit_fcode(BOF);
        let field = self.reserve_offset(e);
        self.push(FlowTag::Of, field, line);
    }

    pub fn emit_endof(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(of_mark) = self.pop_expecting(&[FlowTag::Of], diags, loc, "endof") else {
            return;
        };
        e.emit_fcode(BENDOF);
        let dest = Self::here(e);
        let off = Self::forward_offset(of_mark.opc, dest);
        self.patch_offset(e, of_mark.opc, off);
    }

    pub fn emit_endcase(&mut self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        let Some(_case_mark) = self.pop_expecting(&[FlowTag::Case], diags, loc, "endcase") else {
            return;
        };
        e.emit_fcode(BENDCASE);
    }

    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    pub fn emit_i(&self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        if !self.in_loop() {
            diags.warning(loc, "`i` used outside of a `do`...`loop`");
        }
        e.emit_fcode(TOK_I);
    }

    pub fn emit_j(&self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        if self.loop_depth < 2 {
            diags.warning(loc, "`j` used outside of a nested `do`...`loop`");
        }
        e.emit_fcode(TOK_J);
    }

    pub fn emit_leave(&self, e: &mut Emitter, diags: &mut Diagnostics, loc: Location) {
        if !self.in_loop() {
            diags.warning(loc, "`leave` used outside of a `do`...`loop`");
        }
        e.emit_fcode(BLEAVE);
    }

    pub fn note_to_r(&mut self) {
        self.return_stack_balance += 1;
    }

    pub fn note_r_from(&mut self) {
        self.return_stack_balance -= 1;
    }

    /// Called at `;` / end of a definition: warn (never error) if `>r`/`r>`
    /// looked unbalanced. This is advisory because the heuristic cannot see
    /// through `execute`, recursive calls, or conditional paths.
    pub fn check_return_stack_balance(&mut self, diags: &mut Diagnostics, loc: Location) {
        if self.return_stack_balance != 0 {
            diags.warning(
                loc,
                format!(
                    "possibly unbalanced return-stack use (`>r`/`r>` off by {})",
                    self.return_stack_balance
                ),
            );
        }
        self.return_stack_balance = 0;
    }

    /// Any flow-control constructs still open at end-of-definition or
    /// end-of-file are reported here (spec.md: imbalance diagnostics).
    pub fn check_all_closed(&mut self, diags: &mut Diagnostics, loc: Location) {
        for mark in self.control_stack.drain(..) {
            diags.error(
                loc.clone(),
                format!("unresolved `{}` opened at line {}", mark.tag.keyword(), mark.line),
            );
        }
        self.loop_depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.fth", 1)
    }

    #[test]
    fn if_then_patches_forward_branch() {
        let mut fc = FlowControl::new();
        let mut diags = Diagnostics::new();
        let mut e = Emitter::new();
        fc.emit_if(&mut e, 1);
        let field = e.opc() - 2;
        e.emit_byte(0xAA); // body of the if
        fc.emit_then(&mut e, &mut diags, loc());
        let patched = crate::bits::fetch_be16(e.bytes(), field).unwrap();
        assert_eq!(patched as i16 as i32, 3); // skip over the body byte + branch field already counted
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn unmatched_then_is_an_error() {
        let mut fc = FlowControl::new();
        let mut diags = Diagnostics::new();
        let mut e = Emitter::new();
        fc.emit_then(&mut e, &mut diags, loc());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn loop_nesting_tracks_i_and_j() {
        let mut fc = FlowControl::new();
        let mut diags = Diagnostics::new();
        let mut e = Emitter::new();
        fc.mark_do(&mut e, 1, false);
        fc.mark_do(&mut e, 2, false);
        fc.emit_j(&mut e, &mut diags, loc());
        assert_eq!(diags.warning_count(), 0);
        fc.resolve_loop(&mut e, &mut diags, loc(), false);
        fc.resolve_loop(&mut e, &mut diags, loc(), false);
        assert!(!fc.in_loop());
    }

    #[test]
    fn unresolved_begin_is_reported_at_end() {
        let mut fc = FlowControl::new();
        let mut diags = Diagnostics::new();
        let mut e = Emitter::new();
        fc.emit_begin(&mut e, 5);
        fc.check_all_closed(&mut diags, loc());
        assert_eq!(diags.error_count(), 1);
    }
}
