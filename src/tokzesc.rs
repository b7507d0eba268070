//! Tokenizer-escape mode (spec.md §2 component 11): `tokenizer[ ... ]tokenizer`.
//!
//! Inside the brackets, the tokenizer runs a small Forth-like compile-time
//! interpreter with its own data stack -- separate from anything being
//! compiled into the FCode output -- supporting arithmetic, stack
//! shuffling, `."`/`.( ` printing, `[FLAG]`/`[DEFINED]`, the `FCODE-PUSH`/
//! `FCODE-POP`/`FCODE-RESET` allocator controls, numeric-base directives,
//! and `alias`. Its vocabulary is its own (`init_tokz_esc_vocab` in the
//! original), distinct from both the core FCode vocabulary and the Locals
//! vocabulary.

use crate::config::Config;
use crate::diag::{Diagnostics, FatalError, Location};
use crate::fcode_alloc::FcodeAllocator;

/// Result of executing one word in escape mode.
pub enum EscOutcome {
    /// Word was recognized and handled.
    Handled,
    /// Word was not one of the escape-mode built-ins; the caller should try
    /// looking it up as a user-defined alias or an ordinary FCode word
    /// (tokenizer-escape mode can still reference named constants).
    Unhandled,
}

/// The compile-time interpreter's own data stack and numeric base.
#[derive(Debug)]
pub struct TokzEsc {
    stack: Vec<i64>,
    base: u32,
}

impl TokzEsc {
    pub fn new() -> Self {
        TokzEsc {
            stack: Vec::new(),
            base: 10,
        }
    }

    pub fn push(&mut self, v: i64) {
        self.stack.push(v);
    }

    /// Pop the top of the data stack, warning (and returning `0`) on
    /// underflow rather than panicking -- a malformed `tokenizer[ ... ]`
    /// section is a diagnostic, not a crash.
    pub fn pop(&mut self, diags: &mut Diagnostics, loc: Location) -> i64 {
        self.stack.pop().unwrap_or_else(|| {
            diags.warning(loc, "tokenizer-escape data-stack underflow");
            0
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Execute one word of tokenizer-escape source. `text` is additional
    /// input available after `."`/`.(` for their delimited string argument,
    /// consumed by the caller and handed in as already-extracted text; this
    /// module does not itself touch the source stack.
    pub fn execute(
        &mut self,
        word: &str,
        config: &Config,
        alloc: &mut FcodeAllocator,
        diags: &mut Diagnostics,
        loc: Location,
        print_text: Option<&str>,
    ) -> Result<EscOutcome, FatalError> {
        match word {
            "+" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a + b);
            }
            "-" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a - b);
            }
            "*" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a * b);
            }
            "/" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc.clone());
                if b == 0 {
                    diags.warning(loc, "tokenizer-escape division by zero");
                    self.push(0);
                } else {
                    self.push(a / b);
                }
            }
            "mod" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc.clone());
                if b == 0 {
                    diags.warning(loc, "tokenizer-escape division by zero");
                    self.push(0);
                } else {
                    self.push(a % b);
                }
            }
            "dup" => {
                let a = *self.stack.last().unwrap_or(&0);
                self.push(a);
            }
            "drop" => {
                self.pop(diags, loc);
            }
            "swap" => {
                let len = self.stack.len();
                if len >= 2 {
                    self.stack.swap(len - 1, len - 2);
                }
            }
            "over" => {
                let len = self.stack.len();
                if len >= 2 {
                    self.push(self.stack[len - 2]);
                }
            }
            "rot" => {
                let len = self.stack.len();
                if len >= 3 {
                    self.stack.swap(len - 3, len - 2);
                    self.stack.swap(len - 2, len - 1);
                }
            }
            "and" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a & b);
            }
            "or" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a | b);
            }
            "xor" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a ^ b);
            }
            "invert" => {
                let a = self.pop(diags, loc);
                self.push(!a);
            }
            "lshift" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(a << (b & 0x3f));
            }
            "rshift" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(((a as u64) >> (b & 0x3f)) as i64);
            }
            "<" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(if a < b { -1 } else { 0 });
            }
            ">" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(if a > b { -1 } else { 0 });
            }
            "=" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(if a == b { -1 } else { 0 });
            }
            "<>" => {
                let b = self.pop(diags, loc.clone());
                let a = self.pop(diags, loc);
                self.push(if a != b { -1 } else { 0 });
            }
            "0=" => {
                let a = self.pop(diags, loc);
                self.push(if a == 0 { -1 } else { 0 });
            }
            "0<" => {
                let a = self.pop(diags, loc);
                self.push(if a < 0 { -1 } else { 0 });
            }
            "hex" => self.base = 16,
            "decimal" => self.base = 10,
            "octal" => self.base = 8,
            "fcode-push" => alloc.push(),
            "fcode-pop" => {
                alloc.pop(diags, loc);
            }
            "fcode-reset" => alloc.reset(),
            "[flag]" | "[defined]" => {
                let name = print_text.unwrap_or_default();
                self.push(if config.is_predefined(name) { -1 } else { 0 });
            }
            "." => {
                let v = self.pop(diags, loc);
                print!("{v} ");
            }
            ".\"" | ".(" => {
                if let Some(text) = print_text {
                    print!("{text}");
                }
            }
            _ => return Ok(EscOutcome::Unhandled),
        }
        Ok(EscOutcome::Handled)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> Option<i64> {
        self.stack.last().copied()
    }
}

impl Default for TokzEsc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.fth", 1)
    }

    #[test]
    fn basic_arithmetic() {
        let mut esc = TokzEsc::new();
        let config = Config::default();
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        esc.push(2);
        esc.push(3);
        esc.execute("+", &config, &mut alloc, &mut diags, loc(), None).unwrap();
        assert_eq!(esc.top(), Some(5));
    }

    #[test]
    fn base_directives_change_reported_base() {
        let mut esc = TokzEsc::new();
        let config = Config::default();
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        esc.execute("hex", &config, &mut alloc, &mut diags, loc(), None).unwrap();
        assert_eq!(esc.base(), 16);
    }

    #[test]
    fn defined_checks_predefine_list() {
        let mut esc = TokzEsc::new();
        let mut config = Config::default();
        config.predefined.push(("FOO".into(), None));
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        esc.execute("[defined]", &config, &mut alloc, &mut diags, loc(), Some("FOO"))
            .unwrap();
        assert_eq!(esc.top(), Some(-1));
        esc.execute("[defined]", &config, &mut alloc, &mut diags, loc(), Some("BAR"))
            .unwrap();
        assert_eq!(esc.top(), Some(0));
    }

    #[test]
    fn bitwise_and_comparison_ops() {
        let mut esc = TokzEsc::new();
        let config = Config::default();
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        esc.push(6);
        esc.push(3);
        esc.execute("and", &config, &mut alloc, &mut diags, loc(), None).unwrap();
        assert_eq!(esc.top(), Some(2));
        esc.push(5);
        esc.execute("<", &config, &mut alloc, &mut diags, loc(), None).unwrap();
        assert_eq!(esc.top(), Some(-1));
    }

    #[test]
    fn rot_rotates_third_item_to_top() {
        let mut esc = TokzEsc::new();
        let config = Config::default();
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        esc.push(1);
        esc.push(2);
        esc.push(3);
        esc.execute("rot", &config, &mut alloc, &mut diags, loc(), None).unwrap();
        assert_eq!(esc.top(), Some(1));
    }

    #[test]
    fn unhandled_word_is_reported_as_such() {
        let mut esc = TokzEsc::new();
        let config = Config::default();
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        let outcome = esc
            .execute("frobnicate", &config, &mut alloc, &mut diags, loc(), None)
            .unwrap();
        assert!(matches!(outcome, EscOutcome::Unhandled));
    }
}
