//! Conditional compilation (spec.md §2 component 10): `[IF]`/`[ELSE]`/
//! `[THEN]` and their synonyms `#IF`/`#ELSE`/`#THEN`/`[ENDIF]`.
//!
//! `[IF]` pops a compile-time flag (pushed by something evaluated in
//! tokenizer-escape mode, e.g. `[DEFINED]`) and enters "ignore" mode if it
//! was false. While ignoring, the scanner keeps splitting words as usual,
//! but most dispatch is suppressed -- the only names that still need
//! special handling are the ones named by `IgnoreClass` (string/comment
//! openers, a nested `[IF]`, a Locals `{` declaration), so their own
//! delimiters don't get mistaken for conditional-compilation keywords.

use crate::diag::{Diagnostics, Location};
use crate::vocab::IgnoreClass;

/// One entry in the conditional-compilation stack: whether the branch
/// taken at this level is currently active, and whether an `[ELSE]` has
/// already been seen at this level (a second one is an error).
#[derive(Debug, Clone, Copy)]
struct CondFrame {
    active: bool,
    seen_else: bool,
    line: u32,
}

#[derive(Debug, Default)]
pub struct ConditionalCompiler {
    stack: Vec<CondFrame>,
}

impl ConditionalCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if tokens should currently be compiled (no open `[IF]`, or
    /// every level on the stack is on its active branch).
    pub fn is_active(&self) -> bool {
        self.stack.iter().all(|f| f.active)
    }

    /// `[IF]`/`#IF`: pop `flag` from the compile-time interpreter (the
    /// caller passes the already-popped value in) and push a new
    /// conditional level.
    pub fn enter_if(&mut self, flag: bool, line: u32) {
        self.stack.push(CondFrame {
            active: flag,
            seen_else: false,
            line,
        });
    }

    /// `[ELSE]`/`#ELSE`: flip the innermost level's active flag, unless an
    /// enclosing level is already inactive (in which case both branches
    /// stay suppressed).
    pub fn enter_else(&mut self, diags: &mut Diagnostics, loc: Location) {
        let Some(frame) = self.stack.last_mut() else {
            diags.error(loc, "`[else]` with no matching `[if]`");
            return;
        };
        if frame.seen_else {
            diags.error(loc, "multiple `[else]` for the same `[if]`");
            return;
        }
        frame.seen_else = true;
        frame.active = !frame.active;
    }

    /// `[THEN]`/`#THEN`/`[ENDIF]`: close the innermost conditional level.
    pub fn leave(&mut self, diags: &mut Diagnostics, loc: Location) {
        if self.stack.pop().is_none() {
            diags.error(loc, "`[then]` with no matching `[if]`");
        }
    }

    /// Any levels still open at end-of-file are an error (spec.md:
    /// imbalance diagnostics apply here too, same spirit as the
    /// flow-control mark stack).
    pub fn check_all_closed(&mut self, diags: &mut Diagnostics, loc: Location) {
        for frame in self.stack.drain(..) {
            diags.error(
                loc.clone(),
                format!("unresolved `[if]` opened at line {}", frame.line),
            );
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Dispatch a word encountered while ignoring, based on its `IgnoreClass`.
/// Returns how many extra bytes/words the caller must additionally skip to
/// stay synchronized; the actual consumption is done by the scanner, this
/// only decides which kind of skip it must perform.
pub fn ignore_action_for(class: IgnoreClass) -> IgnoreClass {
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.fth", 1)
    }

    #[test]
    fn if_false_suppresses_until_else() {
        let mut cc = ConditionalCompiler::new();
        cc.enter_if(false, 1);
        assert!(!cc.is_active());
        let mut diags = Diagnostics::new();
        cc.enter_else(&mut diags, loc());
        assert!(cc.is_active());
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn nested_if_inside_inactive_branch_stays_suppressed() {
        let mut cc = ConditionalCompiler::new();
        cc.enter_if(false, 1);
        cc.enter_if(true, 2);
        assert!(!cc.is_active());
        let mut diags = Diagnostics::new();
        cc.leave(&mut diags, loc());
        assert!(!cc.is_active());
        cc.leave(&mut diags, loc());
        assert!(cc.is_active());
    }

    #[test]
    fn double_else_is_an_error() {
        let mut cc = ConditionalCompiler::new();
        let mut diags = Diagnostics::new();
        cc.enter_if(true, 1);
        cc.enter_else(&mut diags, loc());
        cc.enter_else(&mut diags, loc());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn unresolved_if_reported_at_eof() {
        let mut cc = ConditionalCompiler::new();
        let mut diags = Diagnostics::new();
        cc.enter_if(true, 7);
        cc.check_all_closed(&mut diags, loc());
        assert_eq!(diags.error_count(), 1);
    }
}
