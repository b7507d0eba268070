//! FCode number allocator (spec.md §2 component 6).
//!
//! Single-token FCode numbers are handed out sequentially starting at
//! `0x800` (the user range) as each new definition is compiled; `next_fcode`
//! is the raw counter. `FCODE-PUSH`/`FCODE-POP`/`FCODE-RESET` let a source
//! file save and restore the counter around a block meant to reuse a
//! specific numeric range (e.g. re-emitting a previously tokenized FCode
//! program's own numbers), and the allocator keeps enough history to warn
//! when a restored or reset range overlaps one already handed out.

use crate::diag::{Diagnostics, Location};

/// Lowest legal FCode number, and the allocator's starting point.
pub const FIRST_USER_FCODE: u16 = 0x800;
/// Highest legal FCode number (12-bit token space, spec.md §6.1).
pub const MAX_FCODE: u16 = 0xfff;

#[derive(Debug)]
struct UsedRange {
    start: u16,
    end_exclusive: u16,
}

impl UsedRange {
    fn overlaps(&self, other_start: u16, other_end_exclusive: u16) -> bool {
        self.start < other_end_exclusive && other_start < self.end_exclusive
    }
}

/// Tracks the next FCode number to assign and the history needed for
/// overlap warnings across `FCODE-PUSH`/`FCODE-POP`/`FCODE-RESET`.
#[derive(Debug)]
pub struct FcodeAllocator {
    next: u16,
    /// Value of `next` the last time a contiguous run started (after the
    /// most recent push, pop, or reset); closing that run records it here.
    run_start: u16,
    used: Vec<UsedRange>,
    stack: Vec<u16>,
}

impl FcodeAllocator {
    pub fn new() -> Self {
        FcodeAllocator {
            next: FIRST_USER_FCODE,
            run_start: FIRST_USER_FCODE,
            used: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn peek_next(&self) -> u16 {
        self.next
    }

    /// Hand out the next FCode number and advance the counter. Returns
    /// `Err` (a `FATAL`) if the token space is exhausted, per spec.md §2
    /// component 6 ("FATAL if the value of nextfcode is larger than the
    /// legal maximum").
    pub fn assign(
        &mut self,
        diags: &mut Diagnostics,
        loc: Location,
    ) -> Result<u16, crate::diag::FatalError> {
        if self.next > MAX_FCODE {
            return Err(diags.fatal(
                loc,
                format!("FCode number {:#x} exceeds the legal maximum {:#x}", self.next, MAX_FCODE),
            ));
        }
        let assigned = self.next;
        self.next += 1;
        Ok(assigned)
    }

    fn close_run(&mut self) {
        if self.run_start != self.next {
            self.used.push(UsedRange {
                start: self.run_start,
                end_exclusive: self.next,
            });
        }
    }

    fn warn_if_overlaps(&self, diags: &mut Diagnostics, loc: Location, start: u16, end_exclusive: u16) {
        if self.used.iter().any(|r| r.overlaps(start, end_exclusive)) {
            diags.warning(
                loc,
                format!(
                    "FCode range [{:#x},{:#x}) overlaps a range already assigned",
                    start, end_exclusive
                ),
            );
        }
    }

    /// `FCODE-PUSH`: save the current counter value for later restoration
    /// by a matching `FCODE-POP`, closing off the run of numbers assigned
    /// since the last push/pop/reset.
    pub fn push(&mut self) {
        self.close_run();
        self.stack.push(self.next);
        self.run_start = self.next;
    }

    /// `FCODE-POP`: restore the most recently pushed counter value. Warns
    /// (does not error) if the run being discarded overlaps a range
    /// already recorded as used.
    pub fn pop(&mut self, diags: &mut Diagnostics, loc: Location) -> Option<u16> {
        let restored = self.stack.pop()?;
        self.warn_if_overlaps(diags, loc, self.run_start, self.next);
        self.close_run();
        self.next = restored;
        self.run_start = restored;
        Some(restored)
    }

    /// `FCODE-RESET`: close the current run, reinitialize overlap tracking
    /// from scratch, and reset the counter back to `FIRST_USER_FCODE`.
    pub fn reset(&mut self) {
        self.close_run();
        self.used.clear();
        self.stack.clear();
        self.next = FIRST_USER_FCODE;
        self.run_start = FIRST_USER_FCODE;
    }

    /// Explicitly set the counter (used when a source file provides its own
    /// starting number via an advisory directive); does not by itself check
    /// for overlap -- the next `push`/`pop`/`reset` will.
    pub fn set_next(&mut self, value: u16) {
        self.close_run();
        self.next = value;
        self.run_start = value;
    }

    /// All ranges recorded as used so far, for the `-v` "list FCode ranges"
    /// advisory output.
    pub fn used_ranges(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.used.iter().map(|r| (r.start, r.end_exclusive))
    }
}

impl Default for FcodeAllocator {
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
    fn assigns_sequentially_from_0x800() {
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        assert_eq!(alloc.assign(&mut diags, loc()).unwrap(), 0x800);
        assert_eq!(alloc.assign(&mut diags, loc()).unwrap(), 0x801);
    }

    #[test]
    fn push_pop_restores_counter() {
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        alloc.assign(&mut diags, loc()).unwrap();
        alloc.push();
        alloc.assign(&mut diags, loc()).unwrap();
        alloc.assign(&mut diags, loc()).unwrap();
        let restored = alloc.pop(&mut diags, loc()).unwrap();
        assert_eq!(restored, 0x801);
        assert_eq!(alloc.peek_next(), 0x801);
    }

    #[test]
    fn overlap_after_pop_warns() {
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        alloc.assign(&mut diags, loc()).unwrap(); // uses 0x800
        alloc.push(); // save 0x801
        alloc.assign(&mut diags, loc()).unwrap(); // uses 0x801
        alloc.pop(&mut diags, loc()); // restores to 0x801, range [0x801,0x802) now "used"
        alloc.push();
        alloc.assign(&mut diags, loc()).unwrap(); // 0x801 again: overlaps
        alloc.pop(&mut diags, loc());
        assert!(diags.warning_count() >= 1);
    }

    #[test]
    fn reset_returns_to_first_user_fcode() {
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        alloc.assign(&mut diags, loc()).unwrap();
        alloc.assign(&mut diags, loc()).unwrap();
        alloc.reset();
        assert_eq!(alloc.peek_next(), FIRST_USER_FCODE);
    }

    #[test]
    fn exhausting_token_space_is_fatal() {
        let mut alloc = FcodeAllocator::new();
        let mut diags = Diagnostics::new();
        alloc.set_next(MAX_FCODE);
        alloc.assign(&mut diags, loc()).unwrap();
        assert!(alloc.assign(&mut diags, loc()).is_err());
    }
}
