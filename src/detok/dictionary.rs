//! User-supplied FCode table (spec.md §2 component 14, the `-f FILE`
//! vendor-specific FCode list from `detok/addfcodes.c`).
//!
//! Each non-blank line is `0xNNN name`, a hex token number (`0x` or `0X`
//! prefixed, or bare hex) followed by the name to print for it. A later
//! line for a token already defined is ignored with a warning rather than
//! overwriting, matching `add_fcodes_from_list`'s "already defined...
//! Ignoring" behavior.

use crate::diag::{Diagnostics, Location};

#[derive(Debug, Default)]
pub struct UserFcodeTable {
    entries: Vec<(u16, String)>,
}

impl UserFcodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, token: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, name)| name.as_str())
    }

    /// Record one `(token, name)` pair, warning instead of overwriting if
    /// the token is already defined -- shared by `load` and the
    /// `new-token`/`named-token`/`external-token` directives a block being
    /// detokenized can carry (spec.md §4.11).
    pub fn insert(&mut self, token: u16, name: String, diags: &mut Diagnostics, loc: Location) {
        if let Some(existing) = self.lookup(token) {
            diags.warning(loc, format!("FCode number 0x{token:03x} already defined as {existing}, ignoring"));
            return;
        }
        self.entries.push((token, name));
    }

    /// Parse the contents of a `-f` file, recording one diagnostic per
    /// malformed or duplicate line but never aborting the whole file.
    pub fn load(&mut self, text: &str, file: &str, diags: &mut Diagnostics) {
        for (i, raw_line) in text.lines().enumerate() {
            let line_no = (i + 1) as u32;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((tok_field, name_field)) = line.split_once(char::is_whitespace) else {
                diags.warning(Location::new(file, line_no), format!("invalid format, ignoring: {line}"));
                continue;
            };
            let name = name_field.trim();
            let digits = tok_field
                .strip_prefix("0x")
                .or_else(|| tok_field.strip_prefix("0X"))
                .unwrap_or(tok_field);
            let Ok(token) = u32::from_str_radix(digits, 16) else {
                diags.warning(Location::new(file, line_no), format!("invalid format, ignoring: {line}"));
                continue;
            };
            if token > 0xfff {
                diags.warning(
                    Location::new(file, line_no),
                    format!("FCode number 0x{token:x} out of range, ignoring"),
                );
                continue;
            }
            let token = token as u16;
            self.insert(token, name.to_string(), diags, Location::new(file, line_no));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_basic_entries() {
        let mut t = UserFcodeTable::new();
        let mut diags = Diagnostics::new();
        t.load("0x800 my-custom-word\n0x801 another-word\n", "vfc.txt", &mut diags);
        assert_eq!(t.lookup(0x800), Some("my-custom-word"));
        assert_eq!(t.lookup(0x801), Some("another-word"));
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn duplicate_token_is_ignored_with_warning() {
        let mut t = UserFcodeTable::new();
        let mut diags = Diagnostics::new();
        t.load("0x800 first\n0x800 second\n", "vfc.txt", &mut diags);
        assert_eq!(t.lookup(0x800), Some("first"));
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn malformed_line_is_ignored_with_warning() {
        let mut t = UserFcodeTable::new();
        let mut diags = Diagnostics::new();
        t.load("not-a-valid-line\n", "vfc.txt", &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(t.lookup(0x800).is_none());
    }

    #[test]
    fn out_of_range_token_is_rejected() {
        let mut t = UserFcodeTable::new();
        let mut diags = Diagnostics::new();
        t.load("0x1fff toobig\n", "vfc.txt", &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(t.lookup(0x1fff).is_none());
    }
}
