//! Symbol-trace facility (spec.md §2 component 15).
//!
//! `-T name` registers a name on the trace list (`Diagnostics::set_trace_names`);
//! from then on, every time that name is defined, aliased, or invoked a
//! `Trace-Note` message is produced. The assigned FCode-token number, when
//! the entry has one, is appended in the fixed `" (FCode token = 0x123)"`
//! phrase used consistently across every trace message (spec.md:
//! "Trace-Note: <name> <emitted-bytes-summary>").

use crate::diag::{Diagnostics, Location};
use crate::vocab::TicEntry;

/// The `" (FCode token = 0x123)"` suffix, or empty if the entry has no
/// single-token FCode number.
fn token_phrase(token: Option<u16>) -> String {
    match token {
        Some(t) if t > 0 => format!(" (FCode token = {t:#05x})"),
        _ => String::new(),
    }
}

/// Announce that a traced name was just created (colon definition,
/// VALUE/VARIABLE/CONSTANT/etc., or a plain builtin-table entry).
pub fn trace_creation(
    diags: &mut Diagnostics,
    loc: Location,
    entry: &TicEntry,
    token: Option<u16>,
    scope_note: &str,
) {
    diags.trace(
        &entry.name,
        loc,
        format!(
            "Creating {}{} as a {}{}",
            entry.name,
            token_phrase(token),
            entry.definer,
            scope_note
        ),
    );
}

/// Announce that an alias was just created.
pub fn trace_alias(diags: &mut Diagnostics, loc: Location, new_name: &str, existing_name: &str, token: Option<u16>) {
    diags.trace(
        new_name,
        loc,
        format!("Creating {new_name}{} as an alias for {existing_name}", token_phrase(token)),
    );
}

/// Announce that a traced name was just invoked (compiled into the output).
pub fn trace_invocation(diags: &mut Diagnostics, loc: Location, name: &str, token: Option<u16>) {
    diags.trace(name, loc, format!("Invoking {name}{}", token_phrase(token)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{ActiveKind, Definer, TicEntry};

    #[test]
    fn trace_note_only_for_traced_name() {
        let mut diags = Diagnostics::new();
        diags.set_trace_names(vec!["probe".into()]);
        let entry = TicEntry::new("probe", ActiveKind::ColonWord(0x800), Definer::Colon);
        trace_creation(&mut diags, Location::new("t.fth", 1), &entry, Some(0x800), "");
        let entry2 = TicEntry::new("quiet", ActiveKind::ColonWord(0x801), Definer::Colon);
        trace_creation(&mut diags, Location::new("t.fth", 2), &entry2, Some(0x801), "");
        assert_eq!(diags.messages().len(), 1);
        assert!(diags.messages()[0].text.contains("0x800"));
    }

    #[test]
    fn invocation_message_includes_token() {
        let mut diags = Diagnostics::new();
        diags.set_trace_names(vec!["probe".into()]);
        trace_invocation(&mut diags, Location::new("t.fth", 3), "probe", Some(0x047));
        assert!(diags.messages()[0].text.contains("Invoking probe"));
        assert!(diags.messages()[0].text.contains("0x047"));
    }
}
