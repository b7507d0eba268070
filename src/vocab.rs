//! Vocabulary substrate (spec.md §2 component 4): Threaded Interpretive
//! Code (T.I.C.) style dictionary entries and the chains that hold them.
//!
//! The original C structure (`tic_hdr_t` in `ticvocab.h`) carries a raw
//! function pointer for "active processing" and another for behavior while
//! a conditional-compilation section is being ignored, plus a `fword_defr`
//! field that names the entry's Definer purely so error messages can say
//! "redefined, was a VALUE" — it is never used to pick which function
//! pointer to call. A typed port keeps that separation explicit instead of
//! collapsing it into one enum: `ActiveKind` is the real dispatch tag,
//! `Definer` is a diagnostics-only label, and `IgnoreClass` replaces the
//! second function pointer with a plain enum of the handful of skip-mode
//! behaviors conditional compilation actually needs (spec.md §2 component
//! 10's "ignore_fn dispatch").

use std::fmt;

use crate::diag::{Diagnostics, Location};

/// Diagnostic-only classification of what kind of FWord defined an entry.
/// Never used to choose behavior at call sites; see the module doc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definer {
    BuiltinFcode,
    Value,
    Variable,
    Constant,
    Defer,
    Create,
    Buffer,
    Field,
    Colon,
    Alias,
    Macro,
    Local,
    DeviceNodeOp,
}

impl fmt::Display for Definer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Definer::BuiltinFcode => "built-in FCode",
            Definer::Value => "VALUE",
            Definer::Variable => "VARIABLE",
            Definer::Constant => "CONSTANT",
            Definer::Defer => "DEFER",
            Definer::Create => "CREATE",
            Definer::Buffer => "BUFFER:",
            Definer::Field => "FIELD",
            Definer::Colon => ":",
            Definer::Alias => "ALIAS",
            Definer::Macro => "MACRO",
            Definer::Local => "local",
            Definer::DeviceNodeOp => "device-node operator",
        };
        f.write_str(s)
    }
}

/// The actual dispatch tag: what happens when this entry's name is seen in
/// active (non-ignored) compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveKind {
    /// Emit this entry's single-token FCode number directly.
    EmitToken(u16),
    /// Push a signed literal value (`VALUE`/`CONSTANT`-like behavior) --
    /// compiles a `b(lit)` of the stored number.
    PushLiteral(i64),
    /// Compiled as `b(to)` against the named VALUE's storage slot.
    StoreToValue,
    /// `VARIABLE`/`CREATE`/`BUFFER:`-style entry: compiles a reference to
    /// its own body offset.
    FetchBody { offset: u32 },
    /// User `:`-definition: emits its own assigned FCode number once
    /// compiled, same as `EmitToken`, but distinguished here so hide/reveal
    /// and self-recursion rules (spec.md component 9) apply.
    ColonWord(u16),
    /// Alias: behaves exactly as the entry it was made from; resolved via
    /// `VocabChain::resolve_alias` rather than stored redundantly here.
    Alias,
    /// Macro substitution: push the named macro body back onto the source
    /// stack instead of compiling anything directly.
    MacroExpand,
    /// IBM Local: compiled as a `{local}`-fetch or `{local}`-store,
    /// depending on whether `!`/`@` follows (decided by the locals module).
    LocalRef { index: u32 },
    /// Control-flow / device-node / FCode-range / conditional-compilation /
    /// tokenizer-escape keywords: dispatched by name in their owning
    /// modules rather than through the vocabulary, so the entry just
    /// records which family it belongs to for diagnostics and `also`-type
    /// introspection commands.
    Directive(&'static str),
}

/// What a name does when it's seen while a conditional-compilation `[IF]`
/// (or nested construct) is skipping tokens (spec.md component 10).
/// Most names need no special handling at all -- the scanner's normal
/// word-splitting is enough to step over them -- hence `None` is the
/// overwhelming common case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreClass {
    /// No special handling: the word itself is simply discarded.
    None,
    /// A string opener (`"`, `."`, `.(`, etc.): consume through the closing
    /// delimiter so embedded whitespace/tokens inside the string don't
    /// confuse the skip scan.
    ConsumeString,
    /// IBM Locals opener `{`: consume through the matching `}`.
    ConsumeLocalsDecl,
    /// A comment opener (`(`, `\`): consume through its own terminator.
    ConsumeComment,
    /// Nested `[IF]`/`#IF`: track the extra nesting level so the matching
    /// `[THEN]` is paired correctly while still skipping.
    NestedConditional,
    /// Nested `[ELSE]` inside a skipped block: decrements-then-checks like
    /// `NestedConditional` but never itself flips active/ignore state.
    NestedElse,
}

/// One parameter-field payload. Prefer a plain signed integer (`Int`) where
/// the original used `long`; the rest of the variants cover the other
/// concrete types `tic_param_t`'s union distinguished.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Int(i64),
    Text(String),
    /// Storage offset into the implicit "body" area for VARIABLE/CREATE/
    /// BUFFER:/FIELD entries.
    BodyOffset(u32),
    /// Index assigned to an IBM Local.
    LocalIndex(u32),
}

/// One vocabulary entry -- the Rust analogue of `tic_hdr_t`.
#[derive(Debug, Clone)]
pub struct TicEntry {
    pub name: String,
    pub active: ActiveKind,
    pub ignore: IgnoreClass,
    pub payload: Payload,
    pub definer: Definer,
    pub is_token: bool,
    pub tracing: bool,
    /// True if this entry is currently hidden from lookup (a colon
    /// definition hides its own name while compiling its body so that
    /// plain recursive use is an error unless `recurse`/`recursive` was
    /// used; spec.md component 9).
    pub hidden: bool,
    /// True if this entry is an alias that must never own/free payload
    /// data distinct from the entry it was aliased from (spec.md component
    /// 4: "alias semantics... never owns payload").
    pub is_alias: bool,
}

impl TicEntry {
    pub fn new(name: impl Into<String>, active: ActiveKind, definer: Definer) -> Self {
        TicEntry {
            name: name.into(),
            active,
            ignore: IgnoreClass::None,
            payload: Payload::None,
            definer,
            is_token: false,
            tracing: false,
            hidden: false,
            is_alias: false,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreClass) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn as_token(mut self) -> Self {
        self.is_token = true;
        self
    }
}

/// A singly linked, LIFO vocabulary chain: lookups scan from the most
/// recently added entry backward, so later definitions shadow earlier ones
/// with the same name (spec.md component 4: "singly linked LIFO,
/// case-insensitive lookup").
#[derive(Debug, Default)]
pub struct VocabChain {
    entries: Vec<TicEntry>,
}

impl VocabChain {
    pub fn new() -> Self {
        VocabChain { entries: Vec::new() }
    }

    pub fn add_entry(&mut self, entry: TicEntry) {
        self.entries.push(entry);
    }

    /// Add an entry, warning if a non-hidden entry of the same name already
    /// exists in this scope since the last `reset_to` (spec.md §8.1
    /// invariant 6). `overload` suppresses the warning for this one
    /// definition, matching `ticvocab.c`'s `OVERLOAD` directive.
    pub fn add_entry_checked(
        &mut self,
        entry: TicEntry,
        overload: bool,
        diags: &mut Diagnostics,
        loc: Location,
    ) {
        if !overload && self.exists(&entry.name) {
            diags.warning(loc, format!("redefined {}, was already defined", entry.name));
        }
        self.add_entry(entry);
    }

    /// Case-insensitive lookup, skipping hidden entries, most-recent first.
    pub fn lookup(&self, name: &str) -> Option<&TicEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.hidden && e.name.eq_ignore_ascii_case(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut TicEntry> {
        self.entries
            .iter_mut()
            .rev()
            .find(|e| !e.hidden && e.name.eq_ignore_ascii_case(name))
    }

    /// Same lookup but allowed to find hidden entries too (used by
    /// `recurse`/`recursive` inside a colon definition's own body).
    pub fn lookup_including_hidden(&self, name: &str) -> Option<&TicEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Hide the most recent entry with the given name (colon-definition
    /// self-reference guard, spec.md component 4).
    pub fn hide(&mut self, name: &str) {
        if let Some(e) = self.lookup_mut(name) {
            e.hidden = true;
        }
    }

    pub fn reveal(&mut self, name: &str) {
        if let Some(e) = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.hidden && e.name.eq_ignore_ascii_case(name))
        {
            e.hidden = false;
        }
    }

    /// Create an alias: a new entry with its own name but sharing the
    /// aliased entry's active behavior, ignore class, payload, is_token and
    /// definer. It never owns the payload independently -- `Payload`'s
    /// variants here are all `Clone`, so this is a value copy, not a shared
    /// pointer, but the C distinction ("must never free the pfield twice")
    /// has no analogue once ownership is by value.
    pub fn create_alias(&mut self, new_name: impl Into<String>, existing_name: &str) -> bool {
        let Some(src) = self.lookup(existing_name).cloned() else {
            return false;
        };
        let mut alias = TicEntry::new(new_name, src.active.clone(), src.definer);
        alias.ignore = src.ignore;
        alias.payload = src.payload.clone();
        alias.is_token = src.is_token;
        alias.is_alias = true;
        self.add_entry(alias);
        true
    }

    /// Marker position in the chain, for `reset_to` (used when leaving a
    /// device node's scope, spec.md component 5).
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn reset_to(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_most_recent_wins() {
        let mut v = VocabChain::new();
        v.add_entry(TicEntry::new("Foo", ActiveKind::EmitToken(1), Definer::BuiltinFcode));
        v.add_entry(TicEntry::new("foo", ActiveKind::EmitToken(2), Definer::BuiltinFcode));
        let found = v.lookup("FOO").unwrap();
        assert_eq!(found.active, ActiveKind::EmitToken(2));
    }

    #[test]
    fn hide_reveal_blocks_self_reference() {
        let mut v = VocabChain::new();
        v.add_entry(TicEntry::new("loop-forever", ActiveKind::ColonWord(0x800), Definer::Colon));
        v.hide("loop-forever");
        assert!(v.lookup("loop-forever").is_none());
        assert!(v.lookup_including_hidden("loop-forever").is_some());
        v.reveal("loop-forever");
        assert!(v.lookup("loop-forever").is_some());
    }

    #[test]
    fn alias_copies_behavior_without_sharing_storage() {
        let mut v = VocabChain::new();
        v.add_entry(
            TicEntry::new("original", ActiveKind::PushLiteral(42), Definer::Constant)
                .with_payload(Payload::Int(42)),
        );
        assert!(v.create_alias("copy", "original"));
        let alias = v.lookup("copy").unwrap();
        assert_eq!(alias.active, ActiveKind::PushLiteral(42));
        assert!(alias.is_alias);
        assert_eq!(alias.payload, Payload::Int(42));
    }

    #[test]
    fn reset_to_mark_discards_scoped_entries() {
        let mut v = VocabChain::new();
        v.add_entry(TicEntry::new("global-word", ActiveKind::EmitToken(1), Definer::BuiltinFcode));
        let mark = v.mark();
        v.add_entry(TicEntry::new("device-word", ActiveKind::EmitToken(2), Definer::BuiltinFcode));
        assert_eq!(v.len(), 2);
        v.reset_to(mark);
        assert_eq!(v.len(), 1);
        assert!(v.lookup("device-word").is_none());
        assert!(v.lookup("global-word").is_some());
    }
}
