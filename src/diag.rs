//! Error/message subsystem (spec.md §7).
//!
//! Diagnostics in this tokenizer/detokenizer are not exceptions: most of
//! them are recorded and compilation continues, so a single pass can
//! surface every problem in the source rather than stopping at the first
//! one. `Diagnostics` is the accumulating sink; `Severity` carries the
//! user-visible prefix and effect on the exit code.

use std::fmt;

/// One of the five severities named in spec.md §7, plus `Tracer` for
/// symbol-trace output (spec.md §4.? / the `tracesyms` subsystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    UserMessage,
    Warning,
    TkError,
    Fatal,
    Tracer,
}

impl Severity {
    /// The printed prefix from the table in spec.md §7. `UserMessage` has
    /// no fixed prefix: its text is whatever `[MESSAGE]` supplied.
    pub fn prefix(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::UserMessage => "",
            Severity::Warning => "Warning",
            Severity::TkError => "Error",
            Severity::Fatal => "Fatal",
            Severity::Tracer => "Trace-Note",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Where in the source a message originates, plus the definitional context
/// spec.md §7 requires ("in the current device-node, which began ...", "in
/// definition of X").
#[derive(Debug, Clone)]
pub struct Location {
    pub file: String,
    pub line: u32,
    /// Extra context describing the enclosing definition or device node,
    /// e.g. `"in definition of foo"` or `"in device-node opened at line 12"`.
    pub context: Option<String>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Location {
            file: file.into(),
            line,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({ctx})")?;
        }
        Ok(())
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone)]
pub struct Message {
    pub severity: Severity,
    pub location: Location,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.severity.prefix().is_empty() {
            write!(f, "{}: {}", self.location, self.text)
        } else {
            write!(
                f,
                "{}: {}: {}",
                self.location,
                self.severity.prefix(),
                self.text
            )
        }
    }
}

/// Raised (as a real `panic`-free `Result::Err`) the moment a `Fatal`
/// message is pushed. The core never calls `std::process::exit` itself;
/// the binaries translate this into exit code 2 (spec.md §6.4/§6.5).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct FatalError(pub Message);

/// Accumulating diagnostic sink for one compilation unit (or one
/// detokenizer run).
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Message>,
    errors: u32,
    warnings: u32,
    trace_names: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names registered via `-T` (spec.md §6.4); only trace messages for
    /// these names are recorded/emitted.
    pub fn set_trace_names(&mut self, names: Vec<String>) {
        self.trace_names = names;
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.trace_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Record a message. Returns `Err(FatalError)` iff `severity` is
    /// `Fatal`, so a call site can propagate with `?` when it must not
    /// continue (spec.md §7: "Fatal is the only severity that aborts
    /// mid-stream").
    pub fn push(
        &mut self,
        severity: Severity,
        location: Location,
        text: impl Into<String>,
    ) -> Result<(), FatalError> {
        let msg = Message {
            severity,
            location,
            text: text.into(),
        };
        match severity {
            Severity::TkError => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            _ => {}
        }
        let fatal = matches!(severity, Severity::Fatal);
        self.messages.push(msg.clone());
        if fatal {
            Err(FatalError(msg))
        } else {
            Ok(())
        }
    }

    pub fn info(&mut self, location: Location, text: impl Into<String>) {
        let _ = self.push(Severity::Info, location, text);
    }

    pub fn warning(&mut self, location: Location, text: impl Into<String>) {
        let _ = self.push(Severity::Warning, location, text);
    }

    pub fn error(&mut self, location: Location, text: impl Into<String>) {
        let _ = self.push(Severity::TkError, location, text);
    }

    pub fn fatal(&mut self, location: Location, text: impl Into<String>) -> FatalError {
        self.push(Severity::Fatal, location, text).unwrap_err()
    }

    pub fn user_message(&mut self, location: Location, text: impl Into<String>) {
        let _ = self.push(Severity::UserMessage, location, text);
    }

    pub fn trace(&mut self, name: &str, location: Location, text: impl Into<String>) {
        if self.is_traced(name) {
            let _ = self.push(Severity::Tracer, location, text);
        }
    }

    pub fn error_count(&self) -> u32 {
        self.errors
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings
    }

    /// Whether the error count gates the output (spec.md §7: "a non-zero
    /// count means the output buffer is discarded... even if otherwise
    /// valid bytes were produced").
    pub fn had_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The process exit code implied by the accumulated diagnostics
    /// (spec.md §6.4): 0 on success, 1 if any `TkError` was recorded.
    /// `Fatal` exits immediately via `FatalError` and is not represented
    /// here.
    pub fn exit_code(&self) -> i32 {
        if self.had_errors() { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_short_circuits() {
        let mut diags = Diagnostics::new();
        let err = diags.push(Severity::Fatal, Location::new("f.fth", 3), "boom");
        assert!(err.is_err());
        assert_eq!(diags.exit_code(), 0); // fatal isn't counted as TkError
    }

    #[test]
    fn error_gates_output() {
        let mut diags = Diagnostics::new();
        diags.error(Location::new("f.fth", 1), "unknown word: frob");
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.exit_code(), 1);
    }

    #[test]
    fn trace_only_for_named_symbols() {
        let mut diags = Diagnostics::new();
        diags.set_trace_names(vec!["foo".into()]);
        diags.trace("foo", Location::new("f.fth", 1), "defined");
        diags.trace("bar", Location::new("f.fth", 2), "defined");
        let traces: Vec<_> = diags
            .messages()
            .iter()
            .filter(|m| m.severity == Severity::Tracer)
            .collect();
        assert_eq!(traces.len(), 1);
    }
}
