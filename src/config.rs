//! Single configuration record, replacing the C program's global flags
//! (spec.md §9, "Global flags as configuration"). Constructed once per run
//! by the CLI layer and threaded through the core by reference; never
//! global or thread-local state, per the core's single-threaded,
//! single-compilation-unit model (spec.md §5).

/// Flags shared by both the tokenizer and the detokenizer core, with the
/// C program's defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub verbose: bool,
    pub decode_all: bool,
    pub obso_fcode_warning: bool,
    pub ibm_locals: bool,
    pub ibm_locals_legacy_separator: bool,
    pub string_remark_escape: bool,
    pub c_style_string_escape: bool,
    pub sun_style_abort_quote: bool,
    pub abort_quote_throw: bool,
    pub enable_abort_quote: bool,
    pub hex_remark_escape: bool,
    pub big_end_pci_image_rev: bool,
    pub always_headers: bool,
    pub always_external: bool,
    pub force_tokens_case: bool,
    pub force_lower_case_tokens: bool,
    pub verbose_dup_warning: bool,
    pub allow_ret_stk_interp: bool,
    pub scope_is_global: bool,
    pub noerrors: bool,

    /// `-I` include-path search list (hand to the abstract source reader).
    pub include_paths: Vec<String>,
    /// `-d NAME[=VAL]` pre-definitions consumed by `[DEFINED]`.
    pub predefined: Vec<(String, Option<String>)>,
    /// `-T NAME` symbol trace list.
    pub trace_names: Vec<String>,
    /// `-o FILE` tokenizer output path / detokenizer n/a.
    pub output_path: Option<String>,

    /// Detokenizer-only: `-a`, continue past `end0`.
    pub continue_past_end0: bool,
    /// Detokenizer-only: `-n`, show line numbers.
    pub show_line_numbers: bool,
    /// Detokenizer-only: `-o`, show byte offsets (supersedes `-n`).
    pub show_byte_offsets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            decode_all: false,
            obso_fcode_warning: false,
            ibm_locals: false,
            ibm_locals_legacy_separator: false,
            string_remark_escape: false,
            c_style_string_escape: false,
            sun_style_abort_quote: false,
            abort_quote_throw: false,
            enable_abort_quote: true,
            hex_remark_escape: false,
            big_end_pci_image_rev: false,
            always_headers: false,
            always_external: false,
            force_tokens_case: false,
            force_lower_case_tokens: false,
            verbose_dup_warning: false,
            allow_ret_stk_interp: false,
            scope_is_global: false,
            noerrors: false,
            include_paths: Vec::new(),
            predefined: Vec::new(),
            trace_names: Vec::new(),
            output_path: None,
            continue_past_end0: false,
            show_line_numbers: false,
            show_byte_offsets: false,
        }
    }
}

impl Config {
    pub fn is_predefined(&self, name: &str) -> bool {
        self.predefined
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}
