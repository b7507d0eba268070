//! End-to-end coverage across crate boundaries: tokenize a small source,
//! feed the result back through the detokenizer, and check the PCI image
//! assembler against the detokenizer's own header parser.

use fcode_tools::detok::Detokenizer;
use fcode_tools::{Config, Tokenizer};

fn tokenize(source: &str) -> (Vec<u8>, Tokenizer) {
    let mut tok = Tokenizer::new(Config::default(), "test.fth");
    tok.push_source(source.as_bytes().to_vec(), "test.fth");
    tok.compile().expect("compile should not hit a fatal error");
    let bytes = tok.emitter.bytes().to_vec();
    (bytes, tok)
}

#[test]
fn tokenizing_a_trivial_definition_produces_no_errors() {
    let (_, tok) = tokenize(": double dup + ;");
    assert_eq!(tok.diags.error_count(), 0, "{:?}", tok.diags.messages());
}

#[test]
fn tokenized_output_detokenizes_back_to_recognizable_words() {
    let (bytes, tok) = tokenize(": double dup + ;");
    assert_eq!(tok.diags.error_count(), 0);

    let mut detok = Detokenizer::new(Config::default());
    let lines = detok.decode(&bytes);
    let joined: String = lines.iter().map(|l| l.text.clone()).collect::<Vec<_>>().join("\n");

    assert!(joined.contains("start1"));
    assert!(joined.contains("dup"));
    assert!(joined.contains("end0"));
}

#[test]
fn unknown_word_is_reported_as_an_error_and_blocks_a_clean_compile() {
    let mut tok = Tokenizer::new(Config::default(), "bad.fth");
    tok.push_source(b"totally-unknown-word".to_vec(), "bad.fth");
    tok.compile().expect("an unknown word is an Error, not a Fatal");
    assert!(tok.diags.had_errors());
}

#[test]
fn conditional_compilation_hides_unresolved_words_when_false() {
    // `[if]` with nothing pushed onto the escape-interpreter stack defaults
    // to not-taken, so the guarded unknown word must never reach
    // vocabulary lookup, while the `[else]` arm still compiles normally.
    let mut tok = Tokenizer::new(Config::default(), "cond.fth");
    tok.push_source(
        b"[if] nonexistent-but-should-be-skipped [else] dup [then]".to_vec(),
        "cond.fth",
    );
    tok.compile().unwrap();
    assert_eq!(tok.diags.error_count(), 0, "{:?}", tok.diags.messages());
}

#[test]
fn device_node_words_are_not_visible_outside_their_node() {
    let mut tok = Tokenizer::new(Config::default(), "dev.fth");
    tok.push_source(
        b"new-device : only-here dup ; finish-device only-here".to_vec(),
        "dev.fth",
    );
    tok.compile().unwrap();
    assert!(tok.diags.had_errors(), "a finished device-node's words must not leak to the parent");
}

#[test]
fn pci_image_round_trips_through_the_detokenizer_header_parser() {
    use fcode_tools::pci::{assemble_image, CodeType, PciImageParams};

    let params = PciImageParams {
        vendor_id: 0x10ee,
        device_id: 0x1234,
        class_code: 0x020000,
        code_type: CodeType::OpenFirmware,
        code_revision: 1,
        image_revision: 0,
        vpd_pointer: 0,
        is_last_image: true,
    };
    let (fcode_bytes, _) = tokenize(": probe dup ;");
    let image = assemble_image(&params, &fcode_bytes);

    let mut detok = Detokenizer::new(Config::default());
    let lines = detok.decode(&image);
    let joined: String = lines.iter().map(|l| l.text.clone()).collect::<Vec<_>>().join("\n");
    assert!(joined.contains("vendor=0x10ee"));
    assert!(joined.contains("device=0x1234"));
    assert!(joined.contains("last-image=true"));
}

#[test]
fn user_fcode_table_overrides_the_standard_name() {
    use fcode_tools::detok::dictionary::UserFcodeTable;

    let (bytes, tok) = tokenize(": double dup + ;");
    assert_eq!(tok.diags.error_count(), 0);

    let mut config = Config::default();
    config.verbose = true;
    let mut detok = Detokenizer::new(config);

    let mut table = UserFcodeTable::new();
    table.load("0x47 my-dup-name\n", "vendor.fc", &mut detok.diags);
    detok.user_tokens = table;

    let lines = detok.decode(&bytes);
    let joined: String = lines.iter().map(|l| l.text.clone()).collect::<Vec<_>>().join("\n");
    assert!(joined.contains("my-dup-name"));
}
