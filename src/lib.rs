//! FCode (IEEE 1275-1994 Open Firmware) tokenizer and detokenizer core.
//!
//! This crate implements the compile side (source Forth-like text to an
//! FCode byte stream) and the decompile side (an FCode byte stream back to
//! readable text), plus the PCI expansion-ROM image assembly the tokenizer
//! can target. The `toke` and `detok` binaries are thin CLI wrappers around
//! [`Tokenizer`] and [`detok::Detokenizer`]; everything else here is usable
//! as a library.

mod bits;
pub mod conditl;
pub mod config;
pub mod detok;
pub mod devnode;
pub mod diag;
pub mod emit;
pub mod fcode_alloc;
pub mod flow;
pub mod locals;
pub mod reader;
pub mod scanner;
pub mod tables;
pub mod tokenizer;
pub mod tokzesc;
pub mod trace;
pub mod pci;
pub mod vocab;

pub use self::config::Config;
pub use self::detok::Detokenizer;
pub use self::diag::{Diagnostics, FatalError, Severity};
pub use self::tokenizer::Tokenizer;
