//! Source reader and file stack (spec.md §4.1).
//!
//! The core only consumes an in-memory byte buffer per frame; raw file I/O
//! and include-path search are named Non-goals (spec.md §1) and live
//! outside this crate (the `toke` binary reads the file and `-I` search
//! path itself and hands `SourceStack::push_file` the resulting bytes).
//! What belongs to the core is the *stack* of frames and the resumption
//! protocol: nested substitution for macro bodies, `fload`, and internally
//! synthesized strings (e.g. the body of a `tokenizer[` literal handed back
//! to normal-mode compilation).

/// What to do when a frame is popped off the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    /// Nothing; the frame was pure in-memory text (an `fload`d file or a
    /// macro body).
    None,
    /// Restore the named macro's active behavior, undoing the recursion
    /// guard that was installed while the macro's body was being expanded
    /// (spec.md §4.1: "restore a traced macro's active function after
    /// recursion protection replaced it").
    RestoreMacro(String),
}

/// One entry in the source-frame stack.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub buffer: Vec<u8>,
    pub pos: usize,
    pub file: String,
    pub line: u32,
    pub resume: ResumeAction,
    /// True if this frame's end-of-file should cause the *next* call to
    /// `get_word` to return `None` without consuming input from the frame
    /// beneath it (spec.md §4.1: "this is how end-of-file inside an
    /// FLOADed file is distinguished from end-of-file in the primary
    /// input without corrupting cross-file lexeme boundaries").
    pub pause_before_pop: bool,
    /// True once this frame has reached its own end and is merely
    /// sitting in the stack to deliver the one required "pause" before it
    /// is actually popped.
    exhausted: bool,
}

impl SourceFrame {
    pub fn new(buffer: Vec<u8>, file: impl Into<String>) -> Self {
        SourceFrame {
            buffer,
            pos: 0,
            file: file.into(),
            line: 1,
            resume: ResumeAction::None,
            pause_before_pop: false,
            exhausted: false,
        }
    }

    pub fn with_resume(mut self, resume: ResumeAction) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_pause_before_pop(mut self, pause: bool) -> Self {
        self.pause_before_pop = pause;
        self
    }

    fn peek_byte(&self) -> Option<u8> {
        self.buffer.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buffer.len()
    }
}

/// Maximum token length, documented as 1024 minus 1 (spec.md §4.2).
pub const MAX_TOKEN_LEN: usize = 1023;

/// A pending "pause" marker: the caller asked for a word and got empty
/// because a frame with `pause_before_pop` just ran dry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WordResult {
    Word(String),
    /// End of the frame that was marked `pause_before_pop`; the *next*
    /// call resumes in the parent frame.
    Paused,
    /// True end of input: no frames remain.
    Eof,
}

pub struct SourceStack {
    frames: Vec<SourceFrame>,
    /// `ResumeAction`s shed by frames popped during the last
    /// `get_word`/`get_word_in_line` call, waiting to be drained by the
    /// dispatcher (this module has no notion of the vocabulary a
    /// `RestoreMacro` would restore into).
    pending_resumes: Vec<ResumeAction>,
}

impl SourceStack {
    pub fn new() -> Self {
        SourceStack { frames: Vec::new(), pending_resumes: Vec::new() }
    }

    pub fn push_source(&mut self, frame: SourceFrame) {
        self.frames.push(frame);
    }

    /// Pop the current frame, queuing its resume action for the next
    /// `take_pending_resumes` drain.
    fn pop_frame(&mut self) {
        if let Some(f) = self.frames.pop() {
            if f.resume != ResumeAction::None {
                self.pending_resumes.push(f.resume);
            }
        }
    }

    /// Drain the resume actions queued by frames popped since the last
    /// drain, in the order their frames were popped.
    pub fn take_pending_resumes(&mut self) -> Vec<ResumeAction> {
        std::mem::take(&mut self.pending_resumes)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_file(&self) -> &str {
        self.frames.last().map(|f| f.file.as_str()).unwrap_or("<none>")
    }

    pub fn current_line(&self) -> u32 {
        self.frames.last().map(|f| f.line).unwrap_or(0)
    }

    fn is_whitespace(b: u8) -> bool {
        matches!(b, b' ' | b'\t' | b'\r' | b'\n')
    }

    /// Advance past whitespace in the current (topmost) frame, returning
    /// `true` if it ran off the end of the buffer.
    fn skip_whitespace(frame: &mut SourceFrame) -> bool {
        while let Some(b) = frame.peek_byte() {
            if b == b'\n' {
                frame.line += 1;
                frame.pos += 1;
            } else if Self::is_whitespace(b) {
                frame.pos += 1;
            } else {
                break;
            }
        }
        frame.at_end()
    }

    /// Core word-scanning step, shared by `get_word` / `get_word_in_line`.
    /// `stop_at_newline` implements `get_word_in_line`'s "fails if the
    /// token is not on the same line" by refusing to cross a `\n` while
    /// skipping leading whitespace.
    fn next_word_in_current_frame(&mut self, stop_at_newline: bool) -> WordResult {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return WordResult::Eof;
            };
            if frame.exhausted {
                // This frame already delivered its pause; pop for real now.
                self.pop_frame();
                continue;
            }
            if stop_at_newline {
                // Peek whitespace without crossing a newline.
                let mut p = frame.pos;
                while let Some(&b) = frame.buffer.get(p) {
                    if b == b'\n' {
                        return WordResult::Eof; // no token left on this line
                    } else if Self::is_whitespace(b) {
                        p += 1;
                    } else {
                        break;
                    }
                }
                frame.pos = p;
                if frame.at_end() {
                    return WordResult::Eof;
                }
            } else {
                let ran_dry = Self::skip_whitespace(frame);
                if ran_dry {
                    if frame.pause_before_pop && !frame.exhausted {
                        frame.exhausted = true;
                        return WordResult::Paused;
                    }
                    self.pop_frame();
                    continue;
                }
            }
            let frame = self.frames.last_mut().expect("frame present after whitespace skip");
            let mut word = String::new();
            while let Some(b) = frame.peek_byte() {
                if Self::is_whitespace(b) {
                    break;
                }
                word.push(b as char);
                frame.pos += 1;
                if word.len() >= MAX_TOKEN_LEN {
                    break;
                }
            }
            return WordResult::Word(word);
        }
    }

    /// Next whitespace-delimited token from anywhere in the frame stack,
    /// popping exhausted frames (honoring `pause_before_pop`) as needed.
    pub fn get_word(&mut self) -> Option<String> {
        match self.next_word_in_current_frame(false) {
            WordResult::Word(w) => Some(w),
            WordResult::Paused | WordResult::Eof => None,
        }
    }

    /// Same as `get_word`, but returns `None` if the next token is not on
    /// the current line (used by directives like `d#` that must see their
    /// operand before end-of-line).
    pub fn get_word_in_line(&mut self) -> Option<String> {
        match self.next_word_in_current_frame(true) {
            WordResult::Word(w) => Some(w),
            _ => None,
        }
    }

    /// The remainder of the current line, raw (whitespace preserved), not
    /// counting leading whitespace. Returns `None` if nothing but
    /// whitespace remains before the newline or end of input (`macro`
    /// definitions and a few other same-line directives use this to grab
    /// their free-form text tail; `toke/scanner.c`'s `get_rest_of_line`).
    pub fn get_rest_of_line(&mut self) -> Option<String> {
        let frame = self.frames.last_mut()?;
        let save_pos = frame.pos;
        let save_line = frame.line;
        let ran_dry = Self::skip_whitespace(frame);
        if ran_dry || frame.line != save_line {
            frame.pos = save_pos;
            frame.line = save_line;
            return None;
        }
        let bytes = self.get_until(b'\n')?;
        if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    /// Raw copy up to (and consuming) the delimiter byte `delim`, used by
    /// string/comment scanning which needs characters the whitespace
    /// tokenizer would otherwise split on.
    pub fn get_until(&mut self, delim: u8) -> Option<Vec<u8>> {
        let frame = self.frames.last_mut()?;
        let mut out = Vec::new();
        while let Some(b) = frame.peek_byte() {
            frame.pos += 1;
            if b == b'\n' {
                frame.line += 1;
            }
            if b == delim {
                return Some(out);
            }
            out.push(b);
        }
        Some(out)
    }

    /// Peek the next raw byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.frames.last().and_then(|f| f.peek_byte())
    }

    /// Consume one raw byte, tracking line numbers.
    pub fn next_byte(&mut self) -> Option<u8> {
        let frame = self.frames.last_mut()?;
        let b = frame.peek_byte()?;
        frame.pos += 1;
        if b == b'\n' {
            frame.line += 1;
        }
        Some(b)
    }
}

impl Default for SourceStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_word_scanning() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"  hello   world\n".to_vec(), "t.fth"));
        assert_eq!(s.get_word().as_deref(), Some("hello"));
        assert_eq!(s.get_word().as_deref(), Some("world"));
        assert_eq!(s.get_word(), None);
    }

    #[test]
    fn line_tracking() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"a\nb\nc".to_vec(), "t.fth"));
        assert_eq!(s.get_word().as_deref(), Some("a"));
        assert_eq!(s.current_line(), 2);
        assert_eq!(s.get_word().as_deref(), Some("b"));
        assert_eq!(s.current_line(), 3);
        assert_eq!(s.get_word().as_deref(), Some("c"));
    }

    #[test]
    fn nested_frame_resumes_parent() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"outer-before outer-after".to_vec(), "main.fth"));
        // Simulate a macro expansion: consume "outer-before", then push a
        // nested frame for the macro body.
        assert_eq!(s.get_word().as_deref(), Some("outer-before"));
        s.push_source(SourceFrame::new(b"inner-word".to_vec(), "<macro>"));
        assert_eq!(s.get_word().as_deref(), Some("inner-word"));
        assert_eq!(s.get_word().as_deref(), Some("outer-after"));
    }

    #[test]
    fn pause_before_pop_hides_one_eof() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"base".to_vec(), "main.fth"));
        s.push_source(
            SourceFrame::new(b"included".to_vec(), "inc.fth").with_pause_before_pop(true),
        );
        assert_eq!(s.get_word().as_deref(), Some("included"));
        // First call after exhausting the fload'd frame pauses...
        assert_eq!(s.get_word(), None);
        // ...and only the next call resumes in the parent frame.
        assert_eq!(s.get_word().as_deref(), Some("base"));
    }

    #[test]
    fn get_word_in_line_refuses_to_cross_newline() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"d#\n10".to_vec(), "t.fth"));
        assert_eq!(s.get_word().as_deref(), Some("d#"));
        assert_eq!(s.get_word_in_line(), None);
    }

    #[test]
    fn get_rest_of_line_captures_trailing_text_verbatim() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"[macro] 1+  1 +  \nnext-line".to_vec(), "t.fth"));
        assert_eq!(s.get_word().as_deref(), Some("[macro]"));
        assert_eq!(s.get_word_in_line().as_deref(), Some("1+"));
        assert_eq!(s.get_rest_of_line().as_deref(), Some("1 +  "));
        assert_eq!(s.get_word().as_deref(), Some("next-line"));
    }

    #[test]
    fn get_rest_of_line_is_none_when_only_whitespace_remains() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"name   \nbody".to_vec(), "t.fth"));
        assert_eq!(s.get_word().as_deref(), Some("name"));
        assert_eq!(s.get_rest_of_line(), None);
        assert_eq!(s.get_word().as_deref(), Some("body"));
    }

    #[test]
    fn popped_frame_s_resume_action_is_queued_for_the_dispatcher() {
        let mut s = SourceStack::new();
        s.push_source(SourceFrame::new(b"outer".to_vec(), "main.fth"));
        s.push_source(
            SourceFrame::new(b"inner".to_vec(), "<macro>")
                .with_resume(ResumeAction::RestoreMacro("1+".to_string())),
        );
        assert_eq!(s.get_word().as_deref(), Some("inner"));
        assert!(s.take_pending_resumes().is_empty());
        assert_eq!(s.get_word().as_deref(), Some("outer"));
        assert_eq!(s.take_pending_resumes(), vec![ResumeAction::RestoreMacro("1+".to_string())]);
    }
}
