//! Text Preprocessor
//!
//! A line-syntactic scanner that finds directive lines in raw shader text,
//! dispatches them to registered handlers and assembles the final source as an
//! ordered list of [`Segment`]s.
//!
//! # Segments
//!
//! Text is never copied while scanning. Every buffer handed to the
//! preprocessor (the root file, each included file, synthesized prelude text)
//! is owned by it and addressed by a [`BufferId`]. A segment is a buffer id
//! plus a byte range, so the segment list stays valid independently of the
//! call stack that produced it.
//!
//! Concatenating all segments in order yields the preprocessed source: every
//! *handled* directive line removed, every included file spliced in at the
//! point of its directive. Directives without a registered handler go to the
//! fallback handler and remain part of the text (`#version`, `#define`,
//! `#ifdef` ... are left for the real compiler).
//!
//! # Directive detection
//!
//! A line is a directive line when its first non-blank character is `#`.
//! Comments and strings are not tracked; `#` inside a block comment that
//! starts a line is still treated as a directive.
//!
//! # Errors
//!
//! Handlers report failures through [`Preprocessor::set_error`]. The flag is
//! checked before and after every dispatch; once set, the current buffer (and
//! every enclosing one) stops producing segments.

pub mod include;

use std::ops::Range;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::ShaderError;

/// Index of a buffer owned by a [`Preprocessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u32);

impl BufferId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A slice of one owned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub buffer: BufferId,
    pub range: Range<usize>,
}

#[derive(Debug)]
struct SourceBuffer {
    name: String,
    text: String,
    synthesized: bool,
}

/// Location of a directive handed to its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveContext {
    /// Buffer containing the directive.
    pub buffer: BufferId,
    /// Byte range of the whole line, without its newline.
    pub line: Range<usize>,
    /// Byte range of the directive keyword (after `#`).
    pub keyword: Range<usize>,
    /// 1-based line number inside the buffer.
    pub line_number: usize,
}

/// Handler invoked for a directive. Receives the directive table so it can
/// recurse into [`Preprocessor::process`].
pub type DirectiveFn<S> = fn(&mut S, &mut Preprocessor, &Directives<S>, &DirectiveContext);

/// Hook bracketing the processing of one buffer.
pub type HookFn<S> = fn(&mut S, &mut Preprocessor, BufferId);

/// Directive name → handler table, plus fallback and begin/end hooks.
pub struct Directives<S> {
    handlers: FxHashMap<String, DirectiveFn<S>>,
    fallback: DirectiveFn<S>,
    begin: Option<HookFn<S>>,
    end: Option<HookFn<S>>,
}

fn ignore_directive<S>(_: &mut S, _: &mut Preprocessor, _: &Directives<S>, _: &DirectiveContext) {
}

impl<S> Default for Directives<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Directives<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: FxHashMap::default(),
            fallback: ignore_directive::<S>,
            begin: None,
            end: None,
        }
    }

    /// Registers `handler` for `#name`. Lines it handles are excised.
    #[must_use]
    pub fn with(mut self, name: &str, handler: DirectiveFn<S>) -> Self {
        self.handlers.insert(name.to_owned(), handler);
        self
    }

    /// Replaces the handler run for unregistered directives. The line is kept.
    #[must_use]
    pub fn with_fallback(mut self, handler: DirectiveFn<S>) -> Self {
        self.fallback = handler;
        self
    }

    #[must_use]
    pub fn on_begin(mut self, hook: HookFn<S>) -> Self {
        self.begin = Some(hook);
        self
    }

    #[must_use]
    pub fn on_end(mut self, hook: HookFn<S>) -> Self {
        self.end = Some(hook);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<DirectiveFn<S>> {
        self.handlers.get(name).copied()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

/// Owns the buffers of one compilation and the segments assembled from them.
#[derive(Debug, Default)]
pub struct Preprocessor {
    buffers: Vec<SourceBuffer>,
    segments: Vec<Segment>,
    error: Option<ShaderError>,
}

impl Preprocessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `text` and returns its id. Nothing is emitted until
    /// the buffer is processed.
    pub fn add_buffer(&mut self, name: impl Into<String>, text: impl Into<String>) -> BufferId {
        self.push_buffer(name.into(), text.into(), false)
    }

    /// Appends synthesized text (prelude lines) directly to the output.
    pub fn inject(&mut self, name: impl Into<String>, text: impl Into<String>) -> BufferId {
        let id = self.push_buffer(name.into(), text.into(), true);
        let len = self.buffers[id.index()].text.len();
        self.push_segment(id, 0..len);
        id
    }

    fn push_buffer(&mut self, name: String, text: String, synthesized: bool) -> BufferId {
        let id = BufferId(u32::try_from(self.buffers.len()).unwrap_or(u32::MAX));
        self.buffers.push(SourceBuffer {
            name,
            text,
            synthesized,
        });
        id
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn buffer_name(&self, id: BufferId) -> &str {
        &self.buffers[id.index()].name
    }

    #[must_use]
    pub fn text(&self, id: BufferId) -> &str {
        &self.buffers[id.index()].text
    }

    #[must_use]
    pub fn is_synthesized(&self, id: BufferId) -> bool {
        self.buffers[id.index()].synthesized
    }

    /// Text following the directive keyword up to the end of the line.
    #[must_use]
    pub fn directive_argument(&self, ctx: &DirectiveContext) -> &str {
        &self.text(ctx.buffer)[ctx.keyword.end..ctx.line.end]
    }

    #[must_use]
    pub fn directive_name(&self, ctx: &DirectiveContext) -> &str {
        &self.text(ctx.buffer)[ctx.keyword.clone()]
    }

    /// Records the first error; later errors are dropped.
    pub fn set_error(&mut self, error: ShaderError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn take_error(&mut self) -> Option<ShaderError> {
        self.error.take()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn segment_str(&self, segment: &Segment) -> &str {
        &self.text(segment.buffer)[segment.range.clone()]
    }

    /// Borrowed views of all segments, in output order.
    #[must_use]
    pub fn segment_strs(&self) -> SmallVec<[&str; 16]> {
        self.segments.iter().map(|s| self.segment_str(s)).collect()
    }

    /// Concatenates all segments into one string.
    #[must_use]
    pub fn assemble(&self) -> String {
        let len = self.segments.iter().map(|s| s.range.len()).sum();
        let mut out = String::with_capacity(len);
        for segment in &self.segments {
            out.push_str(self.segment_str(segment));
        }
        out
    }

    fn push_segment(&mut self, buffer: BufferId, range: Range<usize>) {
        if !range.is_empty() {
            self.segments.push(Segment { buffer, range });
        }
    }

    /// Scans `buffer`, dispatching directives and emitting segments.
    ///
    /// Before a registered handler runs, the text preceding its line is
    /// flushed, so segments produced by a recursive call land after it.
    pub fn process<S>(&mut self, buffer: BufferId, directives: &Directives<S>, state: &mut S) {
        if self.has_error() {
            return;
        }
        if let Some(begin) = directives.begin {
            begin(state, self, buffer);
        }

        let len = self.text(buffer).len();
        let mut pending = 0;
        let mut pos = 0;
        let mut line_number = 1;

        while pos < len {
            let text = self.text(buffer);
            let line_end = text[pos..].find('\n').map_or(len, |offset| pos + offset);
            let next = if line_end < len { line_end + 1 } else { len };

            if let Some(keyword) = scan_directive(text, pos, line_end) {
                let handler = directives.get(&text[keyword.clone()]);
                let ctx = DirectiveContext {
                    buffer,
                    line: pos..line_end,
                    keyword,
                    line_number,
                };

                match handler {
                    Some(handler) => {
                        self.push_segment(buffer, pending..pos);
                        pending = next;
                        handler(state, self, directives, &ctx);
                    }
                    None => (directives.fallback)(state, self, directives, &ctx),
                }

                if self.has_error() {
                    break;
                }
            }

            pos = next;
            line_number += 1;
        }

        if !self.has_error() {
            self.push_segment(buffer, pending..len);
        }

        if let Some(end) = directives.end {
            end(state, self, buffer);
        }
    }
}

/// Returns the keyword range when `text[start..end]` is a directive line.
fn scan_directive(text: &str, start: usize, end: usize) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let is_blank = |b: u8| b == b' ' || b == b'\t';

    let mut i = start;
    while i < end && is_blank(bytes[i]) {
        i += 1;
    }
    if i >= end || bytes[i] != b'#' {
        return None;
    }
    i += 1;
    while i < end && is_blank(bytes[i]) {
        i += 1;
    }

    let keyword_start = i;
    while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    (i > keyword_start).then_some(keyword_start..i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, String, usize)>,
        opened: Vec<BufferId>,
        closed: Vec<BufferId>,
    }

    fn record(state: &mut Recorder, pp: &mut Preprocessor, _: &Directives<Recorder>, ctx: &DirectiveContext) {
        state.seen.push((
            pp.directive_name(ctx).to_owned(),
            pp.directive_argument(ctx).to_owned(),
            ctx.line_number,
        ));
    }

    fn fail(_: &mut Recorder, pp: &mut Preprocessor, _: &Directives<Recorder>, ctx: &DirectiveContext) {
        pp.set_error(ShaderError::IncludeNotFound(pp.directive_argument(ctx).trim().to_owned()));
    }

    #[test]
    fn test_no_directives_round_trip() {
        let source = "void main() {\n    gl_Position = vec4(0.0);\n}\n";
        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("plain.vert", source);
        pp.process(root, &Directives::<Recorder>::new(), &mut Recorder::default());

        assert_eq!(pp.segments().len(), 1);
        assert_eq!(pp.segment_str(&pp.segments()[0]), source);
        assert!(!pp.has_error());
    }

    #[test]
    fn test_handled_directive_line_is_excised() {
        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("a", "first\n  #custom <x>\nlast");
        let directives = Directives::new().with("custom", record);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert_eq!(pp.assemble(), "first\nlast");
        assert_eq!(pp.segments().len(), 2);
        assert_eq!(state.seen, vec![("custom".into(), " <x>".into(), 2)]);
    }

    #[test]
    fn test_unregistered_directive_goes_to_fallback_and_stays() {
        let mut pp = Preprocessor::new();
        let source = "#version 330\n#define X 1\nvoid main(){}\n";
        let root = pp.add_buffer("a", source);
        let directives = Directives::new().with_fallback(record);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert_eq!(pp.assemble(), source);
        assert_eq!(
            state.seen.iter().map(|(n, _, _)| n.as_str()).collect::<Vec<_>>(),
            ["version", "define"]
        );
    }

    #[test]
    fn test_hash_must_lead_the_line() {
        let mut pp = Preprocessor::new();
        let source = "float x; #custom\n// #custom is fine here\n";
        let root = pp.add_buffer("a", source);
        let directives = Directives::new().with("custom", record);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert!(state.seen.is_empty());
        assert_eq!(pp.assemble(), source);
    }

    #[test]
    fn test_space_between_hash_and_keyword() {
        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("a", "\t# custom \"f\"\nbody\n");
        let directives = Directives::new().with("custom", record);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert_eq!(pp.assemble(), "body\n");
        assert_eq!(state.seen[0].1, " \"f\"");
    }

    #[test]
    fn test_directive_on_last_line_without_newline() {
        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("a", "body\n#custom");
        let directives = Directives::new().with("custom", record);
        pp.process(root, &directives, &mut Recorder::default());

        assert_eq!(pp.assemble(), "body\n");
    }

    #[test]
    fn test_error_stops_processing() {
        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("a", "one\n#bad missing\ntwo\n#custom\nthree\n");
        let directives = Directives::new().with("bad", fail).with("custom", record);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert!(pp.has_error());
        assert!(state.seen.is_empty());
        assert_eq!(pp.assemble(), "one\n");
        assert!(matches!(pp.take_error(), Some(ShaderError::IncludeNotFound(name)) if name == "missing"));
    }

    #[test]
    fn test_first_error_wins() {
        let mut pp = Preprocessor::new();
        pp.set_error(ShaderError::IncludeNotFound("first".into()));
        pp.set_error(ShaderError::IncludeNotFound("second".into()));
        assert!(matches!(pp.take_error(), Some(ShaderError::IncludeNotFound(name)) if name == "first"));
    }

    #[test]
    fn test_hooks_bracket_each_buffer() {
        fn open(state: &mut Recorder, _: &mut Preprocessor, id: BufferId) {
            state.opened.push(id);
        }
        fn close(state: &mut Recorder, _: &mut Preprocessor, id: BufferId) {
            state.closed.push(id);
        }

        let mut pp = Preprocessor::new();
        let root = pp.add_buffer("a", "x\n");
        let directives = Directives::new().on_begin(open).on_end(close);
        let mut state = Recorder::default();
        pp.process(root, &directives, &mut state);

        assert_eq!(state.opened, vec![root]);
        assert_eq!(state.closed, vec![root]);
    }

    #[test]
    fn test_injected_text_precedes_processed_text() {
        let mut pp = Preprocessor::new();
        let prelude = pp.inject("<prelude>", "#version 450\n");
        let root = pp.add_buffer("a", "void main(){}");
        pp.process(root, &Directives::<Recorder>::new(), &mut Recorder::default());

        assert!(pp.is_synthesized(prelude));
        assert!(!pp.is_synthesized(root));
        assert_eq!(pp.assemble(), "#version 450\nvoid main(){}");
        assert_eq!(pp.segment_strs().as_slice(), ["#version 450\n", "void main(){}"]);
    }
}
