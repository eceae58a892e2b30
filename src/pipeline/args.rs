// In: src/pipeline/args.rs

//! Per-stage arguments inside a pipeline description.
//!
//! A segment is either a bare stage identifier or an identifier followed by a
//! parenthesized, comma-separated argument list:
//!
//! ```text
//! rmbkg(epsilon=5)->shuffle->zstd(level=9)
//! ```
//!
//! Arguments are `key=value` pairs; a bare `key` has an empty value. They are
//! borrowed straight out of the pipeline text, which is written into the
//! header unchanged, so a decoder rebuilds exactly the stage configuration the
//! encoder used. Nothing in this module allocates.

/// The argument list of one segment, borrowed from the pipeline text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageArgs<'a> {
    text: &'a str,
}

impl<'a> StageArgs<'a> {
    /// Wraps the text between the parentheses. An empty text means no arguments.
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The `(key, value)` pairs in the order written.
    pub fn pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let text = self.text;
        text.split(',')
            .filter(move |_| !text.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
    }

    /// The value of the first pair named `key`.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Splits one segment into its identifier and arguments.
///
/// The error is a short reason suitable for an `InvalidPipeline` message.
pub fn split_segment(segment: &str) -> Result<(&str, StageArgs<'_>), &'static str> {
    let Some(open) = segment.find('(') else {
        if segment.contains(')') {
            return Err("unbalanced ')'");
        }
        return Ok((segment, StageArgs::default()));
    };

    let id = &segment[..open];
    let Some(inner) = segment[open + 1..].strip_suffix(')') else {
        return Err("argument list must close with ')' at the end of the segment");
    };
    if id.is_empty() {
        return Err("missing stage identifier before '('");
    }
    if inner.is_empty() {
        return Err("empty argument list");
    }
    if inner.contains(['(', ')']) {
        return Err("nested parentheses in argument list");
    }

    let args = StageArgs::new(inner);
    if args.pairs().any(|(key, _)| key.is_empty()) {
        return Err("argument with an empty key");
    }
    Ok((id, args))
}
