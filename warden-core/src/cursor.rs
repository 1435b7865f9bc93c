//! Incremental, quote-aware tokenizer over raw command input.
//!
//! A [`TextCursor`] walks a single input string word by word. Every consuming call records the
//! position it started from so it can be reverted with [`TextCursor::undo`], and a cursor can be
//! cheaply [forked](TextCursor::fork) to try a speculative parse that is only
//! [committed](TextCursor::commit) if it succeeds.
//!
//! A character is escaped iff it is preceded by an odd number of consecutive backslashes.
//! Escaped whitespace does not split words and escaped quotes do not open or close quoted words.

use std::fmt::Display;
use std::sync::Arc;

/// Opening quote characters and the character that closes each of them.
const QUOTES: &[(char, char)] = &[
    ('"', '"'),
    ('\u{2018}', '\u{2019}'), // ‘ ’
    ('\u{201A}', '\u{201B}'), // ‚ ‛
    ('\u{201C}', '\u{201D}'), // “ ”
    ('\u{201E}', '\u{201F}'), // „ ‟
    ('\u{2E42}', '\u{2E42}'), // ⹂
    ('\u{300C}', '\u{300D}'), // 「 」
    ('\u{300E}', '\u{300F}'), // 『 』
    ('\u{301D}', '\u{301E}'), // 〝 〞
    ('\u{FE41}', '\u{FE42}'), // ﹁ ﹂
    ('\u{FE43}', '\u{FE44}'), // ﹃ ﹄
    ('\u{FF02}', '\u{FF02}'), // ＂
    ('\u{FF62}', '\u{FF63}'), // ｢ ｣
    ('\u{00AB}', '\u{00BB}'), // « »
    ('\u{2039}', '\u{203A}'), // ‹ ›
    ('\u{300A}', '\u{300B}'), // 《 》
    ('\u{3008}', '\u{3009}'), // 〈 〉
];

fn closing_quote(open: char) -> Option<char> {
    QUOTES.iter().find(|(o, _)| *o == open).map(|(_, c)| *c)
}

/// Removes every backslash that escapes the character following it.
pub fn unescape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.next()
        {
            output.push(next);
            continue;
        }
        output.push(c);
    }

    output
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// A quoted word was opened at `position` but the input ended before it was closed.
    UnterminatedQuote { open: char, position: usize },
}
impl Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote { open, position } => {
                write!(f, "the quote {open} opened at position {position} is never closed")
            },
        }
    }
}
impl std::error::Error for CursorError {}

/// A cursor over command input. See the module documentation.
#[derive(Debug, Clone)]
pub struct TextCursor {
    buffer: Arc<str>,
    /// Byte offset into `buffer`, always on a char boundary.
    position: usize,
    history: Vec<usize>,
    rest_as_block: bool,
}

impl TextCursor {
    pub fn new(input: impl Into<Arc<str>>) -> Self {
        Self {
            buffer: input.into(),
            position: 0,
            history: Vec::new(),
            rest_as_block: false,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of positions that [`TextCursor::undo`] can still revert to.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The untouched input after the current position.
    pub fn remaining(&self) -> &str {
        &self.buffer[self.position..]
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.buffer.len()
    }

    /// Whether nothing but unescaped whitespace is left.
    pub fn is_exhausted(&self) -> bool {
        self.whitespace_end(self.position) >= self.buffer.len()
    }

    /// When enabled, the next [`TextCursor::next_quoted_word`] returns the whole remainder of the
    /// input as a single token. The flag is cleared by that call.
    pub fn set_rest_as_block(&mut self, enabled: bool) {
        self.rest_as_block = enabled;
    }

    pub fn rest_as_block(&self) -> bool {
        self.rest_as_block
    }

    fn is_escaped(&self, index: usize) -> bool {
        let preceding = self.buffer.as_bytes()[..index]
            .iter()
            .rev()
            .take_while(|&&b| b == b'\\')
            .count();

        preceding % 2 == 1
    }

    fn is_separator(&self, index: usize, c: char) -> bool {
        c.is_whitespace() && !self.is_escaped(index)
    }

    fn whitespace_end(&self, from: usize) -> usize {
        self.buffer[from..]
            .char_indices()
            .find(|&(offset, c)| !self.is_separator(from + offset, c))
            .map_or(self.buffer.len(), |(offset, _)| from + offset)
    }

    fn word_end(&self, from: usize) -> usize {
        self.buffer[from..]
            .char_indices()
            .find(|&(offset, c)| self.is_separator(from + offset, c))
            .map_or(self.buffer.len(), |(offset, _)| from + offset)
    }

    /// Advances past consecutive unescaped whitespace.
    pub fn skip_whitespace(&mut self) {
        self.history.push(self.position);
        self.position = self.whitespace_end(self.position);
    }

    /// Skips whitespace and consumes characters up to the next unescaped whitespace.
    ///
    /// Returns `None`, without moving, when only whitespace is left.
    pub fn next_word(&mut self) -> Option<String> {
        let start = self.whitespace_end(self.position);
        if start >= self.buffer.len() {
            return None;
        }

        let end = self.word_end(start);
        self.history.push(self.position);
        self.position = end;

        Some(unescape(&self.buffer[start..end]))
    }

    /// Like [`TextCursor::next_word`], but a word starting with a recognised opening quote extends
    /// to the matching unescaped closing quote. The quotes are stripped and the cursor is left just
    /// past the closing quote.
    pub fn next_quoted_word(&mut self) -> Result<Option<String>, CursorError> {
        let start = self.whitespace_end(self.position);

        if self.rest_as_block {
            self.rest_as_block = false;
            if start >= self.buffer.len() {
                return Ok(None);
            }

            self.history.push(self.position);
            self.position = self.buffer.len();
            return Ok(Some(self.buffer[start..].to_owned()));
        }

        let Some(open) = self.buffer[start..].chars().next() else {
            return Ok(None);
        };
        let Some(close) = closing_quote(open) else {
            return Ok(self.next_word());
        };

        let content_start = start + open.len_utf8();
        let content_end = self.buffer[content_start..]
            .char_indices()
            .find(|&(offset, c)| c == close && !self.is_escaped(content_start + offset))
            .map(|(offset, _)| content_start + offset)
            .ok_or(CursorError::UnterminatedQuote { open, position: start })?;

        self.history.push(self.position);
        self.position = content_end + close.len_utf8();

        Ok(Some(unescape(&self.buffer[content_start..content_end])))
    }

    /// Returns the next word without consuming it.
    pub fn peek_word(&self) -> Option<String> {
        self.fork().next_word()
    }

    /// Reverts the most recent recorded move. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(position) => {
                self.position = position;
                true
            },
            None => false,
        }
    }

    /// An independent cursor over the same buffer, with its own position and history.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Adopts the position, history and flags of a fork of this cursor.
    pub fn commit(&mut self, fork: TextCursor) {
        debug_assert!(
            Arc::ptr_eq(&self.buffer, &fork.buffer),
            "committed a cursor over a different buffer"
        );
        *self = fork;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_whitespace() {
        let mut cursor = TextCursor::new("  hello   world\tagain ");
        assert_eq!(cursor.next_word().as_deref(), Some("hello"));
        assert_eq!(cursor.next_word().as_deref(), Some("world"));
        assert_eq!(cursor.next_word().as_deref(), Some("again"));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_word(), None);
    }

    #[test]
    fn escaped_whitespace_joins_words() {
        let mut cursor = TextCursor::new(r"John\ Doe next");
        assert_eq!(cursor.next_word().as_deref(), Some("John Doe"));
        assert_eq!(cursor.next_word().as_deref(), Some("next"));
    }

    #[test]
    fn escaping_uses_backslash_parity() {
        // two backslashes: the second is escaped, so the space still separates
        let mut cursor = TextCursor::new(r"a\\ b");
        assert_eq!(cursor.next_word().as_deref(), Some(r"a\"));
        assert_eq!(cursor.next_word().as_deref(), Some("b"));

        // three backslashes: an escaped backslash followed by an escaped space
        let mut cursor = TextCursor::new(r"a\\\ b");
        assert_eq!(cursor.next_word().as_deref(), Some(r"a\ b"));
        assert_eq!(cursor.next_word(), None);
    }

    #[test]
    fn unescape_removes_only_escaping_backslashes() {
        assert_eq!(unescape(r"\a\b"), "ab");
        assert_eq!(unescape(r"\\"), r"\");
        assert_eq!(unescape(r"\\\\x"), r"\\x");
        assert_eq!(unescape(r"trailing\"), r"trailing\");
        assert_eq!(unescape(r"\“quoted\”"), "“quoted”");
    }

    #[test]
    fn quoted_words_strip_quotes() {
        let mut cursor = TextCursor::new(r#""John Doe" --loud"#);
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("John Doe"));
        assert_eq!(cursor.position(), 10);
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("--loud"));
        assert_eq!(cursor.next_quoted_word().unwrap(), None);
    }

    #[test]
    fn unicode_quote_pairs() {
        let mut cursor = TextCursor::new("«bonjour le monde» 「こんにちは 世界」 “a b”");
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("bonjour le monde"));
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("こんにちは 世界"));
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("a b"));
        assert!(cursor.is_eof());
    }

    #[test]
    fn escaped_closing_quote_does_not_close() {
        let mut cursor = TextCursor::new(r#""say \"hi\"" after"#);
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some(r#"say "hi""#));
        assert_eq!(cursor.next_word().as_deref(), Some("after"));
    }

    #[test]
    fn unterminated_quote_fails() {
        let mut cursor = TextCursor::new(r#"ok "never closed"#);
        assert_eq!(cursor.next_quoted_word().unwrap().as_deref(), Some("ok"));
        assert_eq!(
            cursor.next_quoted_word(),
            Err(CursorError::UnterminatedQuote { open: '"', position: 3 })
        );
        // a failed read does not move the cursor
        assert_eq!(cursor.position(), 2);

        let mut cursor = TextCursor::new(r#""escaped close\""#);
        assert!(cursor.next_quoted_word().is_err());
    }

    #[test]
    fn rest_as_block_returns_untouched_remainder() {
        let mut cursor = TextCursor::new(r#"first  "second" \third  "#);
        assert_eq!(cursor.next_word().as_deref(), Some("first"));

        cursor.set_rest_as_block(true);
        assert_eq!(
            cursor.next_quoted_word().unwrap().as_deref(),
            Some(r#""second" \third  "#)
        );
        assert!(!cursor.rest_as_block());
        assert!(cursor.is_eof());
    }

    #[test]
    fn undo_is_stack_based() {
        let mut cursor = TextCursor::new("one two three");
        cursor.next_word();
        cursor.next_word();
        cursor.skip_whitespace();
        assert_eq!(cursor.history_len(), 3);

        assert!(cursor.undo());
        assert_eq!(cursor.position(), 7);
        assert!(cursor.undo());
        assert_eq!(cursor.position(), 3);
        assert!(cursor.undo());
        assert_eq!(cursor.position(), 0);
        assert!(!cursor.undo());

        assert_eq!(cursor.next_word().as_deref(), Some("one"));
    }

    #[test]
    fn fork_is_independent_until_committed() {
        let mut cursor = TextCursor::new("alpha beta gamma");
        cursor.next_word();

        let mut fork = cursor.fork();
        assert_eq!(fork.next_word().as_deref(), Some("beta"));
        assert_eq!(fork.next_word().as_deref(), Some("gamma"));
        assert_eq!(cursor.peek_word().as_deref(), Some("beta"));
        assert_eq!(cursor.history_len(), 1);

        cursor.commit(fork);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.history_len(), 3);
        assert!(cursor.undo());
        assert_eq!(cursor.next_word().as_deref(), Some("gamma"));
    }
}
