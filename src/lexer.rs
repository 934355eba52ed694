//! Lexical analysis of a single input line into argument words.
//!
//! Quoting follows the usual shell rules restricted to what the interpreter supports:
//!
//! - Outside quotes, `\` makes the next character literal (including a space) and an
//!   unescaped space ends the current word.
//! - Inside single quotes every character is literal until the closing `'`.
//! - Inside double quotes, `\` only escapes `$`, `\` and `"`; before any other character
//!   the backslash itself is kept.
//!
//! Lexing never fails: an unterminated quote simply runs to the end of the line.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

/// Characters that a backslash escapes inside double quotes.
const DOUBLE_QUOTE_ESCAPES: [char; 3] = ['$', '\\', '"'];

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            buffer: String::new(),
        }
    }

    /// Runs the state machine over the whole input and returns the non-empty words.
    fn make_tokens(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch, &mut out),
                LexingState::SingleQuoted => self.handle_single_quote(ch),
                LexingState::DoubleQuoted => self.handle_double_quote(ch),
            }
        }

        // Whatever is left, including an unterminated quote, is the final word.
        self.finish_word(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' => self.finish_word(out),
            '\'' => self.state = LexingState::SingleQuoted,
            '"' => self.state = LexingState::DoubleQuoted,
            '\\' => {
                // A trailing lone backslash has nothing to escape and is dropped.
                if let Some(escaped) = self.read_char() {
                    self.buffer.push(escaped);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Unquoted,
            '\\' => match self.peek_char() {
                Some(next) if DOUBLE_QUOTE_ESCAPES.contains(&next) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                _ => self.buffer.push('\\'),
            },
            c => self.buffer.push(c),
        }
    }

    /// Moves the buffered word to `out`. Empty words, whether from repeated spaces or
    /// from empty quotes, are discarded.
    fn finish_word(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Splits an input line into words, resolving quotes and escapes.
///
/// Leading and trailing whitespace is ignored. The result never contains empty strings.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    let mut lexer = LexingFSM::new(line.trim());
    lexer.make_tokens()
}
