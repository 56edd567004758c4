//! Script tokenizer and escape decoding.
//!
//! The parser is a cursor over one borrowed source string. Each call to
//! [`Parser::next_token`] classifies the next run of bytes and returns its
//! kind together with the raw payload, borrowing from the source. Parsing
//! never fails: unterminated braces, brackets, and quotes simply consume to
//! the end of the input, and every byte sequence yields some token stream.
//!
//! Classification is byte-oriented ASCII. A byte is "printable" if it is in
//! `0x21..=0x7e`; everything else separates words. Escape sequences are kept
//! verbatim at this stage; the evaluator calls [`decode_escapes`] on each
//! materialized word that still carries them.

use crate::Value;

/// Kinds of tokens produced by the parser.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Token {
    /// Whitespace between words of one command.
    Sep,
    /// A command terminator: a run of newlines, semicolons, and whitespace.
    Eol,
    /// Input exhausted.
    Eof,
    /// Literal bytes, not subject to any further processing.
    Str,
    /// Literal bytes that may still contain backslash escapes.
    Esc,
    /// The interior of a `[...]` command substitution.
    Cmd,
    /// The name of a `$name` variable substitution.
    Var,
}

/// Tokenizer state: a cursor over one source string.
pub struct Parser<'a> {
    text: &'a Value,
    pos: usize,
    start: usize,
    end: usize,
    /// Kind of the most recently recognized token. Starts as `Eol` so that
    /// the beginning of the input counts as a command boundary.
    kind: Token,
    /// True while scanning the inside of a double-quoted run.
    in_quote: bool,
}

impl<'a> Parser<'a> {
    /// Creates a parser positioned at the start of `text`.
    pub fn new(text: &'a Value) -> Self {
        Self {
            text,
            pos: 0,
            start: 0,
            end: 0,
            kind: Token::Eol,
            in_quote: false,
        }
    }

    /// Checks whether the cursor has consumed every byte of the source.
    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn token(&self) -> &'a Value {
        &self.text[self.start..self.end]
    }

    /// Advances past the next token and returns its kind and raw payload.
    ///
    /// The payload excludes any delimiter that was consumed (the `$` of a
    /// variable, the brackets of a command substitution, quotes, braces).
    /// Once the input is exhausted this yields a final `Eol` -- unless the
    /// previous token already terminated a command -- and `Eof` from then on.
    pub fn next_token(&mut self) -> (Token, &'a Value) {
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'\n' | b';' if !self.in_quote => return self.parse_sep(true),
                b'[' => return self.parse_command(),
                b'$' => return self.parse_var(),
                b'#' if self.kind == Token::Eol => self.skip_comment(),
                _ if is_printable(b) || self.in_quote => return self.parse_string(),
                _ => return self.parse_sep(false),
            }
        }
        self.kind = if self.kind == Token::Eol || self.kind == Token::Eof {
            Token::Eof
        } else {
            Token::Eol
        };
        self.start = self.pos;
        self.end = self.pos;
        (self.kind, self.token())
    }

    /// Consumes a run of separator bytes. In `eol` mode the run also covers
    /// semicolons and terminates the command in progress.
    fn parse_sep(&mut self, eol: bool) -> (Token, &'a Value) {
        self.start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            if !is_printable(b) || (eol && b == b';') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.end = self.pos;
        self.kind = if eol { Token::Eol } else { Token::Sep };
        (self.kind, self.token())
    }

    /// Consumes a `[...]` run, tracking bracket nesting. Brackets inside a
    /// braced sub-run do not count toward nesting, and a backslash hides
    /// whatever single byte follows it.
    fn parse_command(&mut self) -> (Token, &'a Value) {
        self.pos += 1;
        self.start = self.pos;
        let mut level = 1u32;
        let mut blevel = 0u32;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 1,
                b'[' if blevel == 0 => level += 1,
                b']' if blevel == 0 => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                b'{' => blevel += 1,
                b'}' if blevel > 0 => blevel -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        self.end = self.pos;
        self.kind = Token::Cmd;
        if self.text.get(self.pos) == Some(&b']') {
            self.pos += 1;
        }
        (self.kind, self.token())
    }

    /// Consumes `$` and the identifier run after it. A `$` followed by a
    /// non-identifier byte is an ordinary one-byte string.
    fn parse_var(&mut self) -> (Token, &'a Value) {
        self.pos += 1;
        self.start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == self.start {
            self.start = self.pos - 1;
            self.end = self.pos;
            self.kind = Token::Str;
        } else {
            self.end = self.pos;
            self.kind = Token::Var;
        }
        (self.kind, self.token())
    }

    /// Consumes a `{...}` run, tracking brace nesting. The interior is taken
    /// verbatim; no substitution applies inside braces.
    fn parse_brace(&mut self) -> (Token, &'a Value) {
        self.pos += 1;
        self.start = self.pos;
        let mut level = 1u32;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'{' => level += 1,
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 1,
                b'}' => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.end = self.pos;
        if !self.at_end() {
            self.pos += 1;
        }
        self.kind = Token::Str;
        (self.kind, self.token())
    }

    /// Consumes a run of ordinary word bytes, stopping wherever another
    /// token class takes over (`$`, `[`, a separator, or the closing quote).
    ///
    /// At a word boundary an opening brace hands off to [`Self::parse_brace`]
    /// and an opening quote switches the parser into quote mode, which keeps
    /// separators and semicolons literal until the matching close quote.
    fn parse_string(&mut self) -> (Token, &'a Value) {
        let word_start = matches!(self.kind, Token::Sep | Token::Eol | Token::Str);
        if word_start {
            match self.text.get(self.pos) {
                Some(&b'{') => return self.parse_brace(),
                Some(&b'"') => {
                    self.in_quote = true;
                    self.pos += 1;
                }
                _ => {}
            }
        }
        self.start = self.pos;
        while let Some(&b) = self.text.get(self.pos) {
            match b {
                b'$' | b'[' => break,
                b'"' if self.in_quote => {
                    self.end = self.pos;
                    self.kind = Token::Esc;
                    self.pos += 1;
                    self.in_quote = false;
                    return (self.kind, self.token());
                }
                b'\\' if self.pos + 1 < self.text.len() => self.pos += 2,
                _ if (!is_printable(b) || b == b';') && !self.in_quote => break,
                _ => self.pos += 1,
            }
        }
        self.end = self.pos;
        self.kind = Token::Esc;
        (self.kind, self.token())
    }

    /// Discards bytes up to (not including) the next newline.
    fn skip_comment(&mut self) {
        while let Some(&b) = self.text.get(self.pos) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }
}

/// Yields tokens up to, but not including, `Eof`.
impl<'a> Iterator for Parser<'a> {
    type Item = (Token, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            (Token::Eof, _) => None,
            found => Some(found),
        }
    }
}

/// ASCII printability test; every byte outside `0x21..=0x7e` counts as
/// word-separating whitespace.
pub(crate) fn is_printable(b: u8) -> bool {
    (0x21..0x7f).contains(&b)
}

/// Resolves backslash escapes in `buf` in place.
///
/// Recognized sequences: `\n`, `\r`, `\t`; `\xHH` / `\XHH` with one or two
/// hex digits (a bare `\x` disappears); a backslash before a non-printable
/// byte swallows the backslash, that byte, and the rest of the non-printable
/// run (line continuation); a backslash before any other printable byte
/// yields that byte. A lone trailing backslash is dropped.
pub fn decode_escapes(buf: &mut Vec<u8>) {
    if !buf.contains(&b'\\') {
        return;
    }
    let mut r = 0;
    let mut w = 0;
    while r < buf.len() {
        let b = buf[r];
        if b != b'\\' {
            buf[w] = b;
            w += 1;
            r += 1;
            continue;
        }
        match buf.get(r + 1).copied() {
            Some(b'n') => {
                buf[w] = b'\n';
                w += 1;
                r += 2;
            }
            Some(b'r') => {
                buf[w] = b'\r';
                w += 1;
                r += 2;
            }
            Some(b't') => {
                buf[w] = b'\t';
                w += 1;
                r += 2;
            }
            Some(b'x') | Some(b'X') => {
                r += 2;
                if let Some(hi) = buf.get(r).copied().filter(u8::is_ascii_hexdigit) {
                    if let Some(lo) = buf.get(r + 1).copied().filter(u8::is_ascii_hexdigit) {
                        buf[w] = hex_value(hi) << 4 | hex_value(lo);
                        r += 2;
                    } else {
                        buf[w] = hex_value(hi);
                        r += 1;
                    }
                    w += 1;
                }
            }
            Some(c) if is_printable(c) => {
                buf[w] = c;
                w += 1;
                r += 2;
            }
            Some(_) => {
                r += 2;
                while r < buf.len() && !is_printable(buf[r]) {
                    r += 1;
                }
            }
            None => r += 1,
        }
    }
    buf.truncate(w);
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}
