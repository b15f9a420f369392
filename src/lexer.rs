use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

const LEFT_META: &str = "{{";
const RIGHT_META: &str = "}}";

/// Longest identifier accepted inside an action, in bytes.
pub const LEXEME_MAX_LEN: usize = 64;

/// How many lexemes a state function may buffer before the consumer drains
/// them. A quoted identifier is the largest burst (3 lexemes).
const RING_CAPACITY: usize = 4;

/// List of lexeme kinds emitted to the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexemeKind {
    Error,
    Eof,
    Identifier,
    LeftMeta,
    Hash,
    RightMeta,
    Text,
    Slash,
    QuestionMark,
    Hat,
    GreaterThan,
    OpenCurlyBrace,
    CloseCurlyBrace,
}

impl fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            LexemeKind::Error => "ERROR",
            LexemeKind::Eof => "EOF",
            LexemeKind::Identifier => "IDENTIFIER",
            LexemeKind::LeftMeta => "LEFT_META",
            LexemeKind::Hash => "HASH",
            LexemeKind::RightMeta => "RIGHT_META",
            LexemeKind::Text => "TEXT",
            LexemeKind::Slash => "SLASH",
            LexemeKind::QuestionMark => "QUESTION_MARK",
            LexemeKind::Hat => "HAT",
            LexemeKind::GreaterThan => "GREATER_THAN",
            LexemeKind::OpenCurlyBrace => "OPEN_CURLY_BRACE",
            LexemeKind::CloseCurlyBrace => "CLOSE_CURLY_BRACE",
        })
    }
}

/// A classified token. Everything except `Error` borrows a slice of the
/// template source; `Error` carries an owned formatted message.
#[derive(Clone, Debug, PartialEq)]
pub struct Lexeme<'s> {
    pub kind: LexemeKind,
    pub value: Cow<'s, str>,
}

impl<'s> Lexeme<'s> {
    fn new(kind: LexemeKind, value: &'s str) -> Lexeme<'s> {
        Lexeme {
            kind,
            value: Cow::Borrowed(value),
        }
    }

    pub fn text(&self) -> &str {
        &self.value
    }
}

/// List of different states the lexer can be in.
#[derive(Clone, Copy, Debug)]
enum LexerState {
    Text,
    LeftMeta,
    Comment,
    InsideAction,
    Identifier,
    QuotedIdentifier,
    Partial,
    RightMeta,
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'/'
}

/// Streaming lexer. State functions produce into a small ring buffer which
/// `next_lexeme` drains; a state may emit several lexemes before yielding.
pub struct Lexer<'s> {
    source: &'s str,
    start: usize,
    pos: usize,
    state: Option<LexerState>,
    ring: VecDeque<Lexeme<'s>>,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Lexer<'s> {
        Lexer {
            source,
            start: 0,
            pos: 0,
            state: Some(LexerState::Text),
            ring: VecDeque::with_capacity(RING_CAPACITY),
        }
    }

    /// Pulls the next lexeme, running state functions until one is buffered.
    /// Returns `None` once the terminal state has been reached and the ring
    /// is drained.
    pub fn next_lexeme(&mut self) -> Option<Lexeme<'s>> {
        loop {
            if let Some(lexeme) = self.ring.pop_front() {
                return Some(lexeme);
            }
            match self.state {
                Some(state) => self.state = self.step(state),
                None => return None,
            }
        }
    }

    fn step(&mut self, state: LexerState) -> Option<LexerState> {
        match state {
            LexerState::Text => self.lex_text(),
            LexerState::LeftMeta => self.lex_left_meta(),
            LexerState::Comment => self.lex_comment(),
            LexerState::InsideAction => self.lex_inside_action(),
            LexerState::Identifier => self.lex_identifier(),
            LexerState::QuotedIdentifier => self.lex_quoted_identifier(),
            LexerState::Partial => self.lex_partial(),
            LexerState::RightMeta => self.lex_right_meta(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.source.as_bytes().get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    /// Undoes the last `next_byte`. Only valid right after a successful one.
    fn backup(&mut self) {
        self.pos -= 1;
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn emit(&mut self, kind: LexemeKind) {
        let value = &self.source[self.start..self.pos];
        self.ring.push_back(Lexeme::new(kind, value));
        self.start = self.pos;
    }

    fn error(&mut self, message: String) -> Option<LexerState> {
        self.ring.push_back(Lexeme {
            kind: LexemeKind::Error,
            value: Cow::Owned(message),
        });
        None
    }

    fn lex_text(&mut self) -> Option<LexerState> {
        loop {
            if self.rest().starts_with(LEFT_META) {
                if self.pos > self.start {
                    self.emit(LexemeKind::Text);
                }
                return Some(LexerState::LeftMeta);
            }
            if self.rest().starts_with(RIGHT_META) {
                return self.error("unexpected action close sequence".to_string());
            }
            if self.next_byte().is_none() {
                break;
            }
        }
        if self.pos > self.start {
            self.emit(LexemeKind::Text);
        }
        self.emit(LexemeKind::Eof);
        None
    }

    fn lex_left_meta(&mut self) -> Option<LexerState> {
        self.pos += LEFT_META.len();
        match self.next_byte() {
            Some(b'!') => return Some(LexerState::Comment),
            Some(_) => self.backup(),
            None => {}
        }
        self.emit(LexemeKind::LeftMeta);
        Some(LexerState::InsideAction)
    }

    /// Consumes up to the `}}` closing the comment, allowing balanced
    /// `{`/`}` pairs inside. The comment text is dropped.
    fn lex_comment(&mut self) -> Option<LexerState> {
        let mut brackets = LEFT_META.len();
        while brackets > 0 {
            match self.next_byte() {
                Some(b'{') => brackets += 1,
                Some(b'}') => brackets -= 1,
                Some(_) => {}
                None => {
                    return self.error("unexpected EOF while scanning comment end".to_string());
                }
            }
        }
        self.ignore();
        Some(LexerState::Text)
    }

    fn lex_inside_action(&mut self) -> Option<LexerState> {
        loop {
            if self.rest().starts_with(RIGHT_META) {
                return Some(LexerState::RightMeta);
            }
            let b = match self.next_byte() {
                Some(b) => b,
                None => return self.error("unexpected EOF while scanning action".to_string()),
            };
            match b {
                b'\n' => return self.error("actions cannot span multiple lines".to_string()),
                b'#' => {
                    self.emit(LexemeKind::Hash);
                    return Some(LexerState::InsideAction);
                }
                b'?' => {
                    self.emit(LexemeKind::QuestionMark);
                    return Some(LexerState::InsideAction);
                }
                b'^' => {
                    self.emit(LexemeKind::Hat);
                    return Some(LexerState::InsideAction);
                }
                b'>' => {
                    self.emit(LexemeKind::GreaterThan);
                    return Some(LexerState::Partial);
                }
                b'{' => return Some(LexerState::QuotedIdentifier),
                b'/' => {
                    self.emit(LexemeKind::Slash);
                    return Some(LexerState::InsideAction);
                }
                _ if b.is_ascii_whitespace() => self.ignore(),
                _ if is_ident(b) => {
                    self.backup();
                    return Some(LexerState::Identifier);
                }
                _ => return self.error(format!("unexpected character: {}", b as char)),
            }
        }
    }

    fn lex_identifier(&mut self) -> Option<LexerState> {
        while let Some(b) = self.next_byte() {
            if !is_ident(b) {
                self.backup();
                break;
            }
        }
        self.emit(LexemeKind::Identifier);
        Some(LexerState::InsideAction)
    }

    fn lex_quoted_identifier(&mut self) -> Option<LexerState> {
        self.emit(LexemeKind::OpenCurlyBrace);
        let _ = self.lex_identifier();
        match self.next_byte() {
            Some(b'}') => {
                self.emit(LexemeKind::CloseCurlyBrace);
                Some(LexerState::InsideAction)
            }
            Some(b) => self.error(format!("expecting `}}`, found `{}`", b as char)),
            None => self.error("unexpected EOF while scanning action".to_string()),
        }
    }

    /// After `>`: skip whitespace, then exactly one identifier.
    fn lex_partial(&mut self) -> Option<LexerState> {
        loop {
            let b = match self.next_byte() {
                Some(b) => b,
                None => return self.error("unexpected EOF while scanning action".to_string()),
            };
            match b {
                b'\n' => return self.error("actions cannot span multiple lines".to_string()),
                _ if b.is_ascii_whitespace() => self.ignore(),
                _ if is_ident(b) => {
                    self.backup();
                    return Some(LexerState::Identifier);
                }
                _ => return self.error(format!("unexpected character: {}", b as char)),
            }
        }
    }

    fn lex_right_meta(&mut self) -> Option<LexerState> {
        self.pos += RIGHT_META.len();
        self.emit(LexemeKind::RightMeta);
        Some(LexerState::Text)
    }
}
