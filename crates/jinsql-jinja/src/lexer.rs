//! Template tokenizer
//!
//! Raw text outside `{{ }}`, `{% %}` and `{# #}` is collected as-is. Inside a
//! tag a logos scanner produces identifiers, literals and operators until the
//! matching closing delimiter hands control back to text mode.

use logos::Logos;
use std::cell::Cell;
use std::fmt;

use crate::error::JinjaError;

/// Line/column of the first character of a token (both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Text mode
    Text,
    TrimmedWhitespace,
    Comment,

    // Delimiters
    ExprOpen,
    ExprClose,
    StmtOpen,
    StmtClose,

    // Literals
    Identifier,
    String,
    Number,
    True,
    False,

    // Block keywords
    If,
    Elif,
    Else,
    EndIf,
    For,
    EndFor,
    Macro,
    EndMacro,
    Set,

    // Word operators
    And,
    Or,
    Not,
    In,

    // Symbols
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    Dot,

    Eof,
}

impl TokenKind {
    /// How the token kind reads in "expected ..." messages
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Text => "template text",
            Self::TrimmedWhitespace => "whitespace",
            Self::Comment => "comment",
            Self::ExprOpen => "`{{`",
            Self::ExprClose => "`}}`",
            Self::StmtOpen => "`{%`",
            Self::StmtClose => "`%}`",
            Self::Identifier => "identifier",
            Self::String => "string",
            Self::Number => "number",
            Self::True => "`true`",
            Self::False => "`false`",
            Self::If => "`if`",
            Self::Elif => "`elif`",
            Self::Else => "`else`",
            Self::EndIf => "`endif`",
            Self::For => "`for`",
            Self::EndFor => "`endfor`",
            Self::Macro => "`macro`",
            Self::EndMacro => "`endmacro`",
            Self::Set => "`set`",
            Self::And => "`and`",
            Self::Or => "`or`",
            Self::Not => "`not`",
            Self::In => "`in`",
            Self::Eq => "`==`",
            Self::NotEq => "`!=`",
            Self::Lt => "`<`",
            Self::LtEq => "`<=`",
            Self::Gt => "`>`",
            Self::GtEq => "`>=`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Comma => "`,`",
            Self::Assign => "`=`",
            Self::Dot => "`.`",
            Self::Eof => "end of input",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; the unescaped value for strings
    pub text: String,
    pub start: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
        }
    }

    /// How the token reads in "found ..." messages
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Identifier => format!("identifier `{}`", self.text),
            TokenKind::String => format!("string '{}'", self.text),
            TokenKind::Number => format!("number `{}`", self.text),
            _ => self.kind.describe().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidNumber,
}

/// Tokens recognised inside `{{ }}` and `{% %}`
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n\f]+")]
enum TagToken {
    #[token("}}")]
    ExprClose,
    #[token("-}}")]
    ExprCloseTrim,
    #[token("%}")]
    StmtClose,
    #[token("-%}")]
    StmtCloseTrim,

    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("for")]
    For,
    #[token("endfor")]
    EndFor,
    #[token("macro")]
    Macro,
    #[token("endmacro")]
    EndMacro,
    #[token("set")]
    Set,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("true")]
    #[token("True")]
    True,
    #[token("false")]
    #[token("False")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex(r"[0-9][0-9A-Za-z_.]*", parse_number)]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, unescape)]
    #[regex(r#"'([^'\\]|\\.)*'"#, unescape)]
    String(String),

    #[regex(r#""([^"\\]|\\.)*"#, unterminated)]
    #[regex(r#"'([^'\\]|\\.)*"#, unterminated)]
    UnterminatedString(String),

    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,
    #[token(".")]
    Dot,
}

impl TagToken {
    fn kind(&self) -> TokenKind {
        match self {
            Self::ExprClose | Self::ExprCloseTrim => TokenKind::ExprClose,
            Self::StmtClose | Self::StmtCloseTrim => TokenKind::StmtClose,
            Self::If => TokenKind::If,
            Self::Elif => TokenKind::Elif,
            Self::Else => TokenKind::Else,
            Self::EndIf => TokenKind::EndIf,
            Self::For => TokenKind::For,
            Self::EndFor => TokenKind::EndFor,
            Self::Macro => TokenKind::Macro,
            Self::EndMacro => TokenKind::EndMacro,
            Self::Set => TokenKind::Set,
            Self::And => TokenKind::And,
            Self::Or => TokenKind::Or,
            Self::Not => TokenKind::Not,
            Self::In => TokenKind::In,
            Self::True => TokenKind::True,
            Self::False => TokenKind::False,
            Self::Identifier => TokenKind::Identifier,
            Self::Number(_) => TokenKind::Number,
            Self::String(_) | Self::UnterminatedString(_) => TokenKind::String,
            Self::Eq => TokenKind::Eq,
            Self::NotEq => TokenKind::NotEq,
            Self::Lt => TokenKind::Lt,
            Self::LtEq => TokenKind::LtEq,
            Self::Gt => TokenKind::Gt,
            Self::GtEq => TokenKind::GtEq,
            Self::Plus => TokenKind::Plus,
            Self::Minus => TokenKind::Minus,
            Self::Star => TokenKind::Star,
            Self::Slash => TokenKind::Slash,
            Self::Percent => TokenKind::Percent,
            Self::LParen => TokenKind::LParen,
            Self::RParen => TokenKind::RParen,
            Self::LBracket => TokenKind::LBracket,
            Self::RBracket => TokenKind::RBracket,
            Self::Comma => TokenKind::Comma,
            Self::Assign => TokenKind::Assign,
            Self::Dot => TokenKind::Dot,
        }
    }

    fn trims_following(&self) -> bool {
        matches!(self, Self::ExprCloseTrim | Self::StmtCloseTrim)
    }
}

fn parse_number(lex: &mut logos::Lexer<TagToken>) -> Result<f64, LexErrorKind> {
    lex.slice().parse().map_err(|_| LexErrorKind::InvalidNumber)
}

fn unescape(lex: &mut logos::Lexer<TagToken>) -> Result<String, LexErrorKind> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some(other) => value.push(other),
            None => return Err(LexErrorKind::UnterminatedString),
        }
    }

    Ok(value)
}

fn unterminated(_lex: &mut logos::Lexer<TagToken>) -> Result<String, LexErrorKind> {
    Err(LexErrorKind::UnterminatedString)
}

/// Tokenize a template into an ordered token stream ending in `Eof`
pub fn tokenize(source: &str) -> Result<Vec<Token>, JinjaError> {
    Lexer::new(source).run()
}

/// Last offset turned into a position, so the next lookup only scans forward
#[derive(Debug, Clone, Copy)]
struct Cursor {
    offset: usize,
    position: Position,
}

struct Lexer<'s> {
    source: &'s str,
    offset: usize,
    line_starts: Vec<usize>,
    cursor: Cell<Cursor>,
    tokens: Vec<Token>,
    /// Set by `-}}`/`-%}`/`-#}`: strip leading whitespace of the next text
    trim_next: bool,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            source,
            offset: 0,
            line_starts,
            cursor: Cell::new(Cursor {
                offset: 0,
                position: Position::new(1, 1),
            }),
            tokens: Vec::new(),
            trim_next: false,
        }
    }

    /// Tokens are pushed in source order, so this is linear over a whole
    /// template. Looking backwards (error messages) recounts from the line
    /// start.
    fn position(&self, offset: usize) -> Position {
        let cursor = self.cursor.get();
        if offset < cursor.offset {
            let line = self.line_starts.partition_point(|&start| start <= offset);
            let line_start = self.line_starts[line - 1];
            return Position::new(line, self.source[line_start..offset].chars().count() + 1);
        }

        let skipped = &self.source[cursor.offset..offset];
        let position = match skipped.rfind('\n') {
            Some(last) => Position::new(
                cursor.position.line + skipped.matches('\n').count(),
                skipped[last + 1..].chars().count() + 1,
            ),
            None => Position::new(
                cursor.position.line,
                cursor.position.column + skipped.chars().count(),
            ),
        };
        self.cursor.set(Cursor { offset, position });
        position
    }

    fn push(&mut self, kind: TokenKind, offset: usize, text: &str) {
        let start = self.position(offset);
        self.tokens.push(Token::new(kind, text, start));
    }

    fn run(mut self) -> Result<Vec<Token>, JinjaError> {
        let source = self.source;

        while self.offset < source.len() {
            let rest = &source[self.offset..];
            match find_tag_open(rest) {
                Some(index) => {
                    if index > 0 {
                        self.push_text(self.offset, &rest[..index]);
                    }
                    self.offset += index;
                    self.lex_tag()?;
                }
                None => {
                    self.push_text(self.offset, rest);
                    self.offset = source.len();
                }
            }
        }

        let end = self.position(source.len());
        self.tokens.push(Token::new(TokenKind::Eof, "", end));
        Ok(self.tokens)
    }

    fn push_text(&mut self, mut offset: usize, mut text: &str) {
        if std::mem::take(&mut self.trim_next) {
            let trimmed = text.trim_start();
            let cut = text.len() - trimmed.len();
            if cut > 0 {
                self.push(TokenKind::TrimmedWhitespace, offset, &text[..cut]);
                offset += cut;
                text = trimmed;
            }
        }

        if !text.is_empty() {
            self.push(TokenKind::Text, offset, text);
        }
    }

    /// Move trailing whitespace of the text right before the tag at
    /// `self.offset` into its own token
    fn trim_previous(&mut self) {
        let Some(last) = self.tokens.last_mut() else {
            return;
        };
        if last.kind != TokenKind::Text {
            return;
        }

        let kept = last.text.trim_end().len();
        if kept == last.text.len() {
            return;
        }

        if kept == 0 {
            last.kind = TokenKind::TrimmedWhitespace;
            return;
        }

        let whitespace = last.text.split_off(kept);
        let offset = self.offset - whitespace.len();
        self.push(TokenKind::TrimmedWhitespace, offset, &whitespace);
    }

    fn lex_tag(&mut self) -> Result<(), JinjaError> {
        let source = self.source;
        let bytes = source.as_bytes();
        let open = self.offset;
        let marker = bytes[open + 1];
        let trim_left = bytes.get(open + 2) == Some(&b'-');
        let width = if trim_left { 3 } else { 2 };

        self.trim_next = false;
        if trim_left {
            self.trim_previous();
        }

        match marker {
            b'#' => self.lex_comment(open, width),
            b'{' => self.lex_tag_body(open, width, TokenKind::ExprOpen, TokenKind::ExprClose),
            _ => self.lex_tag_body(open, width, TokenKind::StmtOpen, TokenKind::StmtClose),
        }
    }

    fn lex_comment(&mut self, open: usize, width: usize) -> Result<(), JinjaError> {
        let source = self.source;
        let body = open + width;

        let Some(end) = source[body..].find("#}") else {
            return Err(JinjaError::Lex {
                position: self.position(open),
                reason: "unterminated comment, expected `#}`".to_string(),
            });
        };

        let close = body + end;
        let stop = close + 2;
        self.push(TokenKind::Comment, open, &source[open..stop]);
        self.offset = stop;
        self.trim_next = close > body && source.as_bytes()[close - 1] == b'-';
        Ok(())
    }

    fn lex_tag_body(
        &mut self,
        open: usize,
        width: usize,
        open_kind: TokenKind,
        close_kind: TokenKind,
    ) -> Result<(), JinjaError> {
        let source = self.source;
        let body = open + width;
        self.push(open_kind, open, &source[open..body]);

        let mut lexer = TagToken::lexer(&source[body..]);
        while let Some(result) = lexer.next() {
            let span = lexer.span();
            let start = body + span.start;
            let slice = lexer.slice();

            let token = match result {
                Ok(token) => token,
                Err(kind) => return Err(self.lex_error(start, kind, slice)),
            };

            match token {
                TagToken::ExprClose
                | TagToken::ExprCloseTrim
                | TagToken::StmtClose
                | TagToken::StmtCloseTrim => {
                    if token.kind() != close_kind {
                        return Err(JinjaError::Lex {
                            position: self.position(start),
                            reason: format!(
                                "expected {} to close the tag opened at {}, found `{}`",
                                close_kind.describe(),
                                self.position(open),
                                slice
                            ),
                        });
                    }
                    self.push(close_kind, start, slice);
                    self.offset = body + span.end;
                    self.trim_next = token.trims_following();
                    return Ok(());
                }
                TagToken::String(value) => {
                    let position = self.position(start);
                    self.tokens.push(Token::new(TokenKind::String, value, position));
                }
                TagToken::UnterminatedString(_) => {
                    return Err(self.lex_error(start, LexErrorKind::UnterminatedString, slice));
                }
                other => self.push(other.kind(), start, slice),
            }
        }

        Err(JinjaError::Lex {
            position: self.position(open),
            reason: format!("unterminated tag, expected {}", close_kind.describe()),
        })
    }

    fn lex_error(&self, offset: usize, kind: LexErrorKind, slice: &str) -> JinjaError {
        let reason = match kind {
            LexErrorKind::UnexpectedCharacter => format!("unexpected character `{slice}`"),
            LexErrorKind::UnterminatedString => "unterminated string literal".to_string(),
            LexErrorKind::InvalidNumber => format!("invalid numeric literal `{slice}`"),
        };

        JinjaError::Lex {
            position: self.position(offset),
            reason,
        }
    }
}

/// Byte index of the next `{{`, `{%` or `{#`
fn find_tag_open(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    text.match_indices('{')
        .map(|(i, _)| i)
        .find(|&i| matches!(bytes.get(i + 1), Some(b'{' | b'%' | b'#')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_expression_tokens() {
        let tokens = tokenize("{{ 1 + 2 }}").unwrap();

        let expected = vec![
            Token::new(TokenKind::ExprOpen, "{{", Position::new(1, 1)),
            Token::new(TokenKind::Number, "1", Position::new(1, 4)),
            Token::new(TokenKind::Plus, "+", Position::new(1, 6)),
            Token::new(TokenKind::Number, "2", Position::new(1, 8)),
            Token::new(TokenKind::ExprClose, "}}", Position::new(1, 10)),
            Token::new(TokenKind::Eof, "", Position::new(1, 12)),
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_text_and_tags_partition_input() {
        let source = "select *\nfrom {{ ref('users') }} where {% if x %}a{% endif %}";
        let tokens = tokenize(source).unwrap();

        assert_eq!(tokens[0], Token::new(TokenKind::Text, "select *\nfrom ", Position::new(1, 1)));
        assert_eq!(tokens[1], Token::new(TokenKind::ExprOpen, "{{", Position::new(2, 6)));
        assert_eq!(tokens[2], Token::new(TokenKind::Identifier, "ref", Position::new(2, 9)));
        assert_eq!(tokens[4], Token::new(TokenKind::String, "users", Position::new(2, 13)));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            kinds("{% if a and not b or c in d %}"),
            vec![
                TokenKind::StmtOpen,
                TokenKind::If,
                TokenKind::Identifier,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Identifier,
                TokenKind::Or,
                TokenKind::Identifier,
                TokenKind::In,
                TokenKind::Identifier,
                TokenKind::StmtClose,
                TokenKind::Eof,
            ]
        );

        assert_eq!(
            kinds("{{ a<=b>=c!=d==e<f>g%h/i*j-k }}")
                .into_iter()
                .filter(|k| *k != TokenKind::Identifier)
                .collect::<Vec<_>>(),
            vec![
                TokenKind::ExprOpen,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::NotEq,
                TokenKind::Eq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Percent,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Minus,
                TokenKind::ExprClose,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_identifiers_containing_keywords() {
        let tokens = tokenize("{{ iffy.index }}").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "iffy");
        assert_eq!(tokens[3].text, "index");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"{{ 'it\'s' ~ "a\tb" }}"#);
        // `~` is not an operator
        assert!(tokens.is_err());

        let tokens = tokenize(r#"{{ 'it\'s' + "a\tb" }}"#).unwrap();
        assert_eq!(tokens[1].text, "it's");
        assert_eq!(tokens[3].text, "a\tb");
    }

    #[test]
    fn test_positions_across_lines() {
        let tokens = tokenize("a\n  {{ x }}\n{% set y = 1 %}").unwrap();
        let ident = tokens.iter().find(|t| t.text == "x").unwrap();
        assert_eq!(ident.start, Position::new(2, 6));
        let set = tokens.iter().find(|t| t.kind == TokenKind::Set).unwrap();
        assert_eq!(set.start, Position::new(3, 4));
    }

    #[test]
    fn test_positions_on_one_long_line() {
        let source = vec!["{{ a }}"; 2000].join(", ");
        let tokens = tokenize(&source).unwrap();

        let columns: Vec<usize> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.start.column)
            .collect();
        assert_eq!(columns.len(), 2000);
        assert_eq!(columns[0], 4);
        assert_eq!(columns[1], 13);
        assert_eq!(columns[1999], 9 * 1999 + 4);
        assert!(tokens.iter().all(|t| t.start.line == 1));
    }

    #[test]
    fn test_columns_count_characters() {
        let tokens = tokenize("é\n€€ {{ x }}").unwrap();
        let ident = tokens.iter().find(|t| t.text == "x").unwrap();
        assert_eq!(ident.start, Position::new(2, 7));
    }

    #[test]
    fn test_error_positions_point_back_at_open_tag() {
        let err = tokenize("x\n  {{ a %}").unwrap_err();
        assert_eq!(err.position(), Position::new(2, 8));
        assert!(err.to_string().contains("opened at 2:3"));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = tokenize("{{ 'abc }}").unwrap_err();
        assert_eq!(
            err,
            JinjaError::Lex {
                position: Position::new(1, 4),
                reason: "unterminated string literal".to_string(),
            }
        );
    }

    #[test]
    fn test_unterminated_tag_is_error() {
        let err = tokenize("select {{ a + b").unwrap_err();
        assert_eq!(err.position(), Position::new(1, 8));
        assert!(err.to_string().contains("unterminated tag"));
    }

    #[test]
    fn test_invalid_number_is_error() {
        let err = tokenize("{{ 12ab }}").unwrap_err();
        assert_eq!(err.position(), Position::new(1, 4));
        assert!(err.to_string().contains("invalid numeric literal `12ab`"));
    }

    #[test]
    fn test_mismatched_closing_delimiter_is_error() {
        let err = tokenize("{{ a %}").unwrap_err();
        assert!(err.to_string().contains("expected `}}`"));
    }

    #[test]
    fn test_comments_are_single_tokens() {
        let tokens = tokenize("a{# note {{ x }} #}b").unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Comment, "{# note {{ x }} #}", Position::new(1, 2)));
        assert_eq!(tokens[2].text, "b");

        assert!(tokenize("a {# open").is_err());
    }

    #[test]
    fn test_whitespace_control_splits_text() {
        let tokens = tokenize("a  \n{%- set x = 1 -%}\n  b").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Text, "a", Position::new(1, 1)));
        assert_eq!(tokens[1], Token::new(TokenKind::TrimmedWhitespace, "  \n", Position::new(1, 2)));
        assert_eq!(tokens[2].text, "{%-");

        let close = tokens.iter().position(|t| t.kind == TokenKind::StmtClose).unwrap();
        assert_eq!(tokens[close].text, "-%}");
        assert_eq!(tokens[close + 1].kind, TokenKind::TrimmedWhitespace);
        assert_eq!(tokens[close + 2], Token::new(TokenKind::Text, "b", Position::new(3, 3)));
    }

    #[test]
    fn test_tokens_cover_every_byte() {
        let source = "x {{- a }}  {# c -#}\n y {% if b %}z{% endif %}";
        let tokens = tokenize(source).unwrap();

        let text_tokens: String = tokens
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    TokenKind::Text | TokenKind::TrimmedWhitespace | TokenKind::Comment
                )
            })
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(text_tokens, "x   {# c -#}\n y z");
    }
}
