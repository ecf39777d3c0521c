/// Lexer for the script subset.
///
/// The [`Lexer`] walks a source string and implements [`Iterator`] over
/// [`Token`]s, ending with exactly one [`TokenKind::Eof`]. Comments and
/// preprocessor lines are skipped. Malformed input never stops the
/// lexer: it produces a [`TokenKind::Error`] token and carries on, so the
/// parser can report every problem in one pass.
///
/// # Literals
///
/// | Syntax              | Token                        |
/// |---------------------|------------------------------|
/// | `42`, `0x2A`        | `Int` (`Long` with `L`)      |
/// | `1.5f`              | `Float`                      |
/// | `1.5`, `1e3`, `2d`  | `Double` (`m` reads as well) |
/// | `'a'`, `'\n'`       | `Char`                       |
/// | `"a\tb"`, `@"C:\x"` | `Str`                        |
/// | `$"hp: {hp}"`       | `Interpolated`               |
use crate::ast::BinaryOp;
use crate::span::{Pos, Span};
use crate::token::{Keyword, RawSegment, Token, TokenKind};
use crate::types::unescape;

pub struct Lexer<'a> {
    src: &'a str,
    pos: Pos,
    /// Where `src` starts inside the enclosing text, for holes of
    /// interpolated strings.
    base: Option<Pos>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: Pos::origin(),
            base: None,
            finished: false,
        }
    }

    /// Lex a fragment whose first character sits at `base` in some
    /// enclosing text. Spans come out in the enclosing coordinates.
    pub fn at(src: &'a str, base: Pos) -> Self {
        Self {
            base: Some(base),
            ..Self::new(src)
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos = self.pos.advance(ch);
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Option<TokenKind> {
        loop {
            match (self.peek(), self.peek_nth(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) | (Some('#'), _) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.eat('/') => break,
                            Some(_) => {}
                            None => {
                                return Some(TokenKind::Error(
                                    "unterminated block comment".into(),
                                ));
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn next_kind(&mut self) -> TokenKind {
        let Some(ch) = self.peek() else {
            return TokenKind::Eof;
        };

        if ch.is_ascii_digit()
            || (ch == '.' && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.number();
        }
        if ch == '_' || ch.is_alphabetic() {
            return self.ident();
        }
        if ch == '@' && self.peek_nth(1) == Some('"') {
            self.advance();
            self.advance();
            return self.verbatim_string();
        }
        if ch == '$' && self.peek_nth(1) == Some('"') {
            self.advance();
            self.advance();
            return self.interpolated_string();
        }

        self.advance();
        match ch {
            '"' => self.string(),
            '\'' => self.char_literal(),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            '+' if self.eat('+') => TokenKind::PlusPlus,
            '-' if self.eat('-') => TokenKind::MinusMinus,
            '&' if self.eat('&') => TokenKind::AmpAmp,
            '|' if self.eat('|') => TokenKind::PipePipe,
            '=' if self.eat('=') => TokenKind::EqEq,
            '!' if self.eat('=') => TokenKind::NotEq,
            '<' if self.eat('=') => TokenKind::Le,
            '>' if self.eat('=') => TokenKind::Ge,
            '=' => TokenKind::Assign,
            '!' => TokenKind::Bang,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' => {
                let op = match ch {
                    '+' => BinaryOp::Add,
                    '-' => BinaryOp::Sub,
                    '*' => BinaryOp::Mul,
                    '/' => BinaryOp::Div,
                    '%' => BinaryOp::Rem,
                    '&' => BinaryOp::BitAnd,
                    '|' => BinaryOp::BitOr,
                    _ => BinaryOp::BitXor,
                };
                if self.eat('=') {
                    return TokenKind::CompoundAssign(op);
                }
                match op {
                    BinaryOp::Add => TokenKind::Plus,
                    BinaryOp::Sub => TokenKind::Minus,
                    BinaryOp::Mul => TokenKind::Star,
                    BinaryOp::Div => TokenKind::Slash,
                    BinaryOp::Rem => TokenKind::Percent,
                    BinaryOp::BitAnd => TokenKind::Amp,
                    BinaryOp::BitOr => TokenKind::Pipe,
                    _ => TokenKind::Caret,
                }
            }
            other => TokenKind::Error(format!("unexpected character `{other}`")),
        }
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos.offset;
        while self.peek().is_some_and(|c| c == '_' || c.is_alphanumeric()) {
            self.advance();
        }
        let text = &self.src[start..self.pos.offset];
        match Keyword::from_ident(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text.to_string()),
        }
    }

    fn digits(&mut self, radix: u32) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                out.push(c);
            } else if c != '_' {
                break;
            }
            self.advance();
        }
        out
    }

    fn number(&mut self) -> TokenKind {
        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.advance();
            self.advance();
            let digits = self.digits(16);
            let long = self.eat('L') || self.eat('l');
            return match i64::from_str_radix(&digits, 16) {
                Ok(v) if long => TokenKind::Long(v),
                Ok(v) => TokenKind::Int(v),
                Err(e) => TokenKind::Error(format!("invalid hex literal: {e}")),
            };
        }

        let mut text = self.digits(10);
        let mut real = false;
        if self.peek() == Some('.')
            && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            text.push('.');
            text.push_str(&self.digits(10));
            real = true;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_nth(1);
            let exp_digit = match sign {
                Some('+' | '-') => self.peek_nth(2),
                other => other,
            };
            if exp_digit.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                text.push('e');
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    self.advance();
                    text.push(sign);
                }
                text.push_str(&self.digits(10));
                real = true;
            }
        }

        let suffix = match self.peek() {
            Some(c @ ('f' | 'F' | 'd' | 'D' | 'm' | 'M' | 'l' | 'L')) => {
                self.advance();
                Some(c.to_ascii_lowercase())
            }
            _ => None,
        };

        match suffix {
            Some('f') => match real_text(&text).parse::<f32>() {
                Ok(v) => TokenKind::Float(v),
                Err(e) => TokenKind::Error(format!("invalid real literal: {e}")),
            },
            Some('d' | 'm') => match real_text(&text).parse::<f64>() {
                Ok(v) => TokenKind::Double(v),
                Err(e) => TokenKind::Error(format!("invalid real literal: {e}")),
            },
            _ if real => match real_text(&text).parse::<f64>() {
                Ok(v) => TokenKind::Double(v),
                Err(e) => TokenKind::Error(format!("invalid real literal: {e}")),
            },
            Some('l') => match integer(&text) {
                Some(v) => TokenKind::Long(v),
                None => TokenKind::Error("integral constant is too large".into()),
            },
            _ => match integer(&text) {
                Some(v) => TokenKind::Int(v),
                None => TokenKind::Error("integral constant is too large".into()),
            },
        }
    }

    /// Raw text up to the closing `quote`, with escapes left intact.
    fn quoted(&mut self, quote: char) -> Option<String> {
        let mut raw = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return None,
                Some(c) if c == quote => {
                    self.advance();
                    return Some(raw);
                }
                Some('\\') => {
                    self.advance();
                    raw.push('\\');
                    if let Some(next) = self.advance() {
                        raw.push(next);
                    }
                }
                Some(c) => {
                    self.advance();
                    raw.push(c);
                }
            }
        }
    }

    fn string(&mut self) -> TokenKind {
        match self.quoted('"') {
            Some(raw) => match unescape(&raw) {
                Ok(text) => TokenKind::Str(text),
                Err(e) => TokenKind::Error(e),
            },
            None => TokenKind::Error("newline in constant".into()),
        }
    }

    fn verbatim_string(&mut self) -> TokenKind {
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    return TokenKind::Error("unterminated string literal".into());
                }
                Some('"') if self.eat('"') => text.push('"'),
                Some('"') => return TokenKind::Str(text),
                Some(c) => text.push(c),
            }
        }
    }

    fn char_literal(&mut self) -> TokenKind {
        let Some(raw) = self.quoted('\'') else {
            return TokenKind::Error("newline in constant".into());
        };
        let text = match unescape(&raw) {
            Ok(text) => text,
            Err(e) => return TokenKind::Error(e),
        };
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => TokenKind::Char(c),
            (None, _) => TokenKind::Error("empty character literal".into()),
            _ => TokenKind::Error("too many characters in character literal".into()),
        }
    }

    fn interpolated_string(&mut self) -> TokenKind {
        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return TokenKind::Error("newline in constant".into());
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('{') if self.peek_nth(1) == Some('{') => {
                    self.advance();
                    self.advance();
                    text.push('{');
                }
                Some('}') if self.peek_nth(1) == Some('}') => {
                    self.advance();
                    self.advance();
                    text.push('}');
                }
                Some('{') => {
                    self.advance();
                    if !text.is_empty() {
                        match unescape(&std::mem::take(&mut text)) {
                            Ok(t) => segments.push(RawSegment::Text(t)),
                            Err(e) => return TokenKind::Error(e),
                        }
                    }
                    match self.hole() {
                        Some(segment) => segments.push(segment),
                        None => {
                            return TokenKind::Error(
                                "unterminated interpolation hole".into(),
                            );
                        }
                    }
                }
                Some('\\') => {
                    self.advance();
                    text.push('\\');
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
        if !text.is_empty() {
            match unescape(&text) {
                Ok(t) => segments.push(RawSegment::Text(t)),
                Err(e) => return TokenKind::Error(e),
            }
        }
        TokenKind::Interpolated(segments)
    }

    /// Code of one `{...}` hole, the opening brace already consumed.
    fn hole(&mut self) -> Option<RawSegment> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut format = None;
        let mut code_end = None;
        loop {
            match self.peek()? {
                '\n' => return None,
                '"' | '\'' => {
                    let quote = self.advance()?;
                    self.quoted(quote)?;
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '}' if depth > 0 => depth -= 1,
                '}' => break,
                ':' if depth == 0 && format.is_none() => {
                    code_end = Some(self.pos.offset);
                    format = Some(self.pos.offset + 1);
                }
                _ => {}
            }
            self.advance();
        }
        let end = self.pos.offset;
        self.advance();
        let code = &self.src[start.offset..code_end.unwrap_or(end)];
        let format = format.map(|from| self.src[from..end].trim().to_string());
        let base = match self.base {
            Some(base) => start.rebase(base),
            None => start,
        };
        Some(RawSegment::Code {
            code: code.to_string(),
            at: base,
            format,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let start = self.pos;
        let kind = match self.skip_trivia() {
            Some(error) => error,
            None => {
                let start = self.pos;
                let kind = self.next_kind();
                if kind == TokenKind::Eof {
                    self.finished = true;
                }
                return Some(self.token(kind, start));
            }
        };
        Some(self.token(kind, start))
    }
}

impl Lexer<'_> {
    fn token(&self, kind: TokenKind, start: Pos) -> Token {
        let span = Span::new(start, self.pos);
        let span = match self.base {
            Some(base) => span.rebase(base),
            None => span,
        };
        Token::new(kind, span)
    }
}

/// Decimal integer text as `i64`. `9223372036854775808` is one past the
/// range but valid after a minus sign, so it lexes as `i64::MIN` and the
/// parser either folds the sign into it or rejects it.
fn integer(text: &str) -> Option<i64> {
    match text.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) if text.parse::<u64>() == Ok(i64::MIN.unsigned_abs()) => Some(i64::MIN),
        Err(_) => None,
    }
}

fn real_text(text: &str) -> String {
    if text.starts_with('.') {
        format!("0{text}")
    } else {
        text.to_string()
    }
}

pub fn tokenize(src: &str) -> Vec<Token> {
    Lexer::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.into())
    }

    // ── Literals ───────────────────────────────────────────────────

    #[test]
    fn numeric_literals_and_suffixes() {
        assert_eq!(
            kinds("42 40L 5f 5.5F 2.5 1e3 .5 2d 3m 0xFF"),
            vec![
                TokenKind::Int(42),
                TokenKind::Long(40),
                TokenKind::Float(5.0),
                TokenKind::Float(5.5),
                TokenKind::Double(2.5),
                TokenKind::Double(1000.0),
                TokenKind::Double(0.5),
                TokenKind::Double(2.0),
                TokenKind::Double(3.0),
                TokenKind::Int(255),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn integer_range_edges() {
        assert_eq!(
            kinds("9223372036854775807 9223372036854775808L 9223372036854775809"),
            vec![
                TokenKind::Int(i64::MAX),
                TokenKind::Long(i64::MIN),
                TokenKind::Error("integral constant is too large".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn member_access_on_integer_is_not_a_real() {
        assert_eq!(
            kinds("1.ToString"),
            vec![
                TokenKind::Int(1),
                TokenKind::Dot,
                ident("ToString"),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_forms() {
        assert_eq!(
            kinds(r#""a\tb" @"C:\dir ""q""" 'x' '\n'"#),
            vec![
                TokenKind::Str("a\tb".into()),
                TokenKind::Str("C:\\dir \"q\"".into()),
                TokenKind::Char('x'),
                TokenKind::Char('\n'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let toks = kinds("\"abc\nx");
        assert!(matches!(toks[0], TokenKind::Error(_)));
        assert_eq!(toks[1], ident("x"));
    }

    #[test]
    fn interpolated_string_splits_holes() {
        let toks = tokenize(r#"$"hp: {hp} ({ratio:F2}) {{ok}}""#);
        let TokenKind::Interpolated(segments) = &toks[0].kind else {
            panic!("expected interpolated string, got {:?}", toks[0].kind);
        };
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], RawSegment::Text("hp: ".into()));
        let RawSegment::Code { code, at, format } = &segments[1] else {
            panic!("expected a hole");
        };
        assert_eq!((code.as_str(), at.column, format), ("hp", 8, &None));
        let RawSegment::Code { code, format, .. } = &segments[3] else {
            panic!("expected a hole");
        };
        assert_eq!(code, "ratio");
        assert_eq!(format.as_deref(), Some("F2"));
        assert_eq!(segments[4], RawSegment::Text(") {ok}".into()));
    }

    // ── Operators and trivia ───────────────────────────────────────

    #[test]
    fn operators_prefer_longest_match() {
        assert_eq!(
            kinds("a += 1; b++ <= c && !d"),
            vec![
                ident("a"),
                TokenKind::CompoundAssign(BinaryOp::Add),
                TokenKind::Int(1),
                TokenKind::Semicolon,
                ident("b"),
                TokenKind::PlusPlus,
                TokenKind::Le,
                ident("c"),
                TokenKind::AmpAmp,
                TokenKind::Bang,
                ident("d"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_directives_are_skipped() {
        let src = "#region Setup\nint /* a */ x; // tail\n#endregion";
        assert_eq!(
            kinds(src),
            vec![ident("int"), ident("x"), TokenKind::Semicolon, TokenKind::Eof]
        );
    }

    #[test]
    fn keywords_are_recognized() {
        assert_eq!(
            kinds("var void transform"),
            vec![
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Keyword(Keyword::Void),
                ident("transform"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_track_lines_and_fragments() {
        let toks = tokenize("a\n  bc");
        assert_eq!(toks[1].span.start, Pos::new(4, 2, 3));
        assert_eq!(toks[1].span.end, Pos::new(6, 2, 5));

        let base = Pos::new(20, 3, 10);
        let toks: Vec<_> = Lexer::at("x + y", base).collect();
        assert_eq!(toks[2].span.start, Pos::new(24, 3, 14));
    }
}
