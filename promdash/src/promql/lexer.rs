//! Tokenizer for PromQL expressions
use std::str::CharIndices;

use super::ast::PromDuration;
use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A metric name, label name, function name or keyword
    Ident(String),
    Number(f64),
    Duration(PromDuration),
    Str(String),

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,

    Assign,     // =
    Eql,        // ==
    Neq,        // !=
    Lss,        // <
    Lte,        // <=
    Gtr,        // >
    Gte,        // >=
    EqlRegex,   // =~
    NeqRegex,   // !~
    Add,        // +
    Sub,        // -
    Mul,        // *
    Div,        // /
    Mod,        // %
    Pow,        // ^

    Eof,
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: CharIndices<'a>,
    current: Option<(usize, char)>,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.char_indices();
        let current = chars.next();
        let peeked = chars.next();
        Self {
            input,
            chars,
            current,
            peeked,
        }
    }

    /// Tokenizes the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_whitespace_and_comments();

        let (position, c) = match self.current {
            Some(current) => current,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    position: self.input.len(),
                })
            }
        };

        let token = match c {
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '{' => self.single(Token::LeftBrace),
            '}' => self.single(Token::RightBrace),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Colon),
            '+' => self.single(Token::Add),
            '-' => self.single(Token::Sub),
            '*' => self.single(Token::Mul),
            '/' => self.single(Token::Div),
            '%' => self.single(Token::Mod),
            '^' => self.single(Token::Pow),
            '=' => match self.peek_char() {
                Some('=') => self.double(Token::Eql),
                Some('~') => self.double(Token::EqlRegex),
                _ => self.single(Token::Assign),
            },
            '!' => match self.peek_char() {
                Some('=') => self.double(Token::Neq),
                Some('~') => self.double(Token::NeqRegex),
                _ => return Err(ParseError::new("unexpected character after '!'", position)),
            },
            '<' => match self.peek_char() {
                Some('=') => self.double(Token::Lte),
                _ => self.single(Token::Lss),
            },
            '>' => match self.peek_char() {
                Some('=') => self.double(Token::Gte),
                _ => self.single(Token::Gtr),
            },
            '"' | '\'' => self.string(c, position)?,
            '`' => self.raw_string(position)?,
            c if c.is_ascii_digit() || (c == '.' && self.peek_is_digit()) => {
                self.number_or_duration(position)?
            }
            c if is_ident_start(c) => self.identifier(),
            _ => {
                return Err(ParseError::new(
                    format!("unexpected character: '{}'", c),
                    position,
                ))
            }
        };

        Ok(Spanned { token, position })
    }

    fn advance(&mut self) {
        self.current = self.peeked.take();
        self.peeked = self.chars.next();
    }

    fn current_char(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    fn peek_char(&self) -> Option<char> {
        self.peeked.map(|(_, c)| c)
    }

    fn peek_is_digit(&self) -> bool {
        self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false)
    }

    fn offset(&self) -> usize {
        self.current.map(|(i, _)| i).unwrap_or_else(|| self.input.len())
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.advance();
        self.advance();
        token
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.current_char() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self) -> Token {
        let start = self.offset();
        while let Some(c) = self.current_char() {
            if is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        let word = &self.input[start..self.offset()];

        if word.eq_ignore_ascii_case("inf") {
            Token::Number(f64::INFINITY)
        } else if word.eq_ignore_ascii_case("nan") {
            Token::Number(f64::NAN)
        } else {
            Token::Ident(word.to_string())
        }
    }

    fn number_or_duration(&mut self, position: usize) -> Result<Token, ParseError> {
        let start = self.offset();

        if self.current_char() == Some('0') && matches!(self.peek_char(), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.offset();
            while let Some(c) = self.current_char() {
                if c.is_ascii_hexdigit() {
                    self.advance();
                } else {
                    break;
                }
            }
            let digits = &self.input[digits_start..self.offset()];
            return u64::from_str_radix(digits, 16)
                .map(|v| Token::Number(v as f64))
                .map_err(|_| ParseError::new("bad hexadecimal number", position));
        }

        self.consume_digits();

        if matches!(self.current_char(), Some(c) if is_duration_unit_start(c)) {
            return self.duration(start, position);
        }

        if self.current_char() == Some('.') {
            self.advance();
            self.consume_digits();
        }

        if matches!(self.current_char(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_char(), Some('+') | Some('-'));
            if self.peek_is_digit() || signed {
                self.advance();
                if signed {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        if matches!(self.current_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            return Err(ParseError::new("bad number or duration syntax", position));
        }

        let literal = &self.input[start..self.offset()];
        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|err| ParseError::new(format!("bad number '{}': {}", literal, err), position))
    }

    fn duration(&mut self, start: usize, position: usize) -> Result<Token, ParseError> {
        loop {
            match self.current_char() {
                Some(c) if c.is_ascii_digit() => self.consume_digits(),
                Some(c) if is_duration_unit_start(c) => {
                    self.advance();
                    // "ms" is the only two letter unit
                    if c == 'm' && self.current_char() == Some('s') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }

        if matches!(self.current_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(ParseError::new("bad duration syntax", position));
        }

        let literal = &self.input[start..self.offset()];
        literal
            .parse::<PromDuration>()
            .map(Token::Duration)
            .map_err(|err| ParseError::new(err, position))
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: char, position: usize) -> Result<Token, ParseError> {
        self.advance();
        let mut value = String::new();

        loop {
            match self.current_char() {
                None | Some('\n') => {
                    return Err(ParseError::new("unterminated quoted string", position))
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Token::Str(value));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('a') => '\u{7}',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('v') => '\u{b}',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        _ => {
                            return Err(ParseError::new(
                                "unknown escape sequence in string",
                                self.offset(),
                            ))
                        }
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn raw_string(&mut self, position: usize) -> Result<Token, ParseError> {
        self.advance();
        let start = self.offset();
        loop {
            match self.current_char() {
                None => return Err(ParseError::new("unterminated raw string", position)),
                Some('`') => {
                    let value = self.input[start..self.offset()].to_string();
                    self.advance();
                    return Ok(Token::Str(value));
                }
                Some(_) => self.advance(),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_duration_unit_start(c: char) -> bool {
    matches!(c, 'y' | 'w' | 'd' | 'h' | 'm' | 's')
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn comparison_with_selector() {
        assert_eq!(
            tokens("up{job=~\"api.*\"} <= 0.5"),
            vec![
                Token::Ident("up".to_string()),
                Token::LeftBrace,
                Token::Ident("job".to_string()),
                Token::EqlRegex,
                Token::Str("api.*".to_string()),
                Token::RightBrace,
                Token::Lte,
                Token::Number(0.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn durations() {
        assert_eq!(
            tokens("rate(x[1h30m])"),
            vec![
                Token::Ident("rate".to_string()),
                Token::LeftParen,
                Token::Ident("x".to_string()),
                Token::LeftBracket,
                Token::Duration(PromDuration::from_millis(90 * 60 * 1000)),
                Token::RightBracket,
                Token::RightParen,
                Token::Eof,
            ]
        );
        assert_eq!(
            tokens("250ms"),
            vec![Token::Duration(PromDuration::from_millis(250)), Token::Eof]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokens("1e3 0x1f .5 Inf"),
            vec![
                Token::Number(1000.0),
                Token::Number(31.0),
                Token::Number(0.5),
                Token::Number(f64::INFINITY),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn strings_and_comments() {
        assert_eq!(
            tokens("'a\\'b' `c\\d` # trailing comment"),
            vec![
                Token::Str("a'b".to_string()),
                Token::Str("c\\d".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = Lexer::new("up ! 1").tokenize().unwrap_err();
        assert_eq!(err.position(), 3);

        let err = Lexer::new("up{job=\"a}").tokenize().unwrap_err();
        assert_eq!(err.position(), 7);
    }
}
