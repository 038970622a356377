use crate::ast::SourceSpan;
use crate::errors::SyntaxError;
use crate::source::SourceFile;

type Result<T> = std::result::Result<T, SyntaxError>;

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    /// Set when a line break separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
            newline_before: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    NumberLiteral(f64),
    BigIntLiteral(String),
    StringLiteral(String),
    BooleanLiteral(bool),
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    DotDotDot,
    Colon,
    Semicolon,
    Question,
    QuestionQuestion,
    Equal,
    DoubleEqual,
    TripleEqual,
    Bang,
    BangEqual,
    BangDoubleEqual,
    Greater,
    GreaterEqual,
    GreaterGreater,
    GreaterGreaterGreater,
    Less,
    LessEqual,
    LessLess,
    Plus,
    PlusPlus,
    Minus,
    MinusMinus,
    Star,
    StarStar,
    Slash,
    Percent,
    Pipe,
    PipePipe,
    Ampersand,
    AmpersandAmpersand,
    Caret,
    Tilde,
    FatArrow,
    /// `+=`, `-=` and the other operator-assignment forms.
    CompoundAssign(&'static str),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Const,
    Var,
    Import,
    Export,
    Default,
    Return,
    If,
    Else,
    Function,
    Null,
    Typeof,
    Void,
    Delete,
    In,
    Instanceof,
}

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            input: &source.contents,
            position: 0,
            line: 1,
            column: 1,
            saw_newline: false,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            let token = match ch {
                ' ' | '\t' | '\u{feff}' => {
                    self.advance_char();
                    continue;
                }
                '\r' | '\n' => {
                    self.advance_char();
                    self.saw_newline = true;
                    continue;
                }
                '/' if self.peek_next_char() == Some('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.peek_next_char() == Some('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '"' | '\'' => self.lex_string(ch)?,
                '`' => return Err(self.error_here("template literals are not supported")),
                '0'..='9' => self.lex_number()?,
                '.' if matches!(self.peek_next_char(), Some('0'..='9')) => self.lex_number()?,
                ch if is_identifier_start(ch) => self.lex_identifier_or_keyword(),
                '(' => self.simple_token(TokenKind::LParen),
                ')' => self.simple_token(TokenKind::RParen),
                '{' => self.simple_token(TokenKind::LBrace),
                '}' => self.simple_token(TokenKind::RBrace),
                '[' => self.simple_token(TokenKind::LBracket),
                ']' => self.simple_token(TokenKind::RBracket),
                ',' => self.simple_token(TokenKind::Comma),
                ';' => self.simple_token(TokenKind::Semicolon),
                ':' => self.simple_token(TokenKind::Colon),
                '~' => self.simple_token(TokenKind::Tilde),
                '.' => self.lex_dot_variants(),
                '?' => self.lex_question_variants(),
                '=' => self.lex_equals_variants(),
                '!' => self.lex_bang_variants(),
                '<' => self.lex_less_variants(),
                '>' => self.lex_greater_variants(),
                '+' => self.lex_operator(&[("++", TokenKind::PlusPlus), ("+=", assign("+="))], TokenKind::Plus),
                '-' => self.lex_operator(&[("--", TokenKind::MinusMinus), ("-=", assign("-="))], TokenKind::Minus),
                '*' => self.lex_operator(
                    &[("**=", assign("**=")), ("**", TokenKind::StarStar), ("*=", assign("*="))],
                    TokenKind::Star,
                ),
                '/' => self.lex_operator(&[("/=", assign("/="))], TokenKind::Slash),
                '%' => self.lex_operator(&[("%=", assign("%="))], TokenKind::Percent),
                '|' => self.lex_operator(
                    &[("||=", assign("||=")), ("||", TokenKind::PipePipe), ("|=", assign("|="))],
                    TokenKind::Pipe,
                ),
                '&' => self.lex_operator(
                    &[
                        ("&&=", assign("&&=")),
                        ("&&", TokenKind::AmpersandAmpersand),
                        ("&=", assign("&=")),
                    ],
                    TokenKind::Ampersand,
                ),
                '^' => self.lex_operator(&[("^=", assign("^="))], TokenKind::Caret),
                other => {
                    return Err(self.error_here(format!(
                        "Unexpected character '{}' at line {}, column {}",
                        other, self.line, self.column
                    )));
                }
            };
            tokens.push(self.finish(token));
        }

        let eof = Token::new(TokenKind::Eof, String::new(), self.line, self.column);
        tokens.push(self.finish(eof));

        Ok(tokens)
    }

    fn finish(&mut self, mut token: Token) -> Token {
        token.newline_before = std::mem::take(&mut self.saw_newline);
        token
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, SourceSpan::single_point(self.line, self.column))
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' || ch == '\r' {
                break;
            }
            self.advance_char();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char(); // consume '/'
        self.advance_char(); // consume '*'

        while let Some(ch) = self.peek_char() {
            if ch == '*' && self.peek_next_char() == Some('/') {
                self.advance_char();
                self.advance_char();
                return Ok(());
            }
            if ch == '\n' || ch == '\r' {
                self.saw_newline = true;
            }
            self.advance_char();
        }

        Err(SyntaxError::new(
            format!(
                "Unterminated block comment starting at line {}, column {}",
                start_line, start_column
            ),
            SourceSpan::single_point(start_line, start_column),
        ))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char(); // consume opening quote

        let mut value = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                c if c == quote => {
                    self.advance_char(); // consume closing quote
                    let lexeme = self.slice(start, self.position);
                    return Ok(Token::new(
                        TokenKind::StringLiteral(value),
                        lexeme.to_string(),
                        start_line,
                        start_column,
                    ));
                }
                '\\' => {
                    self.advance_char();
                    let escaped = self.peek_char().ok_or_else(|| {
                        self.error_here("Unterminated escape sequence in string literal")
                    })?;
                    self.advance_char();
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        '0' => value.push('\0'),
                        'x' => value.push(self.lex_hex_escape(2)?),
                        'u' => value.push(self.lex_hex_escape(4)?),
                        // line continuation
                        '\n' | '\r' => {}
                        other => value.push(other),
                    }
                }
                '\n' | '\r' => break,
                _ => {
                    value.push(ch);
                    self.advance_char();
                }
            }
        }

        Err(SyntaxError::new(
            format!(
                "Unterminated string literal starting at line {}, column {}",
                start_line, start_column
            ),
            SourceSpan::single_point(start_line, start_column),
        ))
    }

    fn lex_hex_escape(&mut self, digits: usize) -> Result<char> {
        let start = self.position;
        for _ in 0..digits {
            match self.peek_char() {
                Some(ch) if ch.is_ascii_hexdigit() => {
                    self.advance_char();
                }
                _ => return Err(self.error_here("Invalid hexadecimal escape sequence")),
            }
        }
        u32::from_str_radix(self.slice(start, self.position), 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_here("Invalid unicode escape sequence"))
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let radix = match (self.peek_char(), self.peek_next_char()) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('o' | 'O')) => 8,
            (Some('0'), Some('b' | 'B')) => 2,
            _ => 10,
        };

        if radix != 10 {
            self.advance_char();
            self.advance_char();
            while let Some(ch) = self.peek_char() {
                if ch.is_digit(radix) || ch == '_' {
                    self.advance_char();
                } else {
                    break;
                }
            }
        } else {
            let mut seen_dot = false;
            let mut seen_exponent = false;
            while let Some(ch) = self.peek_char() {
                match ch {
                    '0'..='9' | '_' => {
                        self.advance_char();
                    }
                    '.' if !seen_dot && !seen_exponent => {
                        seen_dot = true;
                        self.advance_char();
                    }
                    'e' | 'E' if !seen_exponent => {
                        seen_exponent = true;
                        self.advance_char();
                        if matches!(self.peek_char(), Some('+' | '-')) {
                            self.advance_char();
                        }
                    }
                    _ => break,
                }
            }
        }

        let digits_end = self.position;
        let is_bigint = self.peek_char() == Some('n');
        if is_bigint {
            self.advance_char();
        }
        if self.peek_char().map_or(false, is_identifier_start) {
            return Err(self.error_here(format!(
                "Identifier starts immediately after numeric literal at line {}, column {}",
                self.line, self.column
            )));
        }

        let lexeme = self.slice(start, self.position).to_string();
        let digits = self.slice(start, digits_end).replace('_', "");
        let invalid = || {
            SyntaxError::new(
                format!(
                    "Failed to parse numeric literal '{}' at line {}, column {}",
                    lexeme, start_line, start_column
                ),
                SourceSpan::single_point(start_line, start_column),
            )
        };

        let kind = if is_bigint {
            TokenKind::BigIntLiteral(digits)
        } else if radix != 10 {
            let value = u64::from_str_radix(&digits[2..], radix).map_err(|_| invalid())?;
            TokenKind::NumberLiteral(value as f64)
        } else {
            TokenKind::NumberLiteral(digits.parse::<f64>().map_err(|_| invalid())?)
        };

        Ok(Token::new(kind, lexeme, start_line, start_column))
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char();

        while let Some(ch) = self.peek_char() {
            if is_identifier_part(ch) {
                self.advance_char();
            } else {
                break;
            }
        }

        let lexeme = self.slice(start, self.position).to_string();
        let kind = if let Some(keyword) = keyword_from_lexeme(&lexeme) {
            TokenKind::Keyword(keyword)
        } else if lexeme == "true" {
            TokenKind::BooleanLiteral(true)
        } else if lexeme == "false" {
            TokenKind::BooleanLiteral(false)
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, lexeme, start_line, start_column)
    }

    fn lex_dot_variants(&mut self) -> Token {
        if self.input[self.position..].starts_with("...") {
            self.lex_operator(&[("...", TokenKind::DotDotDot)], TokenKind::Dot)
        } else {
            self.simple_token(TokenKind::Dot)
        }
    }

    fn lex_question_variants(&mut self) -> Token {
        self.lex_operator(
            &[
                ("??=", assign("??=")),
                ("??", TokenKind::QuestionQuestion),
            ],
            TokenKind::Question,
        )
    }

    fn lex_equals_variants(&mut self) -> Token {
        self.lex_operator(
            &[
                ("===", TokenKind::TripleEqual),
                ("==", TokenKind::DoubleEqual),
                ("=>", TokenKind::FatArrow),
            ],
            TokenKind::Equal,
        )
    }

    fn lex_bang_variants(&mut self) -> Token {
        self.lex_operator(
            &[
                ("!==", TokenKind::BangDoubleEqual),
                ("!=", TokenKind::BangEqual),
            ],
            TokenKind::Bang,
        )
    }

    fn lex_less_variants(&mut self) -> Token {
        self.lex_operator(
            &[
                ("<<=", assign("<<=")),
                ("<<", TokenKind::LessLess),
                ("<=", TokenKind::LessEqual),
            ],
            TokenKind::Less,
        )
    }

    fn lex_greater_variants(&mut self) -> Token {
        self.lex_operator(
            &[
                (">>>=", assign(">>>=")),
                (">>>", TokenKind::GreaterGreaterGreater),
                (">>=", assign(">>=")),
                (">>", TokenKind::GreaterGreater),
                (">=", TokenKind::GreaterEqual),
            ],
            TokenKind::Greater,
        )
    }

    /// Longest-match over `variants`, which must be ordered longest first.
    fn lex_operator(&mut self, variants: &[(&str, TokenKind)], fallback: TokenKind) -> Token {
        let start_line = self.line;
        let start_column = self.column;
        let start = self.position;
        let rest = &self.input[self.position..];

        let (length, kind) = variants
            .iter()
            .find(|(text, _)| rest.starts_with(text))
            .map(|(text, kind)| (text.chars().count(), kind.clone()))
            .unwrap_or((1, fallback));

        for _ in 0..length {
            self.advance_char();
        }
        Token::new(
            kind,
            self.slice(start, self.position).to_string(),
            start_line,
            start_column,
        )
    }

    fn simple_token(&mut self, kind: TokenKind) -> Token {
        let start_line = self.line;
        let start_column = self.column;
        let start = self.position;
        self.advance_char();
        Token::new(
            kind,
            self.slice(start, self.position).to_string(),
            start_line,
            start_column,
        )
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.input[self.position..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\r' && self.peek_char() == Some('\n') {
            self.position += 1;
        }
        if ch == '\r' || ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.input[start..end]
    }
}

fn assign(operator: &'static str) -> TokenKind {
    TokenKind::CompoundAssign(operator)
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn keyword_from_lexeme(lexeme: &str) -> Option<Keyword> {
    match lexeme {
        "let" => Some(Keyword::Let),
        "const" => Some(Keyword::Const),
        "var" => Some(Keyword::Var),
        "import" => Some(Keyword::Import),
        "export" => Some(Keyword::Export),
        "default" => Some(Keyword::Default),
        "return" => Some(Keyword::Return),
        "if" => Some(Keyword::If),
        "else" => Some(Keyword::Else),
        "function" => Some(Keyword::Function),
        "null" => Some(Keyword::Null),
        "typeof" => Some(Keyword::Typeof),
        "void" => Some(Keyword::Void),
        "delete" => Some(Keyword::Delete),
        "in" => Some(Keyword::In),
        "instanceof" => Some(Keyword::Instanceof),
        _ => None,
    }
}
