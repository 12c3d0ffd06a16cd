use crate::syntax::source::Pos;
use crate::syntax::token::Token;

/// A scanned token: kind, decoded literal text, position of its first byte.
pub type ScannedToken = (Token, String, Pos);

/// Hand-rolled scanner over one source file.
///
/// Semicolons are inserted at newlines after statement-ending tokens, so the
/// parser only ever sees explicit terminators.
pub struct Lexer<'a> {
    input: &'a [u8],
    file_base: Pos,
    ch: Option<char>,
    offset: usize,
    read_offset: usize,
    insert_semi: bool,
    pub errors: Vec<(Pos, String)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8], file_base: Pos) -> Self {
        let mut lexer = Self {
            input,
            file_base,
            ch: None,
            offset: 0,
            read_offset: 0,
            insert_semi: false,
            errors: Vec::new(),
        };
        lexer.advance();
        lexer
    }

    fn advance(&mut self) {
        self.offset = self.read_offset;
        if self.read_offset >= self.input.len() {
            self.ch = None;
            return;
        }
        let rest = &self.input[self.read_offset..];
        let ch = match std::str::from_utf8(rest) {
            Ok(s) => s.chars().next(),
            Err(e) if e.valid_up_to() > 0 => {
                std::str::from_utf8(&rest[..e.valid_up_to()])
                    .ok()
                    .and_then(|s| s.chars().next())
            }
            Err(_) => {
                self.error(self.offset, "invalid UTF-8 byte".to_string());
                self.read_offset += 1;
                self.ch = Some('\u{FFFD}');
                return;
            }
        };
        match ch {
            Some(c) => {
                self.read_offset += c.len_utf8();
                self.ch = Some(c);
            }
            None => self.ch = None,
        }
    }

    fn peek(&self) -> Option<char> {
        if self.read_offset >= self.input.len() {
            return None;
        }
        std::str::from_utf8(&self.input[self.read_offset..])
            .ok()
            .and_then(|s| s.chars().next())
            .or_else(|| {
                let end = (self.read_offset + 4).min(self.input.len());
                std::str::from_utf8(&self.input[self.read_offset..end])
                    .ok()
                    .and_then(|s| s.chars().next())
            })
    }

    fn pos(&self, offset: usize) -> Pos {
        self.file_base + offset
    }

    fn error(&mut self, offset: usize, message: String) {
        let pos = self.pos(offset);
        self.errors.push((pos, message));
    }

    pub fn next_token(&mut self) -> ScannedToken {
        loop {
            match self.ch {
                Some(' ') | Some('\t') | Some('\r') => self.advance(),
                Some('\n') => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        let pos = self.pos(self.offset);
                        self.advance();
                        return (Token::Semicolon, "\n".to_string(), pos);
                    }
                    self.advance();
                }
                Some('/') if self.peek() == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek() == Some('*') => self.skip_block_comment(),
                _ => break,
            }
        }

        let start = self.offset;
        let pos = self.pos(start);

        let ch = match self.ch {
            Some(c) => c,
            None => {
                if self.insert_semi {
                    self.insert_semi = false;
                    return (Token::Semicolon, "\n".to_string(), pos);
                }
                return (Token::Eof, String::new(), pos);
            }
        };

        if ch.is_alphabetic() || ch == '_' {
            let literal = self.read_identifier();
            let tok = Token::is_keyword(&literal).unwrap_or(Token::Ident);
            self.insert_semi = matches!(
                tok,
                Token::Ident
                    | Token::Break
                    | Token::Continue
                    | Token::Return
                    | Token::True
                    | Token::False
                    | Token::Undefined
            );
            return (tok, literal, pos);
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek().is_some_and(|c| c.is_ascii_digit())) {
            self.insert_semi = true;
            let (tok, literal) = self.read_number();
            return (tok, literal, pos);
        }

        self.insert_semi = false;
        match ch {
            '"' => {
                self.insert_semi = true;
                let literal = self.read_string('"');
                (Token::String, literal, pos)
            }
            '`' => {
                self.insert_semi = true;
                let literal = self.read_raw_string();
                (Token::String, literal, pos)
            }
            '\'' => {
                self.insert_semi = true;
                let literal = self.read_char_literal();
                (Token::Char, literal, pos)
            }
            _ => {
                self.advance();
                let tok = self.scan_operator(ch, start);
                if matches!(
                    tok,
                    Token::RParen | Token::RBrack | Token::RBrace | Token::Inc | Token::Dec
                ) {
                    self.insert_semi = true;
                }
                let literal = match tok {
                    Token::Illegal => ch.to_string(),
                    _ => tok.to_string(),
                };
                (tok, literal, pos)
            }
        }
    }

    fn scan_operator(&mut self, ch: char, start: usize) -> Token {
        // The first character is already consumed; multi-character operators
        // consume their tail here.
        match ch {
            '+' => self.switch3('+', '=', Token::Add, Token::Inc, Token::AddAssign),
            '-' => self.switch3('-', '=', Token::Sub, Token::Dec, Token::SubAssign),
            '*' => self.switch2('=', Token::Mul, Token::MulAssign),
            '/' => self.switch2('=', Token::Quo, Token::QuoAssign),
            '%' => self.switch2('=', Token::Rem, Token::RemAssign),
            '^' => self.switch2('=', Token::Xor, Token::XorAssign),
            '<' => {
                if self.ch == Some('<') {
                    self.advance();
                    self.switch2('=', Token::Shl, Token::ShlAssign)
                } else {
                    self.switch2('=', Token::Less, Token::LessEq)
                }
            }
            '>' => {
                if self.ch == Some('>') {
                    self.advance();
                    self.switch2('=', Token::Shr, Token::ShrAssign)
                } else {
                    self.switch2('=', Token::Greater, Token::GreaterEq)
                }
            }
            '=' => self.switch2('=', Token::Assign, Token::Equal),
            '!' => self.switch2('=', Token::Not, Token::NotEqual),
            '&' => {
                if self.ch == Some('^') {
                    self.advance();
                    self.switch2('=', Token::AndNot, Token::AndNotAssign)
                } else {
                    self.switch3('&', '=', Token::And, Token::LAnd, Token::AndAssign)
                }
            }
            '|' => self.switch3('|', '=', Token::Or, Token::LOr, Token::OrAssign),
            ':' => self.switch2('=', Token::Colon, Token::Define),
            '.' => {
                if self.ch == Some('.') && self.peek() == Some('.') {
                    self.advance();
                    self.advance();
                    Token::Ellipsis
                } else {
                    Token::Period
                }
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBrack,
            ']' => Token::RBrack,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '?' => Token::Question,
            _ => {
                self.error(
                    start,
                    format!("illegal character U+{:04X} '{}'", ch as u32, ch),
                );
                Token::Illegal
            }
        }
    }

    fn switch2(&mut self, next: char, tok0: Token, tok1: Token) -> Token {
        if self.ch == Some(next) {
            self.advance();
            tok1
        } else {
            tok0
        }
    }

    fn switch3(&mut self, next1: char, next2: char, tok0: Token, tok1: Token, tok2: Token) -> Token {
        if self.ch == Some(next1) {
            self.advance();
            tok1
        } else if self.ch == Some(next2) {
            self.advance();
            tok2
        } else {
            tok0
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.ch {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.offset;
        self.advance(); // '/'
        self.advance(); // '*'
        loop {
            match self.ch {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some(_) => self.advance(),
                None => {
                    self.error(start, "comment not terminated".to_string());
                    return;
                }
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.offset;
        while self.ch.is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        String::from_utf8_lossy(&self.input[start..self.offset]).into_owned()
    }

    fn read_number(&mut self) -> (Token, String) {
        let start = self.offset;
        let mut tok = Token::Int;

        if self.ch == Some('0') {
            self.advance();
            match self.ch {
                Some('x') | Some('X') => {
                    self.advance();
                    self.consume_digits(16);
                    let literal =
                        String::from_utf8_lossy(&self.input[start..self.offset]).into_owned();
                    return (Token::Int, literal);
                }
                Some('b') | Some('B') => {
                    self.advance();
                    self.consume_digits(2);
                    let literal =
                        String::from_utf8_lossy(&self.input[start..self.offset]).into_owned();
                    return (Token::Int, literal);
                }
                Some('o') | Some('O') => {
                    self.advance();
                    self.consume_digits(8);
                    let literal =
                        String::from_utf8_lossy(&self.input[start..self.offset]).into_owned();
                    return (Token::Int, literal);
                }
                _ => {}
            }
        }
        self.consume_digits(10);
        if self.ch == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            tok = Token::Float;
            self.advance();
            self.consume_digits(10);
        }
        if matches!(self.ch, Some('e') | Some('E')) {
            tok = Token::Float;
            self.advance();
            if matches!(self.ch, Some('+') | Some('-')) {
                self.advance();
            }
            if !self.ch.is_some_and(|c| c.is_ascii_digit()) {
                self.error(self.offset, "malformed exponent in number".to_string());
            }
            self.consume_digits(10);
        }
        let literal = String::from_utf8_lossy(&self.input[start..self.offset]).into_owned();
        (tok, literal)
    }

    fn consume_digits(&mut self, radix: u32) {
        while self.ch.is_some_and(|c| c.is_digit(radix) || c == '_') {
            self.advance();
        }
    }

    fn read_string(&mut self, quote: char) -> String {
        let start = self.offset;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.ch {
                Some(c) if c == quote => {
                    self.advance();
                    return value;
                }
                Some('\\') => {
                    if let Some(c) = self.read_escape(quote) {
                        value.push(c);
                    }
                }
                Some('\n') | None => {
                    self.error(start, "string literal not terminated".to_string());
                    return value;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_raw_string(&mut self) -> String {
        let start = self.offset;
        self.advance(); // opening backtick
        let mut value = String::new();
        loop {
            match self.ch {
                Some('`') => {
                    self.advance();
                    return value;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => {
                    self.error(start, "string literal not terminated".to_string());
                    return value;
                }
            }
        }
    }

    fn read_char_literal(&mut self) -> String {
        let start = self.offset;
        self.advance(); // opening quote
        let value = match self.ch {
            Some('\\') => self.read_escape('\''),
            Some('\'') | Some('\n') | None => {
                self.error(start, "char literal not terminated".to_string());
                None
            }
            Some(c) => {
                self.advance();
                Some(c)
            }
        };
        if self.ch == Some('\'') {
            self.advance();
        } else {
            self.error(start, "char literal not terminated".to_string());
        }
        value.map(|c| c.to_string()).unwrap_or_default()
    }

    /// Consumes a backslash escape; the cursor sits on the backslash.
    fn read_escape(&mut self, quote: char) -> Option<char> {
        let start = self.offset;
        self.advance(); // backslash
        let c = self.ch?;
        self.advance();
        let decoded = match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            '\\' => '\\',
            'x' => return self.read_hex_escape(start, 2),
            'u' => return self.read_hex_escape(start, 4),
            c if c == quote => quote,
            _ => {
                self.error(start, format!("unknown escape sequence '\\{}'", c));
                return None;
            }
        };
        Some(decoded)
    }

    fn read_hex_escape(&mut self, start: usize, digits: usize) -> Option<char> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let d = self.ch.and_then(|c| c.to_digit(16));
            match d {
                Some(d) => {
                    value = value * 16 + d;
                    self.advance();
                }
                None => {
                    self.error(start, "malformed hex escape sequence".to_string());
                    return None;
                }
            }
        }
        match char::from_u32(value) {
            Some(c) => Some(c),
            None => {
                self.error(start, "escape sequence is not a valid character".to_string());
                None
            }
        }
    }
}
