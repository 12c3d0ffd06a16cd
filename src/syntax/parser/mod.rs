use crate::syntax::ast::File;
use crate::syntax::errors::ErrorList;
use crate::syntax::lexer::Lexer;
use crate::syntax::source::{Pos, SourceFile};
use crate::syntax::token::Token;

mod expression;
mod statement;

/// Parse errors beyond this count abandon the parse; the tail is summarised
/// by the error list's display.
const MAX_ERRORS: usize = 10;

#[derive(Debug, Clone)]
pub(super) struct TokenInfo {
    pub tok: Token,
    pub literal: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    Lowest,
    LogicalOr,   // ||
    LogicalAnd,  // &&
    Comparison,  // == != < > <= >=
    Sum,         // + - | ^
    Product,     // * / % << >> & &^
}

pub(super) fn token_precedence(tok: Token) -> Precedence {
    match tok {
        Token::LOr => Precedence::LogicalOr,
        Token::LAnd => Precedence::LogicalAnd,
        Token::Equal
        | Token::NotEqual
        | Token::Less
        | Token::Greater
        | Token::LessEq
        | Token::GreaterEq => Precedence::Comparison,
        Token::Add | Token::Sub | Token::Or | Token::Xor => Precedence::Sum,
        Token::Mul
        | Token::Quo
        | Token::Rem
        | Token::Shl
        | Token::Shr
        | Token::And
        | Token::AndNot => Precedence::Product,
        _ => Precedence::Lowest,
    }
}

pub struct Parser<'a> {
    pub(super) lexer: Lexer<'a>,
    pub(super) file: &'a SourceFile,
    pub(super) cur: TokenInfo,
    pub(super) peek: TokenInfo,
    pub(super) errors: ErrorList,
    lexer_errors_taken: usize,
}

/// Parses one source file into its AST, aggregating errors.
pub fn parse_file(file: &SourceFile, input: &[u8]) -> Result<File, ErrorList> {
    let mut parser = Parser::new(file, input);
    parser.parse()
}

impl<'a> Parser<'a> {
    pub fn new(file: &'a SourceFile, input: &'a [u8]) -> Self {
        let lexer = Lexer::new(input, file.base);
        let eof = TokenInfo {
            tok: Token::Eof,
            literal: String::new(),
            pos: file.base,
        };
        let mut parser = Self {
            lexer,
            file,
            cur: eof.clone(),
            peek: eof,
            errors: ErrorList::new(),
            lexer_errors_taken: 0,
        };
        parser.next_token();
        parser.next_token();
        parser
    }

    pub fn parse(&mut self) -> Result<File, ErrorList> {
        let mut stmts = Vec::new();
        while self.cur.tok != Token::Eof {
            if self.errors.len() >= MAX_ERRORS {
                break;
            }
            if self.cur.tok == Token::Semicolon {
                self.next_token();
                continue;
            }
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.sync(),
            }
        }
        // Anything the lexer flagged after the parser stopped pulling tokens.
        self.drain_lexer_errors();
        if self.errors.is_empty() {
            Ok(File { stmts })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    pub(super) fn next_token(&mut self) {
        let next = self.scan();
        self.cur = std::mem::replace(&mut self.peek, next);
    }

    fn scan(&mut self) -> TokenInfo {
        loop {
            let (tok, literal, pos) = self.lexer.next_token();
            self.drain_lexer_errors();
            // The lexer already reported illegal characters.
            if tok != Token::Illegal {
                return TokenInfo { tok, literal, pos };
            }
        }
    }

    fn drain_lexer_errors(&mut self) {
        while self.lexer_errors_taken < self.lexer.errors.len() {
            let (pos, message) = self.lexer.errors[self.lexer_errors_taken].clone();
            self.lexer_errors_taken += 1;
            if self.errors.len() <= MAX_ERRORS {
                self.errors.add(message, self.file.position(pos));
            }
        }
    }

    pub(super) fn error_at(&mut self, pos: Pos, message: impl Into<String>) {
        if self.errors.len() <= MAX_ERRORS {
            self.errors.add(message, self.file.position(pos));
        }
    }

    pub(super) fn error_expected(&mut self, what: &str) {
        let found = match self.cur.tok {
            Token::Eof => "end of file".to_string(),
            Token::Semicolon if self.cur.literal == "\n" => "newline".to_string(),
            _ => format!("'{}'", self.cur.literal),
        };
        self.error_at(self.cur.pos, format!("expected {}, found {}", what, found));
    }

    /// Consumes the expected token or records an error. Returns its position.
    pub(super) fn expect(&mut self, tok: Token) -> Pos {
        let pos = self.cur.pos;
        if self.cur.tok == tok {
            self.next_token();
        } else {
            self.error_expected(&format!("'{}'", tok));
        }
        pos
    }

    /// Statement terminator: an explicit or inserted semicolon, or a block
    /// or file end.
    pub(super) fn expect_semi(&mut self) {
        match self.cur.tok {
            Token::Semicolon => self.next_token(),
            Token::RBrace | Token::Eof => {}
            _ => {
                self.error_expected("';'");
                self.sync();
            }
        }
    }

    /// Skips ahead to the next statement boundary after an error.
    pub(super) fn sync(&mut self) {
        loop {
            match self.cur.tok {
                Token::Semicolon => {
                    self.next_token();
                    return;
                }
                Token::Eof | Token::RBrace => return,
                _ => self.next_token(),
            }
        }
    }
}
