use crate::syntax::ast::{Block, Expr, Ident, MapElement};
use crate::syntax::parser::{Parser, Precedence, token_precedence};
use crate::syntax::token::Token;

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> Option<Expr> {
        let expr = self.parse_binary_expr(Precedence::Lowest)?;
        if self.cur.tok == Token::Question {
            let pos = self.cur.pos;
            self.next_token();
            let then = self.parse_expr()?;
            self.expect(Token::Colon);
            let alt = self.parse_expr()?;
            return Some(Expr::Cond {
                cond: Box::new(expr),
                then: Box::new(then),
                alt: Box::new(alt),
                pos,
            });
        }
        Some(expr)
    }

    fn parse_binary_expr(&mut self, min_prec: Precedence) -> Option<Expr> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let op = self.cur.tok;
            let prec = token_precedence(op);
            if prec == Precedence::Lowest || prec <= min_prec {
                return Some(lhs);
            }
            let pos = self.cur.pos;
            self.next_token();
            let rhs = self.parse_binary_expr(prec)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
    }

    fn parse_unary_expr(&mut self) -> Option<Expr> {
        match self.cur.tok {
            Token::Sub | Token::Not => {
                let op = self.cur.tok;
                let pos = self.cur.pos;
                self.next_token();
                let expr = self.parse_unary_expr()?;
                Some(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                    pos,
                })
            }
            _ => self.parse_primary_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> Option<Expr> {
        let mut expr = self.parse_operand()?;
        loop {
            match self.cur.tok {
                Token::Period => {
                    self.next_token();
                    if self.cur.tok != Token::Ident {
                        self.error_expected("selector name");
                        return None;
                    }
                    let sel = self.cur.literal.clone();
                    let sel_pos = self.cur.pos;
                    self.next_token();
                    expr = Expr::Selector {
                        expr: Box::new(expr),
                        sel,
                        sel_pos,
                    };
                }
                Token::LBrack => {
                    expr = self.parse_index_or_slice(expr)?;
                }
                Token::LParen => {
                    expr = self.parse_call(expr)?;
                }
                _ => return Some(expr),
            }
        }
    }

    fn parse_index_or_slice(&mut self, expr: Expr) -> Option<Expr> {
        let pos = self.expect(Token::LBrack);
        let mut low = None;
        let mut is_slice = false;
        if self.cur.tok != Token::Colon {
            low = Some(self.parse_expr()?);
        }
        if self.cur.tok == Token::Colon {
            is_slice = true;
            self.next_token();
        }
        if is_slice {
            let high = if self.cur.tok != Token::RBrack {
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect(Token::RBrack);
            return Some(Expr::Slice {
                expr: Box::new(expr),
                low: low.map(Box::new),
                high,
                pos,
            });
        }
        let index = match low {
            Some(index) => index,
            None => {
                self.error_expected("index expression");
                return None;
            }
        };
        self.expect(Token::RBrack);
        Some(Expr::Index {
            expr: Box::new(expr),
            index: Box::new(index),
            pos,
        })
    }

    fn parse_call(&mut self, func: Expr) -> Option<Expr> {
        let pos = self.expect(Token::LParen);
        let mut args = Vec::new();
        let mut has_spread = false;
        while self.cur.tok != Token::RParen && self.cur.tok != Token::Eof {
            if has_spread {
                self.error_expected("')' after '...' argument");
                return None;
            }
            args.push(self.parse_expr()?);
            if self.cur.tok == Token::Ellipsis {
                has_spread = true;
                self.next_token();
            }
            if self.cur.tok == Token::Comma {
                self.next_token();
            } else {
                break;
            }
        }
        self.expect(Token::RParen);
        Some(Expr::Call {
            func: Box::new(func),
            args,
            has_spread,
            pos,
        })
    }

    fn parse_operand(&mut self) -> Option<Expr> {
        let pos = self.cur.pos;
        let expr = match self.cur.tok {
            Token::Ident => {
                let name = self.cur.literal.clone();
                self.next_token();
                return Some(Expr::Ident(Ident { name, pos }));
            }
            Token::Int => {
                let value = self.parse_int_literal();
                Expr::IntLit { value, pos }
            }
            Token::Float => {
                let value = self.cur.literal.replace('_', "").parse().unwrap_or_else(|_| {
                    self.error_at(pos, "malformed float literal");
                    0.0
                });
                Expr::FloatLit { value, pos }
            }
            Token::Char => {
                let value = self.cur.literal.chars().next().unwrap_or('\0');
                Expr::CharLit { value, pos }
            }
            Token::String => Expr::StringLit {
                value: self.cur.literal.clone(),
                pos,
            },
            Token::True => Expr::BoolLit { value: true, pos },
            Token::False => Expr::BoolLit { value: false, pos },
            Token::Undefined => Expr::UndefinedLit { pos },
            Token::Import => return self.parse_import(),
            Token::Func => return self.parse_func_lit(),
            Token::LParen => {
                self.next_token();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen);
                return Some(inner);
            }
            Token::LBrack => return self.parse_array_lit(),
            Token::LBrace => return self.parse_map_lit(),
            _ => {
                self.error_expected("expression");
                return None;
            }
        };
        self.next_token();
        Some(expr)
    }

    fn parse_int_literal(&mut self) -> i64 {
        let literal = self.cur.literal.replace('_', "");
        let parsed = if let Some(hex) = literal.strip_prefix("0x").or(literal.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else if let Some(bin) = literal.strip_prefix("0b").or(literal.strip_prefix("0B")) {
            i64::from_str_radix(bin, 2)
        } else if let Some(oct) = literal.strip_prefix("0o").or(literal.strip_prefix("0O")) {
            i64::from_str_radix(oct, 8)
        } else {
            literal.parse()
        };
        match parsed {
            Ok(v) => v,
            Err(_) => {
                let pos = self.cur.pos;
                self.error_at(pos, "malformed int literal");
                0
            }
        }
    }

    fn parse_import(&mut self) -> Option<Expr> {
        let pos = self.expect(Token::Import);
        self.expect(Token::LParen);
        if self.cur.tok != Token::String {
            self.error_expected("module name string");
            return None;
        }
        let module_name = self.cur.literal.clone();
        self.next_token();
        self.expect(Token::RParen);
        Some(Expr::Import { module_name, pos })
    }

    fn parse_func_lit(&mut self) -> Option<Expr> {
        let pos = self.expect(Token::Func);
        self.expect(Token::LParen);
        let mut params = Vec::new();
        let mut variadic = false;
        while self.cur.tok != Token::RParen && self.cur.tok != Token::Eof {
            if variadic {
                self.error_expected("')' after variadic parameter");
                return None;
            }
            if self.cur.tok == Token::Ellipsis {
                variadic = true;
                self.next_token();
            }
            if self.cur.tok != Token::Ident {
                self.error_expected("parameter name");
                return None;
            }
            params.push(Ident {
                name: self.cur.literal.clone(),
                pos: self.cur.pos,
            });
            self.next_token();
            if self.cur.tok == Token::Comma {
                self.next_token();
            } else {
                break;
            }
        }
        self.expect(Token::RParen);
        let body = self.parse_block()?;
        Some(Expr::FuncLit {
            params,
            variadic,
            body,
            pos,
        })
    }

    fn parse_array_lit(&mut self) -> Option<Expr> {
        let lbrack = self.expect(Token::LBrack);
        let mut elements = Vec::new();
        self.skip_newlines();
        while self.cur.tok != Token::RBrack && self.cur.tok != Token::Eof {
            elements.push(self.parse_expr()?);
            self.skip_newlines();
            if self.cur.tok == Token::Comma {
                self.next_token();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect(Token::RBrack);
        Some(Expr::ArrayLit { elements, lbrack })
    }

    fn parse_map_lit(&mut self) -> Option<Expr> {
        let lbrace = self.expect(Token::LBrace);
        let mut elements = Vec::new();
        self.skip_newlines();
        while self.cur.tok != Token::RBrace && self.cur.tok != Token::Eof {
            let key_pos = self.cur.pos;
            let key = match self.cur.tok {
                Token::Ident | Token::String => self.cur.literal.clone(),
                _ => {
                    self.error_expected("map key");
                    return None;
                }
            };
            self.next_token();
            self.expect(Token::Colon);
            let value = self.parse_expr()?;
            elements.push(MapElement {
                key,
                key_pos,
                value,
            });
            self.skip_newlines();
            if self.cur.tok == Token::Comma {
                self.next_token();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect(Token::RBrace);
        Some(Expr::MapLit { elements, lbrace })
    }

    /// Inserted semicolons are transparent inside bracketed literals.
    fn skip_newlines(&mut self) {
        while self.cur.tok == Token::Semicolon && self.cur.literal == "\n" {
            self.next_token();
        }
    }

    pub(super) fn parse_block(&mut self) -> Option<Block> {
        let lbrace = self.expect(Token::LBrace);
        let mut stmts = Vec::new();
        while self.cur.tok != Token::RBrace && self.cur.tok != Token::Eof {
            if self.cur.tok == Token::Semicolon {
                self.next_token();
                continue;
            }
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.sync(),
            }
            if self.errors.len() >= super::MAX_ERRORS {
                break;
            }
        }
        self.expect(Token::RBrace);
        Some(Block { stmts, lbrace })
    }
}
