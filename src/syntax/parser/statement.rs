use crate::syntax::ast::{Expr, Ident, Stmt};
use crate::syntax::parser::Parser;
use crate::syntax::token::Token;

impl Parser<'_> {
    pub(super) fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.cur.tok {
            Token::If => self.parse_if_stmt(),
            Token::For => self.parse_for_stmt(),
            Token::Return => self.parse_return_stmt(),
            Token::Break => {
                let pos = self.cur.pos;
                self.next_token();
                self.expect_semi();
                Some(Stmt::Break { pos })
            }
            Token::Continue => {
                let pos = self.cur.pos;
                self.next_token();
                self.expect_semi();
                Some(Stmt::Continue { pos })
            }
            Token::Export => self.parse_export_stmt(),
            _ => {
                let stmt = self.parse_simple_stmt(false)?;
                self.expect_semi();
                Some(stmt)
            }
        }
    }

    /// An expression statement, assignment, declaration, or `++`/`--`.
    /// With `for_in` set, also recognises the `k, v in iterable` header.
    fn parse_simple_stmt(&mut self, for_in: bool) -> Option<Stmt> {
        let pos = self.cur.pos;
        let lhs = self.parse_expr_list()?;

        match self.cur.tok {
            Token::In if for_in => {
                self.next_token();
                let (key, value) = self.for_in_idents(&lhs)?;
                let iterable = self.parse_expr()?;
                // Body is parsed by the caller; pack the header into a ForIn
                // with an empty body for now.
                return Some(Stmt::ForIn {
                    key,
                    value,
                    iterable,
                    body: crate::syntax::ast::Block {
                        stmts: Vec::new(),
                        lbrace: pos,
                    },
                    pos,
                });
            }
            Token::Assign
            | Token::Define
            | Token::AddAssign
            | Token::SubAssign
            | Token::MulAssign
            | Token::QuoAssign
            | Token::RemAssign
            | Token::AndAssign
            | Token::OrAssign
            | Token::XorAssign
            | Token::ShlAssign
            | Token::ShrAssign
            | Token::AndNotAssign => {
                let op = self.cur.tok;
                self.next_token();
                let rhs = self.parse_expr_list()?;
                return Some(Stmt::Assign { op, lhs, rhs, pos });
            }
            Token::Inc | Token::Dec => {
                let op = if self.cur.tok == Token::Inc {
                    Token::AddAssign
                } else {
                    Token::SubAssign
                };
                self.next_token();
                return Some(Stmt::Assign {
                    op,
                    lhs,
                    rhs: vec![Expr::IntLit { value: 1, pos }],
                    pos,
                });
            }
            _ => {}
        }

        let mut lhs = lhs;
        if lhs.len() != 1 {
            self.error_at(pos, "expected 1 expression");
            return None;
        }
        Some(Stmt::Expr(lhs.remove(0)))
    }

    fn parse_expr_list(&mut self) -> Option<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.cur.tok == Token::Comma {
            self.next_token();
            list.push(self.parse_expr()?);
        }
        Some(list)
    }

    fn for_in_idents(&mut self, exprs: &[Expr]) -> Option<(Option<Ident>, Ident)> {
        let as_ident = |e: &Expr| match e {
            Expr::Ident(ident) => Some(ident.clone()),
            _ => None,
        };
        match exprs {
            [value] => match as_ident(value) {
                Some(value) => Some((None, value)),
                None => {
                    self.error_at(exprs[0].pos(), "expected identifier in for-in");
                    None
                }
            },
            [key, value] => match (as_ident(key), as_ident(value)) {
                (Some(key), Some(value)) => Some((Some(key), value)),
                _ => {
                    self.error_at(exprs[0].pos(), "expected identifiers in for-in");
                    None
                }
            },
            _ => {
                self.error_at(exprs[0].pos(), "expected at most 2 identifiers in for-in");
                None
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let pos = self.expect(Token::If);
        let (init, cond) = self.parse_if_header()?;
        let body = self.parse_block()?;
        let else_stmt = if self.cur.tok == Token::Else {
            self.next_token();
            match self.cur.tok {
                Token::If => Some(Box::new(self.parse_if_stmt()?)),
                Token::LBrace => {
                    let block = self.parse_block()?;
                    self.expect_semi();
                    Some(Box::new(Stmt::Block(block)))
                }
                _ => {
                    self.error_expected("'if' or '{'");
                    return None;
                }
            }
        } else {
            self.expect_semi();
            None
        };
        Some(Stmt::If {
            init,
            cond,
            body,
            else_stmt,
            pos,
        })
    }

    fn parse_if_header(&mut self) -> Option<(Option<Box<Stmt>>, Expr)> {
        if self.cur.tok == Token::LBrace {
            self.error_expected("condition");
            return None;
        }
        let stmt = self.parse_simple_stmt(false)?;
        if self.cur.tok == Token::Semicolon {
            self.next_token();
            let cond = self.parse_expr()?;
            return Some((Some(Box::new(stmt)), cond));
        }
        match stmt {
            Stmt::Expr(cond) => Some((None, cond)),
            _ => {
                self.error_at(stmt.pos(), "expected condition expression");
                None
            }
        }
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let pos = self.expect(Token::For);

        // for { ... }
        if self.cur.tok == Token::LBrace {
            let body = self.parse_block()?;
            self.expect_semi();
            return Some(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            });
        }

        // for ; cond ; post { ... }
        if self.cur.tok == Token::Semicolon {
            self.next_token();
            return self.parse_for_clauses(pos, None);
        }

        let header = self.parse_simple_stmt(true)?;
        if let Stmt::ForIn {
            key,
            value,
            iterable,
            ..
        } = header
        {
            let body = self.parse_block()?;
            self.expect_semi();
            return Some(Stmt::ForIn {
                key,
                value,
                iterable,
                body,
                pos,
            });
        }

        if self.cur.tok == Token::LBrace {
            // for cond { ... }
            match header {
                Stmt::Expr(cond) => {
                    let body = self.parse_block()?;
                    self.expect_semi();
                    return Some(Stmt::For {
                        init: None,
                        cond: Some(cond),
                        post: None,
                        body,
                        pos,
                    });
                }
                _ => {
                    self.error_at(header.pos(), "expected condition expression");
                    return None;
                }
            }
        }

        self.expect(Token::Semicolon);
        self.parse_for_clauses(pos, Some(Box::new(header)))
    }

    fn parse_for_clauses(
        &mut self,
        pos: crate::syntax::source::Pos,
        init: Option<Box<Stmt>>,
    ) -> Option<Stmt> {
        let cond = if self.cur.tok != Token::Semicolon {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(Token::Semicolon);
        let post = if self.cur.tok != Token::LBrace {
            Some(Box::new(self.parse_simple_stmt(false)?))
        } else {
            None
        };
        let body = self.parse_block()?;
        self.expect_semi();
        Some(Stmt::For {
            init,
            cond,
            post,
            body,
            pos,
        })
    }

    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let pos = self.expect(Token::Return);
        let result = if matches!(self.cur.tok, Token::Semicolon | Token::RBrace | Token::Eof) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_semi();
        Some(Stmt::Return { result, pos })
    }

    fn parse_export_stmt(&mut self) -> Option<Stmt> {
        let pos = self.expect(Token::Export);
        let result = self.parse_expr()?;
        self.expect_semi();
        Some(Stmt::Export { result, pos })
    }
}
