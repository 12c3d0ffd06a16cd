use crate::syntax::source::Pos;
use crate::syntax::token::Token;

/// A parsed source file: the top-level statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub lbrace: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapElement {
    pub key: String,
    pub key_pos: Pos,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    IntLit {
        value: i64,
        pos: Pos,
    },
    FloatLit {
        value: f64,
        pos: Pos,
    },
    BoolLit {
        value: bool,
        pos: Pos,
    },
    CharLit {
        value: char,
        pos: Pos,
    },
    StringLit {
        value: String,
        pos: Pos,
    },
    UndefinedLit {
        pos: Pos,
    },
    ArrayLit {
        elements: Vec<Expr>,
        lbrack: Pos,
    },
    MapLit {
        elements: Vec<MapElement>,
        lbrace: Pos,
    },
    FuncLit {
        params: Vec<Ident>,
        variadic: bool,
        body: Block,
        pos: Pos,
    },
    Unary {
        op: Token,
        expr: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: Token,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// Ternary `cond ? then : alt`.
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        alt: Box<Expr>,
        pos: Pos,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Slice {
        expr: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        pos: Pos,
    },
    /// `a.b`, lowered like `a["b"]`.
    Selector {
        expr: Box<Expr>,
        sel: String,
        sel_pos: Pos,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        has_spread: bool,
        pos: Pos,
    },
    Import {
        module_name: String,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Ident(ident) => ident.pos,
            Expr::IntLit { pos, .. }
            | Expr::FloatLit { pos, .. }
            | Expr::BoolLit { pos, .. }
            | Expr::CharLit { pos, .. }
            | Expr::StringLit { pos, .. }
            | Expr::UndefinedLit { pos }
            | Expr::FuncLit { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Import { pos, .. } => *pos,
            Expr::ArrayLit { lbrack, .. } => *lbrack,
            Expr::MapLit { lbrace, .. } => *lbrace,
            Expr::Binary { lhs, .. } => lhs.pos(),
            Expr::Cond { cond, .. } => cond.pos(),
            Expr::Index { expr, .. }
            | Expr::Slice { expr, .. }
            | Expr::Selector { expr, .. } => expr.pos(),
            Expr::Call { func, .. } => func.pos(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// `:=`, `=` and the compound assignment forms. `++`/`--` are desugared
    /// by the parser into `+= 1` / `-= 1`.
    Assign {
        op: Token,
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        pos: Pos,
    },
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        else_stmt: Option<Box<Stmt>>,
        pos: Pos,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        pos: Pos,
    },
    ForIn {
        key: Option<Ident>,
        value: Ident,
        iterable: Expr,
        body: Block,
        pos: Pos,
    },
    Return {
        result: Option<Expr>,
        pos: Pos,
    },
    Break {
        pos: Pos,
    },
    Continue {
        pos: Pos,
    },
    Export {
        result: Expr,
        pos: Pos,
    },
    Block(Block),
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Expr(expr) => expr.pos(),
            Stmt::Assign { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::ForIn { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Break { pos }
            | Stmt::Continue { pos }
            | Stmt::Export { pos, .. } => *pos,
            Stmt::Block(block) => block.lbrace,
        }
    }
}
