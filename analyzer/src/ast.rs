// AST node types for kernel-C source files.
//
// Covers the C subset the checks need: struct definitions, function
// prototypes and definitions, declarations, the structured control-flow
// statements and the full C expression grammar minus the comma operator.
// Every node carries a `SimpleSpan` for error reporting in downstream phases.
//
// Preconditions: produced by the parser from a valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;
use std::fmt;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete translation unit: the top-level items of one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Struct(StructDef),
    Typedef(TypedefDecl),
    Function(FunctionDecl),
    Global(DeclStmt),
}

// ── Types ──

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    /// A builtin or typedef name (`int`, `float4`, `Particle`).
    Named(Ident),
    /// `struct Tag`
    Struct(Ident),
}

/// A declared type. Qualifiers are dropped; only the base name and the
/// pointer depth survive.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: TypeName,
    pub pointer_depth: usize,
    pub span: Span,
}

/// `struct Tag { fields }` or `typedef struct Tag? { fields } Alias;`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub tag: Option<Ident>,
    pub alias: Option<Ident>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub ty: TypeSpec,
    pub name: Ident,
}

/// `typedef <type> Alias;` for non-struct-body typedefs.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub ty: TypeSpec,
    pub alias: Ident,
    pub span: Span,
}

// ── Functions ──

/// A function prototype (`body == None`) or definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub is_kernel: bool,
    pub ret: TypeSpec,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeSpec,
    /// `None` for unnamed parameters, including `(void)`.
    pub name: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ── Declarations ──

/// `type declarator (, declarator)*`
#[derive(Debug, Clone, PartialEq)]
pub struct DeclStmt {
    pub ty: TypeSpec,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    /// Extra `*`s written on this declarator (`int *a, **b`).
    pub pointer_depth: usize,
    pub name: Ident,
    /// Array dimensions; `None` for `[]`.
    pub array_dims: Vec<Option<Expr>>,
    pub init: Option<Expr>,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Compound(Block),
    Decl(DeclStmt),
    Expr(Expr),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    Switch(SwitchStmt),
    /// `case <expr>:`, a label statement inside a switch body.
    Case(Expr),
    /// `default:`
    Default,
    Break,
    Continue,
    Return(Option<Expr>),
    Goto(Ident),
    /// `name:`
    Label(Ident),
    /// `;`
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    /// Either a `Decl` or an `Expr` statement.
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub cond: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub cond: Expr,
    pub body: Box<Stmt>,
}

/// The loop forms that produce a backward branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopKind::For => "for",
            LoopKind::While => "while",
            LoopKind::DoWhile => "do",
        })
    }
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(u64),
    FloatLit(f64),
    CharLit,
    StrLit(String),
    /// A bare name: a variable or a function reference (see `resolve`).
    Name(String),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `base.field` or `base->field`
    Member {
        base: Box<Expr>,
        field: Ident,
        arrow: bool,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Cast {
        ty: TypeSpec,
        operand: Box<Expr>,
    },
    SizeOfExpr(Box<Expr>),
    SizeOfType(TypeSpec),
    /// `{ a, b, c }` in an initializer.
    InitList(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Deref,
    AddrOf,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

/// `= *= /= %= += -= <<= >>= &= ^= |=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    And,
    Xor,
    Or,
}

// ── Generic traversal ──

/// A borrowed statement or expression, the unit of every preorder walk.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl<'a> Node<'a> {
    pub fn span(&self) -> Span {
        match self {
            Node::Stmt(s) => s.span,
            Node::Expr(e) => e.span,
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<Node<'a>> {
        match self {
            Node::Stmt(s) => s.children(),
            Node::Expr(e) => e.children().into_iter().map(Node::Expr).collect(),
        }
    }

    pub fn as_call(&self) -> Option<&'a Expr> {
        match self {
            Node::Expr(e) if matches!(e.kind, ExprKind::Call { .. }) => Some(e),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn children(&self) -> Vec<Node<'_>> {
        let mut out = Vec::new();
        match &self.kind {
            StmtKind::Compound(block) => out.extend(block.stmts.iter().map(Node::Stmt)),
            StmtKind::Decl(decl) => out.extend(decl.exprs().map(Node::Expr)),
            StmtKind::Expr(e) | StmtKind::Case(e) => out.push(Node::Expr(e)),
            StmtKind::Return(value) => out.extend(value.iter().map(Node::Expr)),
            StmtKind::If(s) => {
                out.push(Node::Expr(&s.cond));
                out.push(Node::Stmt(&s.then_branch));
                if let Some(e) = &s.else_branch {
                    out.push(Node::Stmt(e));
                }
            }
            StmtKind::For(s) => {
                if let Some(init) = &s.init {
                    out.push(Node::Stmt(init));
                }
                out.extend(s.cond.iter().map(Node::Expr));
                out.extend(s.step.iter().map(Node::Expr));
                out.push(Node::Stmt(&s.body));
            }
            StmtKind::While(s) => {
                out.push(Node::Expr(&s.cond));
                out.push(Node::Stmt(&s.body));
            }
            StmtKind::DoWhile(s) => {
                out.push(Node::Stmt(&s.body));
                out.push(Node::Expr(&s.cond));
            }
            StmtKind::Switch(s) => {
                out.push(Node::Expr(&s.cond));
                out.push(Node::Stmt(&s.body));
            }
            StmtKind::Default
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Goto(_)
            | StmtKind::Label(_)
            | StmtKind::Empty => {}
        }
        out
    }

    /// True for statements that transfer control or open a nested branch.
    pub fn is_branching(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If(_)
                | StmtKind::For(_)
                | StmtKind::While(_)
                | StmtKind::DoWhile(_)
                | StmtKind::Switch(_)
                | StmtKind::Return(_)
                | StmtKind::Continue
                | StmtKind::Goto(_)
                | StmtKind::Label(_)
        )
    }
}

impl DeclStmt {
    /// Array-dimension and initializer expressions of every declarator.
    pub fn exprs(&self) -> impl Iterator<Item = &Expr> {
        self.declarators.iter().flat_map(|d| {
            d.array_dims
                .iter()
                .flatten()
                .chain(d.init.iter())
        })
    }
}

impl Expr {
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::CharLit
            | ExprKind::StrLit(_)
            | ExprKind::Name(_)
            | ExprKind::SizeOfType(_) => Vec::new(),
            ExprKind::Call { callee, args } => {
                let mut out = vec![callee.as_ref()];
                out.extend(args.iter());
                out
            }
            ExprKind::Member { base, .. } => vec![base.as_ref()],
            ExprKind::Index { base, index } => vec![base.as_ref(), index.as_ref()],
            ExprKind::Unary { operand, .. }
            | ExprKind::Postfix { operand, .. }
            | ExprKind::Cast { operand, .. }
            | ExprKind::SizeOfExpr(operand) => vec![operand.as_ref()],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            ExprKind::Assign { target, value, .. } => vec![target.as_ref(), value.as_ref()],
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => vec![cond.as_ref(), then_expr.as_ref(), else_expr.as_ref()],
            ExprKind::InitList(items) => items.iter().collect(),
        }
    }
}

/// Push `root` and all of its descendants in preorder.
pub fn preorder<'a>(root: Node<'a>, out: &mut Vec<Node<'a>>) {
    out.push(root);
    for child in root.children() {
        preorder(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(start: usize, end: usize) -> Span {
        (start..end).into()
    }

    fn name(n: &str, start: usize) -> Expr {
        Expr {
            kind: ExprKind::Name(n.to_string()),
            span: sp(start, start + n.len()),
        }
    }

    #[test]
    fn expr_children_in_source_order() {
        let call = Expr {
            kind: ExprKind::Call {
                callee: Box::new(name("f", 0)),
                args: vec![name("a", 2), name("b", 5)],
            },
            span: sp(0, 7),
        };
        let names: Vec<_> = call
            .children()
            .iter()
            .map(|c| match &c.kind {
                ExprKind::Name(n) => n.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, vec!["f", "a", "b"]);
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let stmt = Stmt {
            kind: StmtKind::While(WhileStmt {
                cond: name("x", 7),
                body: Box::new(Stmt {
                    kind: StmtKind::Expr(name("y", 11)),
                    span: sp(11, 13),
                }),
            }),
            span: sp(0, 13),
        };
        let mut nodes = Vec::new();
        preorder(Node::Stmt(&stmt), &mut nodes);
        let spans: Vec<_> = nodes.iter().map(|n| n.span()).collect();
        assert_eq!(spans, vec![sp(0, 13), sp(7, 8), sp(11, 13), sp(11, 12)]);
    }

    #[test]
    fn branching_statements() {
        let brk = Stmt {
            kind: StmtKind::Break,
            span: sp(0, 6),
        };
        let ret = Stmt {
            kind: StmtKind::Return(None),
            span: sp(0, 7),
        };
        assert!(!brk.is_branching());
        assert!(ret.is_branching());
    }

    #[test]
    fn loop_kind_display() {
        assert_eq!(LoopKind::For.to_string(), "for");
        assert_eq!(LoopKind::While.to_string(), "while");
        assert_eq!(LoopKind::DoWhile.to_string(), "do");
    }
}
