// Parser for kernel-C source files.
//
// Parses a token stream (from the lexer) into a `TranslationUnit`. Uses
// chumsky combinators; expression precedence is encoded as one `foldl`
// level per C binary-operator tier.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors.
// Failure modes: syntax errors produce `Rich` diagnostics. A broken
//   statement or item is skipped and parsing resumes after it, so the AST
//   is still produced unless recovery itself fails.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub unit: Option<TranslationUnit>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a kernel source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = unit_parser(source);
    let (unit, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        unit,
        errors: all_errors,
    }
}

/// Scalar type names the parser accepts as the target of a cast. Vector
/// forms (`float4`, `int16`) are derived from these.
const SCALAR_TYPES: &[&str] = &[
    "void",
    "bool",
    "char",
    "uchar",
    "short",
    "ushort",
    "int",
    "uint",
    "long",
    "ulong",
    "float",
    "double",
    "half",
    "size_t",
    "ptrdiff_t",
    "intptr_t",
    "uintptr_t",
    "event_t",
    "sampler_t",
    "image2d_t",
    "image3d_t",
];

/// Integer width words that combine with each other and with a sign.
const INTEGER_WORDS: &[&str] = &["char", "short", "int", "long"];

/// Canonical scalar name for a multi-word integer type: `unsigned` is
/// `uint`, `unsigned long long` is `ulong`, `signed char` is `char`.
fn integer_type_name(unsigned: bool, words: &[Ident]) -> String {
    let has = |w: &str| words.iter().any(|id| id.name == w);
    let base = if has("char") {
        "char"
    } else if has("short") {
        "short"
    } else if has("long") {
        "long"
    } else {
        "int"
    };
    if unsigned {
        format!("u{base}")
    } else {
        base.to_string()
    }
}

/// Whether `name` is a builtin scalar or vector type.
///
/// Casts are only recognised for builtin, `struct` or pointer types; this
/// keeps `(a) - b` a subtraction instead of a cast of `-b` to type `a`.
pub fn is_builtin_type(name: &str) -> bool {
    if SCALAR_TYPES.contains(&name) {
        return true;
    }
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    base.len() != name.len()
        && matches!(&name[base.len()..], "2" | "3" | "4" | "8" | "16")
        && SCALAR_TYPES.contains(&base)
}

/// One postfix suffix, folded onto the expression to its left.
#[derive(Debug, Clone)]
enum Suffix {
    Call(Vec<Expr>),
    Index(Expr),
    Member(Ident, bool),
    Inc,
    Dec,
}

// ── Main parser builder ──
//
// All grammar rules are built inside `unit_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn unit_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, TranslationUnit, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Balanced groups ──
    //
    // Used to skip `__attribute__((...))` arguments and, on error, whole
    // brace-delimited regions.

    let paren_group = recursive(|group| {
        choice((
            group.clone(),
            any()
                .filter(|t: &Token| !matches!(t, Token::LParen | Token::RParen))
                .ignored(),
        ))
        .repeated()
        .delimited_by(just(Token::LParen), just(Token::RParen))
    });

    let brace_group = recursive(|group| {
        choice((
            group.clone(),
            any()
                .filter(|t: &Token| !matches!(t, Token::LBrace | Token::RBrace))
                .ignored(),
        ))
        .repeated()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
    });

    let attribute = just(Token::Attribute).ignore_then(paren_group).ignored();

    // ── Types ──

    // Qualifiers and attributes may appear before or after the base type
    // (`__kernel void k`, `void __kernel k`). `true` marks the kernel
    // qualifier.
    let specifiers = choice((
        just(Token::Kernel).to(true),
        just(Token::Qualifier).to(false),
        attribute.clone().to(false),
    ))
    .repeated()
    .collect::<Vec<bool>>();

    // `unsigned`, `long int`, `unsigned short`, ... A sign with no width
    // word names `int`.
    let width_word = ident
        .clone()
        .filter(|id: &Ident| INTEGER_WORDS.contains(&id.name.as_str()));

    let signedness = select! {
        Token::Unsigned => true,
        Token::Signed => false,
    };

    let integer_type = choice((
        signedness
            .then(width_word.clone().repeated().collect::<Vec<_>>()),
        width_word
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|words| (false, words)),
    ))
    .map_with(|(unsigned, words), e| {
        TypeName::Named(Ident {
            name: integer_type_name(unsigned, &words),
            span: e.span(),
        })
    });

    let type_name = choice((
        just(Token::Struct)
            .ignore_then(ident.clone())
            .map(TypeName::Struct),
        integer_type,
        ident.clone().map(TypeName::Named),
    ));

    let stars = just(Token::Star)
        .then(just(Token::Qualifier).repeated())
        .repeated()
        .collect::<Vec<_>>()
        .map(|stars| stars.len());

    let type_spec = specifiers
        .clone()
        .then(type_name)
        .then(specifiers)
        .then(stars.clone())
        .map_with(|(((before, name), after), pointer_depth), e| {
            let ty = TypeSpec {
                name,
                pointer_depth,
                span: e.span(),
            };
            (before.contains(&true) || after.contains(&true), ty)
        });

    let plain_type = type_spec.clone().map(|(_, ty)| ty);

    let cast_type = plain_type.clone().try_map(|ty: TypeSpec, span| {
        let castable = ty.pointer_depth > 0
            || match &ty.name {
                TypeName::Struct(_) => true,
                TypeName::Named(id) => is_builtin_type(&id.name),
            };
        if castable {
            Ok(ty)
        } else {
            Err(Rich::custom(span, "expected a type name"))
        }
    });

    // ── Expressions ──

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Int(v) => ExprKind::IntLit(v),
            Token::Float(v) => ExprKind::FloatLit(v),
            Token::CharLit => ExprKind::CharLit,
            Token::StrLit(s) => ExprKind::StrLit(s),
        }
        .map_with(|kind, e| Expr {
            kind,
            span: e.span(),
        });

        let name = ident.clone().map(|id| Expr {
            span: id.span,
            kind: ExprKind::Name(id.name),
        });

        let init_list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|items, e| Expr {
                kind: ExprKind::InitList(items),
                span: e.span(),
            });

        let paren = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((literal, name, paren, init_list));

        // ── Postfix: call, index, member, ++/-- ──

        let suffix = choice((
            expr.clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(Suffix::Call),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Suffix::Index),
            just(Token::Dot)
                .ignore_then(ident.clone())
                .map(|field| Suffix::Member(field, false)),
            just(Token::Arrow)
                .ignore_then(ident.clone())
                .map(|field| Suffix::Member(field, true)),
            just(Token::PlusPlus).to(Suffix::Inc),
            just(Token::MinusMinus).to(Suffix::Dec),
        ))
        .map_with(|suffix, e| (suffix, e.span()));

        let postfix = atom.foldl(
            suffix.repeated(),
            |base: Expr, (suffix, end): (Suffix, SimpleSpan)| {
                let span: SimpleSpan = (base.span.start..end.end).into();
                let base = Box::new(base);
                let kind = match suffix {
                    Suffix::Call(args) => ExprKind::Call { callee: base, args },
                    Suffix::Index(index) => ExprKind::Index {
                        base,
                        index: Box::new(index),
                    },
                    Suffix::Member(field, arrow) => ExprKind::Member { base, field, arrow },
                    Suffix::Inc => ExprKind::Postfix {
                        op: PostfixOp::Inc,
                        operand: base,
                    },
                    Suffix::Dec => ExprKind::Postfix {
                        op: PostfixOp::Dec,
                        operand: base,
                    },
                };
                Expr { kind, span }
            },
        );

        // ── Prefix: unary operators, casts, sizeof ──

        let unary = recursive(|unary| {
            let prefix_op = select! {
                Token::Minus => UnaryOp::Neg,
                Token::Plus => UnaryOp::Plus,
                Token::Bang => UnaryOp::Not,
                Token::Tilde => UnaryOp::BitNot,
                Token::Star => UnaryOp::Deref,
                Token::Amp => UnaryOp::AddrOf,
                Token::PlusPlus => UnaryOp::PreInc,
                Token::MinusMinus => UnaryOp::PreDec,
            };

            let prefix = prefix_op
                .map_with(|op, e| (op, e.span()))
                .then(unary.clone())
                .map(|((op, start), operand): ((UnaryOp, SimpleSpan), Expr)| Expr {
                    span: (start.start..operand.span.end).into(),
                    kind: ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                });

            let cast_head = cast_type
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map_with(|ty, e| (ty, e.span()));

            let make_cast = |((ty, start), operand): ((TypeSpec, SimpleSpan), Expr)| Expr {
                span: (start.start..operand.span.end).into(),
                kind: ExprKind::Cast {
                    ty,
                    operand: Box::new(operand),
                },
            };

            // `(float4)(a, b, c, d)`
            let vector_literal = cast_head
                .clone()
                .then(
                    expr.clone()
                        .separated_by(just(Token::Comma))
                        .at_least(1)
                        .collect::<Vec<_>>()
                        .delimited_by(just(Token::LParen), just(Token::RParen))
                        .map_with(|items, e| Expr {
                            kind: ExprKind::InitList(items),
                            span: e.span(),
                        }),
                )
                .map(make_cast);

            let cast = cast_head.then(unary.clone()).map(make_cast);

            let sizeof_type = just(Token::Sizeof)
                .ignore_then(
                    cast_type
                        .clone()
                        .delimited_by(just(Token::LParen), just(Token::RParen)),
                )
                .map_with(|ty, e| Expr {
                    kind: ExprKind::SizeOfType(ty),
                    span: e.span(),
                });

            let sizeof_expr = just(Token::Sizeof)
                .ignore_then(unary.clone())
                .map_with(|operand, e| Expr {
                    kind: ExprKind::SizeOfExpr(Box::new(operand)),
                    span: e.span(),
                });

            choice((prefix, vector_literal, cast, sizeof_type, sizeof_expr, postfix))
        });

        // ── Binary tiers, tightest first ──

        let fold_binary = |lhs: Expr, (op, rhs): (BinaryOp, Expr)| Expr {
            span: (lhs.span.start..rhs.span.end).into(),
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        };

        let product = unary
            .clone()
            .foldl(
                select! {
                    Token::Star => BinaryOp::Mul,
                    Token::Slash => BinaryOp::Div,
                    Token::Percent => BinaryOp::Rem,
                }
                .then(unary)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let sum = product
            .clone()
            .foldl(
                select! {
                    Token::Plus => BinaryOp::Add,
                    Token::Minus => BinaryOp::Sub,
                }
                .then(product)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let shift = sum
            .clone()
            .foldl(
                select! {
                    Token::Shl => BinaryOp::Shl,
                    Token::Shr => BinaryOp::Shr,
                }
                .then(sum)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let relational = shift
            .clone()
            .foldl(
                select! {
                    Token::Lt => BinaryOp::Lt,
                    Token::Gt => BinaryOp::Gt,
                    Token::Le => BinaryOp::Le,
                    Token::Ge => BinaryOp::Ge,
                }
                .then(shift)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let equality = relational
            .clone()
            .foldl(
                select! {
                    Token::EqEq => BinaryOp::Eq,
                    Token::NotEq => BinaryOp::Ne,
                }
                .then(relational)
                .repeated(),
                fold_binary,
            )
            .boxed();

        let bit_and = equality
            .clone()
            .foldl(
                just(Token::Amp).to(BinaryOp::BitAnd).then(equality).repeated(),
                fold_binary,
            )
            .boxed();

        let bit_xor = bit_and
            .clone()
            .foldl(
                just(Token::Caret).to(BinaryOp::BitXor).then(bit_and).repeated(),
                fold_binary,
            )
            .boxed();

        let bit_or = bit_xor
            .clone()
            .foldl(
                just(Token::Pipe).to(BinaryOp::BitOr).then(bit_xor).repeated(),
                fold_binary,
            )
            .boxed();

        let log_and = bit_or
            .clone()
            .foldl(
                just(Token::AndAnd).to(BinaryOp::LogAnd).then(bit_or).repeated(),
                fold_binary,
            )
            .boxed();

        let log_or = log_and
            .clone()
            .foldl(
                just(Token::OrOr).to(BinaryOp::LogOr).then(log_and).repeated(),
                fold_binary,
            )
            .boxed();

        // ── Conditional and assignment (right-associative) ──

        let conditional = log_or
            .then(
                just(Token::Question)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(cond, branches)| match branches {
                None => cond,
                Some((then_expr, else_expr)) => Expr {
                    span: (cond.span.start..else_expr.span.end).into(),
                    kind: ExprKind::Conditional {
                        cond: Box::new(cond),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                },
            });

        let assign_op = select! {
            Token::Eq => AssignOp::Assign,
            Token::StarEq => AssignOp::Mul,
            Token::SlashEq => AssignOp::Div,
            Token::PercentEq => AssignOp::Rem,
            Token::PlusEq => AssignOp::Add,
            Token::MinusEq => AssignOp::Sub,
            Token::ShlEq => AssignOp::Shl,
            Token::ShrEq => AssignOp::Shr,
            Token::AmpEq => AssignOp::And,
            Token::CaretEq => AssignOp::Xor,
            Token::PipeEq => AssignOp::Or,
        };

        conditional
            .then(assign_op.then(expr).or_not())
            .map(|(target, rhs)| match rhs {
                None => target,
                Some((op, value)) => Expr {
                    span: (target.span.start..value.span.end).into(),
                    kind: ExprKind::Assign {
                        op,
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                },
            })
    });

    // ── Declarations ──

    let array_dims = expr
        .clone()
        .or_not()
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .repeated()
        .collect::<Vec<_>>();

    let declarator = stars
        .clone()
        .then(ident.clone())
        .then(array_dims.clone())
        .then(just(Token::Eq).ignore_then(expr.clone()).or_not())
        .map_with(|(((pointer_depth, name), array_dims), init), e| Declarator {
            pointer_depth,
            name,
            array_dims,
            init,
            span: e.span(),
        });

    let decl = plain_type
        .clone()
        .then(
            declarator
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|(ty, declarators), e| DeclStmt {
            ty,
            declarators,
            span: e.span(),
        });

    // ── Statements ──

    // A statement that fails to parse is skipped up to its `;` (nested
    // braces included) or up to the `}` closing the enclosing block, and
    // becomes an empty statement. The error is still reported.
    let stmt_recovery = choice((
        brace_group.clone(),
        any()
            .filter(|t: &Token| !matches!(t, Token::Semicolon | Token::LBrace | Token::RBrace))
            .ignored(),
    ))
    .repeated()
    .at_least(1)
    .then(choice((
        just(Token::Semicolon).ignored(),
        just(Token::RBrace).ignored().rewind(),
        end().rewind(),
    )))
    .to(StmtKind::Empty);

    let stmt = recursive(|stmt| {
        let block = stmt
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|stmts, e| Block {
                stmts,
                span: e.span(),
            });

        let paren_cond = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let if_stmt = just(Token::If)
            .ignore_then(paren_cond.clone())
            .then(stmt.clone())
            .then(just(Token::Else).ignore_then(stmt.clone()).or_not())
            .map(|((cond, then_branch), else_branch)| {
                StmtKind::If(IfStmt {
                    cond,
                    then_branch: Box::new(then_branch),
                    else_branch: else_branch.map(Box::new),
                })
            });

        let for_init = decl
            .clone()
            .map_with(|d, e| Stmt {
                kind: StmtKind::Decl(d),
                span: e.span(),
            })
            .or(expr.clone().map_with(|x, e| Stmt {
                kind: StmtKind::Expr(x),
                span: e.span(),
            }));

        let for_stmt = just(Token::For)
            .ignore_then(
                for_init
                    .or_not()
                    .then_ignore(just(Token::Semicolon))
                    .then(expr.clone().or_not())
                    .then_ignore(just(Token::Semicolon))
                    .then(expr.clone().or_not())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(stmt.clone())
            .map(|(((init, cond), step), body)| {
                StmtKind::For(ForStmt {
                    init: init.map(Box::new),
                    cond,
                    step,
                    body: Box::new(body),
                })
            });

        let while_stmt = just(Token::While)
            .ignore_then(paren_cond.clone())
            .then(stmt.clone())
            .map(|(cond, body)| {
                StmtKind::While(WhileStmt {
                    cond,
                    body: Box::new(body),
                })
            });

        let do_stmt = just(Token::Do)
            .ignore_then(stmt.clone())
            .then_ignore(just(Token::While))
            .then(paren_cond.clone())
            .then_ignore(just(Token::Semicolon))
            .map(|(body, cond)| {
                StmtKind::DoWhile(DoWhileStmt {
                    body: Box::new(body),
                    cond,
                })
            });

        let switch_stmt = just(Token::Switch)
            .ignore_then(paren_cond)
            .then(stmt.clone())
            .map(|(cond, body)| {
                StmtKind::Switch(SwitchStmt {
                    cond,
                    body: Box::new(body),
                })
            });

        let case_label = just(Token::Case)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .map(StmtKind::Case);

        let default_label = just(Token::Default)
            .then_ignore(just(Token::Colon))
            .to(StmtKind::Default);

        let jump = choice((
            just(Token::Break).to(StmtKind::Break),
            just(Token::Continue).to(StmtKind::Continue),
            just(Token::Return)
                .ignore_then(expr.clone().or_not())
                .map(StmtKind::Return),
            just(Token::Goto)
                .ignore_then(ident.clone())
                .map(StmtKind::Goto),
        ))
        .then_ignore(just(Token::Semicolon));

        let label = ident
            .clone()
            .then_ignore(just(Token::Colon))
            .map(StmtKind::Label);

        let decl_stmt = decl
            .clone()
            .then_ignore(just(Token::Semicolon))
            .map(StmtKind::Decl);

        let expr_stmt = expr
            .clone()
            .then_ignore(just(Token::Semicolon))
            .map(StmtKind::Expr);

        let empty = just(Token::Semicolon).to(StmtKind::Empty);

        choice((
            block.map(StmtKind::Compound),
            if_stmt,
            for_stmt,
            while_stmt,
            do_stmt,
            switch_stmt,
            case_label,
            default_label,
            jump,
            label,
            decl_stmt,
            expr_stmt,
            empty,
        ))
        .recover_with(via_parser(stmt_recovery))
        .map_with(|kind, e| Stmt {
            kind,
            span: e.span(),
        })
        .boxed()
    });

    // ── Top-level items ──

    let body = stmt
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map_with(|stmts, e| Block {
            stmts,
            span: e.span(),
        });

    let param = plain_type
        .clone()
        .then(ident.clone().or_not())
        .then_ignore(array_dims.clone())
        .map_with(|(ty, name), e| Param {
            ty,
            name,
            span: e.span(),
        });

    let function = type_spec
        .then(ident.clone())
        .then(
            param
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(attribute.repeated())
        .then(body.map(Some).or(just(Token::Semicolon).to(None)))
        .map_with(|((((is_kernel, ret), name), params), body), e| {
            Item::Function(FunctionDecl {
                is_kernel,
                ret,
                name,
                params,
                body,
                span: e.span(),
            })
        });

    let field_group = plain_type
        .clone()
        .then(
            stars
                .then(ident.clone())
                .then_ignore(array_dims)
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::Semicolon))
        .map(|(ty, names)| {
            names
                .into_iter()
                .map(|(depth, name)| FieldDecl {
                    ty: TypeSpec {
                        pointer_depth: ty.pointer_depth + depth,
                        ..ty.clone()
                    },
                    name,
                })
                .collect::<Vec<_>>()
        });

    let struct_def = just(Token::Typedef)
        .or_not()
        .then_ignore(just(Token::Struct))
        .then(ident.clone().or_not())
        .then(
            field_group
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .then(ident.clone().or_not())
        .then_ignore(just(Token::Semicolon))
        .map_with(|(((typedef, tag), groups), trailing), e| {
            Item::Struct(StructDef {
                tag,
                // Without `typedef`, a trailing name declares a variable; it
                // is not an alias and the checks never look at it.
                alias: typedef.and(trailing),
                fields: groups.into_iter().flatten().collect(),
                span: e.span(),
            })
        });

    let typedef = just(Token::Typedef)
        .ignore_then(plain_type)
        .then(ident)
        .then_ignore(just(Token::Semicolon))
        .map_with(|(ty, alias), e| {
            Item::Typedef(TypedefDecl {
                ty,
                alias,
                span: e.span(),
            })
        });

    let global = decl.then_ignore(just(Token::Semicolon)).map(Item::Global);

    // An item that fails to parse is skipped up to its `;` or past its
    // brace-delimited body, so the items after it are still analyzed.
    let item_recovery = any()
        .filter(|t: &Token| !matches!(t, Token::Semicolon | Token::LBrace | Token::RBrace))
        .repeated()
        .then(choice((
            just(Token::Semicolon).ignored(),
            brace_group,
            just(Token::RBrace).ignored(),
        )))
        .to(None);

    choice((struct_def, typedef, function, global))
        .map(Some)
        .recover_with(via_parser(item_recovery))
        .repeated()
        .collect::<Vec<Option<Item>>>()
        .then_ignore(end())
        .map_with(|items, e| TranslationUnit {
            items: items.into_iter().flatten().collect(),
            span: e.span(),
        })
}
