// Lexer for kernel-C source files.
//
// Tokenizes the C subset accepted by simtlint (OpenCL-C flavoured kernels).
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Kernel-C token types.
///
/// Comments and preprocessor lines are skipped: the checker works on the
/// source as written and never expands macros. Identifiers carry no value;
/// use the span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip(r"[ \t\r\n\f]+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/|#[^\n]*", allow_greedy = true))]
pub enum Token {
    // ── Keywords ──
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("goto")]
    Goto,
    #[token("struct")]
    Struct,
    #[token("typedef")]
    Typedef,
    #[token("sizeof")]
    Sizeof,

    /// Kernel entry-point qualifier.
    #[token("__kernel")]
    #[token("kernel")]
    Kernel,

    /// Address-space, storage and cv qualifiers. None of them affect the
    /// analyses, so they share one token.
    #[token("__global")]
    #[token("global")]
    #[token("__local")]
    #[token("local")]
    #[token("__constant")]
    #[token("constant")]
    #[token("__private")]
    #[token("private")]
    #[token("const")]
    #[token("volatile")]
    #[token("restrict")]
    #[token("static")]
    #[token("inline")]
    Qualifier,

    /// Integer signedness. A bare `unsigned` or `signed` names `int`.
    #[token("unsigned")]
    Unsigned,
    #[token("signed")]
    Signed,

    /// GNU attribute introducer; its parenthesised arguments are skipped.
    #[token("__attribute__")]
    #[token("__attribute")]
    Attribute,

    // ── Punctuation ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // ── Assignment operators ──
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&=")]
    AmpEq,
    #[token("^=")]
    CaretEq,
    #[token("|=")]
    PipeEq,

    // ── Arithmetic, bitwise, logical ──
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // ── Comparison ──
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,

    // ── Literals ──
    /// Floating literal (e.g. `1.5f`, `2e-3`). The float regex always
    /// requires a `.` or an exponent, so it never competes with Int.
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?[fFhH]?", parse_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?[fFhH]?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fFhH]?", parse_float)]
    Float(f64),

    /// Integer literal, decimal or hex, with optional `u`/`l` suffixes.
    #[regex(r"0[xX][0-9a-fA-F]+[uUlL]*", parse_hex)]
    #[regex(r"[0-9]+[uUlL]*", parse_decimal)]
    Int(u64),

    /// Character literal. The value is irrelevant to every analysis.
    #[regex(r"'([^'\\\n]|\\.)+'")]
    CharLit,

    /// String literal, quotes stripped, escapes kept verbatim.
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    StrLit(String),

    // ── Identifier ──
    //
    // Placed after keywords: logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `for` matches For, not Ident.
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Do => "do",
            Token::Switch => "switch",
            Token::Case => "case",
            Token::Default => "default",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Goto => "goto",
            Token::Struct => "struct",
            Token::Typedef => "typedef",
            Token::Sizeof => "sizeof",
            Token::Kernel => "__kernel",
            Token::Qualifier => "<qualifier>",
            Token::Unsigned => "unsigned",
            Token::Signed => "signed",
            Token::Attribute => "__attribute__",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Arrow => "->",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Eq => "=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::PercentEq => "%=",
            Token::ShlEq => "<<=",
            Token::ShrEq => ">>=",
            Token::AmpEq => "&=",
            Token::CaretEq => "^=",
            Token::PipeEq => "|=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Bang => "!",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::Float(v) => return write!(f, "{v}"),
            Token::Int(v) => return write!(f, "{v}"),
            Token::CharLit => "<char>",
            Token::StrLit(s) => return write!(f, "\"{s}\""),
            Token::Ident => "<ident>",
        };
        f.write_str(text)
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice()
        .trim_end_matches(['f', 'F', 'h', 'H'])
        .parse()
        .ok()
}

fn parse_hex(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    let digits = lex.slice()[2..].trim_end_matches(['u', 'U', 'l', 'L']);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_decimal(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    lex.slice().trim_end_matches(['u', 'U', 'l', 'L']).parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    Some(slice[1..slice.len() - 1].to_string())
}

// ── Public API ──

/// Lex a kernel source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
