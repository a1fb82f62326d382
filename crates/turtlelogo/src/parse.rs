use nom::{
    branch::alt,
    bytes::complete::{is_not, tag_no_case, take_while},
    character::complete::{anychar, char, digit0, digit1, multispace1, satisfy, space1},
    combinator::{all_consuming, consumed, map, map_opt, map_res, not, opt, recognize, value, verify},
    error::ErrorKind,
    multi::{many0, many0_count, many1_count},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::{
    proc::UserProc,
    typ::{Expr, ExprKind, Op, ProcExpr},
};

pub type Span<'a> = nom_locate::LocatedSpan<&'a str>;

/// Where a program stopped making sense.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("I couldn't understand line {line}, column {column}")]
pub struct ParseFailure {
    pub line: u32,
    pub column: usize,
    pub kind: ErrorKind,
}

fn comment(input: Span) -> IResult<Span, ()> {
    value((), pair(char(';'), opt(is_not("\r\n"))))(input)
}

// Whitespace and comments.
fn blank(input: Span) -> IResult<Span, ()> {
    value((), many0_count(alt((value((), multispace1), comment))))(input)
}

fn blank1(input: Span) -> IResult<Span, ()> {
    value((), many1_count(alt((value((), multispace1), comment))))(input)
}

fn with_span<'a, F: 'a>(inner: F) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Expr>
where
    F: FnMut(Span<'a>) -> IResult<Span<'a>, ExprKind>,
{
    map(consumed(inner), |(input, kind)| Expr {
        e: kind,
        span: input.into(),
    })
}

const RESERVED: &[&str] = &["to", "end"];

/// Names are case-insensitive, so they come out lowercased.
fn ident(input: Span) -> IResult<Span, String> {
    verify(
        map(
            recognize(pair(
                satisfy(char::is_alphabetic),
                take_while(|c: char| c.is_alphanumeric() || c == '_'),
            )),
            |s: Span| s.fragment().to_lowercase(),
        ),
        |s: &str| !RESERVED.contains(&s),
    )(input)
}

pub fn word(input: Span) -> IResult<Span, Expr> {
    with_span(map(ident, ExprKind::Word))(input)
}

pub fn var(input: Span) -> IResult<Span, Expr> {
    with_span(map(preceded(char(':'), ident), ExprKind::Var))(input)
}

fn unsigned(input: Span) -> IResult<Span, f64> {
    terminated(
        map_res(
            recognize(alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            ))),
            |s: Span| s.fragment().parse::<f64>(),
        ),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )(input)
}

pub fn num(input: Span) -> IResult<Span, Expr> {
    with_span(map(unsigned, ExprKind::Num))(input)
}

// Only tried where a new item starts after whitespace, so that `3-1` is a subtraction.
fn neg_num(input: Span) -> IResult<Span, Expr> {
    with_span(map(preceded(char('-'), unsigned), |x| ExprKind::Num(-x)))(input)
}

pub fn op(input: Span) -> IResult<Span, Expr> {
    with_span(map(map_opt(anychar, |ch| Op::try_from(ch).ok()), ExprKind::Op))(input)
}

/// The contents of a list, with any surrounding whitespace.
fn items(input: Span) -> IResult<Span, Vec<Expr>> {
    map(
        tuple((
            preceded(blank, opt(signed_expr)),
            many0(alt((preceded(blank1, signed_expr), expr))),
            blank,
        )),
        |(first, rest, ())| first.into_iter().chain(rest).collect(),
    )(input)
}

pub fn group(input: Span) -> IResult<Span, Expr> {
    with_span(map(delimited(char('('), items, char(')')), ExprKind::Group))(input)
}

pub fn quoted_list(input: Span) -> IResult<Span, Expr> {
    with_span(map(
        with_span(map(delimited(char('['), items, char(']')), ExprKind::List)),
        |list| ExprKind::Quote(Box::new(list)),
    ))(input)
}

pub fn quote(input: Span) -> IResult<Span, Expr> {
    let raw = map(opt(is_not(" \t\r\n[]();")), |w: Option<Span>| {
        ExprKind::Word(w.map_or_else(String::new, |w| w.fragment().to_string()))
    });
    with_span(map(preceded(char('"'), with_span(raw)), |word| {
        ExprKind::Quote(Box::new(word))
    }))(input)
}

pub fn proc_def(input: Span) -> IResult<Span, Expr> {
    with_span(map(
        tuple((
            terminated(tag_no_case("to"), blank1),
            ident,
            many0(preceded(space1, preceded(char(':'), ident))),
            with_span(map(items, ExprKind::List)),
            tag_no_case("end"),
        )),
        |(_to, name, params, body, _end)| {
            ExprKind::DefProc(ProcExpr::new(UserProc { name, params, body }))
        },
    ))(input)
}

pub fn expr(input: Span) -> IResult<Span, Expr> {
    alt((proc_def, num, op, group, quoted_list, quote, word, var))(input)
}

fn signed_expr(input: Span) -> IResult<Span, Expr> {
    alt((neg_num, expr))(input)
}

/// Parses a whole program into one list, ready to evaluate.
pub fn program(source: &str) -> Result<Expr, ParseFailure> {
    match all_consuming(with_span(map(items, ExprKind::List)))(Span::new(source)) {
        Ok((_, prog)) => Ok(prog),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(ParseFailure {
            line: e.input.location_line(),
            column: e.input.get_utf8_column(),
            kind: e.code,
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseFailure {
            line: source.lines().count().max(1) as u32,
            column: source.lines().last().map_or(1, |l| l.chars().count() + 1),
            kind: ErrorKind::Eof,
        }),
    }
}
