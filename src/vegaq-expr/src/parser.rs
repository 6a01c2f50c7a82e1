//! Parser for the Vega expression language
//!
//! Converts expression strings into [`Expr`] trees using nom combinators.
//! Precedence is handled by one function per level, from ternary down to
//! primary terms.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, opt, recognize, value, verify},
    error::{VerboseError, VerboseErrorKind},
    multi::{fold_many0, many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ParseError, ParseResult};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse an expression string into an AST.
pub fn parse(input: &str) -> ParseResult<Expr> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    match all_consuming(terminated(parse_expr, multispace0))(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(ParseError::from(e)),
    }
}

/// Parse a symbol token, skipping leading whitespace
fn sym<'a>(t: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| preceded(multispace0, tag(t))(input)
}

fn parse_expr(input: &str) -> PResult<'_, Expr> {
    parse_ternary(input)
}

fn parse_ternary(input: &str) -> PResult<'_, Expr> {
    let (rest, cond) = parse_or(input)?;
    let (rest, tail) = opt(tuple((
        sym("?"),
        parse_ternary,
        sym(":"),
        parse_ternary,
    )))(rest)?;
    let expr = match tail {
        Some((_, then, _, otherwise)) => Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
        None => cond,
    };
    Ok((rest, expr))
}

fn parse_or(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_and(input)?;
    fold_many0(
        preceded(sym("||"), parse_and),
        move || first.clone(),
        |left, right| Expr::Binary {
            op: BinaryOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn parse_and(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_equality(input)?;
    fold_many0(
        preceded(sym("&&"), parse_equality),
        move || first.clone(),
        |left, right| Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn equality_op(input: &str) -> PResult<'_, BinaryOp> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::StrictEq, tag("===")),
            value(BinaryOp::StrictNe, tag("!==")),
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
        )),
    )(input)
}

fn parse_equality(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_relational(input)?;
    fold_many0(
        pair(equality_op, parse_relational),
        move || first.clone(),
        |left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn relational_op(input: &str) -> PResult<'_, BinaryOp> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        )),
    )(input)
}

fn parse_relational(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_additive(input)?;
    fold_many0(
        pair(relational_op, parse_additive),
        move || first.clone(),
        |left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn additive_op(input: &str) -> PResult<'_, BinaryOp> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::Add, tag("+")),
            value(BinaryOp::Sub, tag("-")),
        )),
    )(input)
}

fn parse_additive(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_multiplicative(input)?;
    fold_many0(
        pair(additive_op, parse_multiplicative),
        move || first.clone(),
        |left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn multiplicative_op(input: &str) -> PResult<'_, BinaryOp> {
    preceded(
        multispace0,
        alt((
            value(BinaryOp::Mul, tag("*")),
            value(BinaryOp::Div, tag("/")),
            value(BinaryOp::Mod, tag("%")),
        )),
    )(input)
}

fn parse_multiplicative(input: &str) -> PResult<'_, Expr> {
    let (rest, first) = parse_unary(input)?;
    fold_many0(
        pair(multiplicative_op, parse_unary),
        move || first.clone(),
        |left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )(rest)
}

fn parse_unary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(sym("!"), parse_unary), |e| Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(e),
        }),
        map(preceded(sym("-"), parse_unary), |e| Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(e),
        }),
        map(preceded(sym("+"), parse_unary), |e| Expr::Unary {
            op: UnaryOp::Pos,
            operand: Box::new(e),
        }),
        parse_postfix,
    ))(input)
}

/// Postfix chains: member access, computed string members, and calls.
///
/// Calls are only valid on bare identifiers (the built-in namespace is
/// flat); computed member access requires a string literal index.
fn parse_postfix(input: &str) -> PResult<'_, Expr> {
    let (mut rest, mut expr) = parse_primary(input)?;
    loop {
        if let Ok((r, field)) = preceded(sym("."), identifier)(rest) {
            expr = Expr::Member {
                base: Box::new(expr),
                field,
            };
            rest = r;
            continue;
        }
        if let Ok((r, index)) = delimited(sym("["), parse_expr, sym("]"))(rest) {
            match index {
                Expr::Str(field) => {
                    expr = Expr::Member {
                        base: Box::new(expr),
                        field,
                    };
                    rest = r;
                    continue;
                }
                _ => return Err(fail(rest, "computed member access requires a string literal")),
            }
        }
        if let Ok((r, args)) =
            delimited(sym("("), separated_list0(sym(","), parse_expr), sym(")"))(rest)
        {
            match expr {
                Expr::Ident(name) => {
                    expr = Expr::Call { name, args };
                    rest = r;
                    continue;
                }
                _ => return Err(fail(rest, "only named functions can be called")),
            }
        }
        break;
    }
    Ok((rest, expr))
}

fn fail<'a>(input: &'a str, context: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(context))],
    })
}

fn parse_primary(input: &str) -> PResult<'_, Expr> {
    preceded(
        multispace0,
        alt((
            delimited(char('('), parse_expr, sym(")")),
            parse_array,
            parse_object,
            map(string_literal, Expr::Str),
            parse_ident_or_keyword,
            parse_number,
        )),
    )(input)
}

fn parse_array(input: &str) -> PResult<'_, Expr> {
    map(
        delimited(
            char('['),
            separated_list0(sym(","), parse_expr),
            sym("]"),
        ),
        Expr::Array,
    )(input)
}

fn parse_object(input: &str) -> PResult<'_, Expr> {
    map(
        delimited(
            char('{'),
            separated_list0(sym(","), object_entry),
            sym("}"),
        ),
        Expr::Object,
    )(input)
}

fn object_entry(input: &str) -> PResult<'_, (String, Expr)> {
    map(
        tuple((
            preceded(multispace0, alt((string_literal, identifier))),
            sym(":"),
            parse_expr,
        )),
        |(key, _, value)| (key, value),
    )(input)
}

fn parse_ident_or_keyword(input: &str) -> PResult<'_, Expr> {
    map(identifier, |name| match name.as_str() {
        "true" => Expr::Bool(true),
        "false" => Expr::Bool(false),
        "null" => Expr::Null,
        _ => Expr::Ident(name),
    })(input)
}

fn identifier(input: &str) -> PResult<'_, String> {
    map(
        preceded(
            multispace0,
            recognize(pair(
                satisfy(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
                many0(satisfy(|c: char| {
                    c.is_ascii_alphanumeric() || c == '_' || c == '$'
                })),
            )),
        ),
        str::to_string,
    )(input)
}

fn parse_number(input: &str) -> PResult<'_, Expr> {
    map(verify(double, |f: &f64| f.is_finite()), Expr::Number)(input)
}

fn string_literal(input: &str) -> PResult<'_, String> {
    preceded(multispace0, alt((quoted('\''), quoted('"'))))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> PResult<'a, String> {
    move |input| {
        delimited(
            char(quote),
            fold_many0(
                alt((
                    preceded(char('\\'), escape_char),
                    satisfy(move |c| c != '\\' && c != quote),
                )),
                String::new,
                |mut acc, c| {
                    acc.push(c);
                    acc
                },
            ),
            char(quote),
        )(input)
    }
}

fn escape_char(input: &str) -> PResult<'_, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        value('\\', char('\\')),
        value('\'', char('\'')),
        value('"', char('"')),
        value('/', char('/')),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn datum_field(field: &str) -> Expr {
        Expr::Member {
            base: Box::new(ident("datum")),
            field: field.to_string(),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("1.5e2").unwrap(), Expr::Number(150.0));
        assert_eq!(parse("'abc'").unwrap(), Expr::Str("abc".to_string()));
        assert_eq!(parse("\"a\\\"b\"").unwrap(), Expr::Str("a\"b".to_string()));
        assert_eq!(parse("true").unwrap(), Expr::Bool(true));
        assert_eq!(parse("null").unwrap(), Expr::Null);
    }

    #[test]
    fn test_parse_member_access() {
        assert_eq!(parse("datum.price").unwrap(), datum_field("price"));
        assert_eq!(parse("datum['unit price']").unwrap(), datum_field("unit price"));
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Number(1.0)),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Number(2.0)),
                    right: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_comparison_chain() {
        let expr = parse("datum.a >= 10 && datum.b == null").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::And, left, right } => {
                assert_eq!(
                    *left,
                    Expr::Binary {
                        op: BinaryOp::Ge,
                        left: Box::new(datum_field("a")),
                        right: Box::new(Expr::Number(10.0)),
                    }
                );
                assert_eq!(
                    *right,
                    Expr::Binary {
                        op: BinaryOp::Eq,
                        left: Box::new(datum_field("b")),
                        right: Box::new(Expr::Null),
                    }
                );
            }
            other => panic!("expected && expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_call_and_ternary() {
        assert_eq!(
            parse("abs(datum.x)").unwrap(),
            Expr::Call {
                name: "abs".to_string(),
                args: vec![datum_field("x")],
            }
        );
        assert_eq!(
            parse("datum.x > 0 ? 'pos' : 'neg'").unwrap(),
            Expr::Ternary {
                cond: Box::new(Expr::Binary {
                    op: BinaryOp::Gt,
                    left: Box::new(datum_field("x")),
                    right: Box::new(Expr::Number(0.0)),
                }),
                then: Box::new(Expr::Str("pos".to_string())),
                otherwise: Box::new(Expr::Str("neg".to_string())),
            }
        );
    }

    #[test]
    fn test_parse_selection_store_literal() {
        // shape produced by runtime parameter substitution
        let expr = parse(
            r#"!(length([])) || (vlSelectionTest([{"fields": [{"field": "c", "type": "E"}], "values": ["x"]}], datum))"#,
        )
        .unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                assert!(matches!(*left, Expr::Unary { op: UnaryOp::Not, .. }));
                match *right {
                    Expr::Call { ref name, ref args } => {
                        assert_eq!(name, "vlSelectionTest");
                        assert_eq!(args.len(), 2);
                        assert!(matches!(args[0], Expr::Array(_)));
                    }
                    ref other => panic!("expected call, got {other:?}"),
                }
            }
            other => panic!("expected || expression, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_object_literal() {
        let expr = parse("{a: 1, 'b': 2}").unwrap();
        assert_eq!(
            expr,
            Expr::Object(vec![
                ("a".to_string(), Expr::Number(1.0)),
                ("b".to_string(), Expr::Number(2.0)),
            ])
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("datum..x").is_err());
        assert!(parse("1 +").is_err());
    }
}
