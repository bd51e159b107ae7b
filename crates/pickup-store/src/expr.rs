//! Parser and evaluator for the boolean full-text grammar:
//!
//! ```text
//! or_expr  = and_expr ( "or" and_expr )*
//! and_expr = atom ( "and" atom )*
//! atom     = "FORMSOF" "(" "THESAURUS" "," term ")" | "(" or_expr ")"
//! ```
//!
//! Keywords are case-insensitive. A term may not contain whitespace, `,`
//! or `)`.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::multispace0,
    combinator::{all_consuming, map},
    multi::many0,
    sequence::{delimited, preceded, tuple},
};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Term(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        all_consuming(or_expr)(input)
            .map(|(_, expr)| expr)
            .map_err(|e| StoreError::Expression(e.to_string()))
    }

    /// Conjunction, flattened to the single child when there is only one.
    pub fn all(mut children: Vec<Expr>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Self::And(children)
        }
    }

    /// Disjunction, flattened to the single child when there is only one.
    pub fn any(mut children: Vec<Expr>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Self::Or(children)
        }
    }

    /// Evaluate with `hit` deciding whether a single term matches.
    pub fn eval(&self, hit: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Term(t) => hit(t),
            Self::And(children) => children.iter().all(|c| c.eval(hit)),
            Self::Or(children) => children.iter().any(|c| c.eval(hit)),
        }
    }

    /// Every term in the expression, left to right.
    pub fn terms(&self) -> Vec<&str> {
        match self {
            Self::Term(t) => vec![t.as_str()],
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(|c| c.terms()).collect()
            }
        }
    }
}

fn formsof(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            tuple((
                tag_no_case("FORMSOF"),
                multispace0,
                tag("("),
                multispace0,
                tag_no_case("THESAURUS"),
                multispace0,
                tag(","),
                multispace0,
            )),
            take_while1(|c: char| c != ')' && c != ',' && !c.is_whitespace()),
            tuple((multispace0, tag(")"))),
        ),
        |term: &str| Expr::Term(term.to_string()),
    )(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    delimited(
        multispace0,
        alt((
            formsof,
            delimited(
                tuple((tag("("), multispace0)),
                or_expr,
                tuple((multispace0, tag(")"))),
            ),
        )),
        multispace0,
    )(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = atom(input)?;
    let (input, rest) = many0(preceded(tag_no_case("and"), atom))(input)?;
    Ok((input, Expr::all(std::iter::once(first).chain(rest).collect())))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(tag_no_case("or"), and_expr))(input)?;
    Ok((input, Expr::any(std::iter::once(first).chain(rest).collect())))
}
