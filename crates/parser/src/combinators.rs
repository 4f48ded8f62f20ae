//! Nom parser combinators for the Recipefile DSL.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, none_of},
    combinator::{cut, eof, map, map_res, opt, recognize, rest, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, terminated},
};

use crate::ast::*;
use crate::lexer::{Span, location};

// ============================================================================
// Utility combinators
// ============================================================================

/// Parses whitespace and comments.
fn ws(input: Span) -> IResult<Span, ()> {
    value((), many0(alt((value((), multispace1), value((), comment))))).parse(input)
}

/// Parses a comment (# until end of line).
fn comment(input: Span) -> IResult<Span, Span> {
    recognize(pair(char('#'), take_while(|c| c != '\n'))).parse(input)
}

/// Wraps a parser with whitespace handling.
fn ws_wrap<'a, F, O>(mut inner: F) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, O>
where
    F: Parser<Span<'a>, Output = O, Error = nom::error::Error<Span<'a>>>,
{
    move |input| {
        let (input, _) = ws(input)?;
        let (input, result) = inner.parse(input)?;
        let (input, _) = ws(input)?;
        Ok((input, result))
    }
}

/// Parses a keyword followed by a quoted name: `recipe "name"`.
fn named_header<'a>(keyword: &'static str, input: Span<'a>) -> IResult<Span<'a>, String> {
    let (input, _) = tag(keyword)(input)?;
    let (input, _) = multispace1(input)?;
    string_literal(input)
}

/// Parses `{ item* }` with whitespace around items.
///
/// Past the opening brace the block is committed: a bad item fails the whole
/// parse where it starts instead of backtracking to an enclosing block.
fn braced<'a, F, O>(inner: F, input: Span<'a>) -> IResult<Span<'a>, Vec<O>>
where
    F: Parser<Span<'a>, Output = O, Error = nom::error::Error<Span<'a>>>,
{
    let (input, _) = pair(char('{'), ws).parse(input)?;
    cut(terminated(many0(ws_wrap(inner)), pair(ws, char('}')))).parse(input)
}

/// [`braced`] after a block header, where a missing `{` is fatal too.
fn block_body<'a, F, O>(inner: F, input: Span<'a>) -> IResult<Span<'a>, Vec<O>>
where
    F: Parser<Span<'a>, Output = O, Error = nom::error::Error<Span<'a>>>,
{
    let (input, _) = ws(input)?;
    match braced(inner, input) {
        Err(nom::Err::Error(e)) => Err(nom::Err::Failure(e)),
        other => other,
    }
}

// ============================================================================
// Basic value parsers
// ============================================================================

/// Parses an identifier: [a-zA-Z_][a-zA-Z0-9_]*
pub fn identifier(input: Span) -> IResult<Span, String> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: Span| s.fragment().to_string(),
    )
    .parse(input)
}

/// Parses a string literal: "..."
pub fn string_literal(input: Span) -> IResult<Span, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                )),
            )),
            |s| s.unwrap_or_default(),
        ),
        char('"'),
    )
    .parse(input)
}

/// Parses a number literal.
pub fn number_literal(input: Span) -> IResult<Span, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: Span| {
        s.fragment().parse::<i64>()
    })
    .parse(input)
}

/// Parses a boolean literal.
pub fn bool_literal(input: Span) -> IResult<Span, bool> {
    alt((value(true, tag("true")), value(false, tag("false")))).parse(input)
}

/// Parses any value (string, number, bool or array).
pub fn ast_value(input: Span) -> IResult<Span, AstValue> {
    alt((
        map(bool_literal, AstValue::Bool),
        map(number_literal, AstValue::Number),
        map(string_literal, AstValue::String),
        map(array_value, AstValue::Array),
    ))
    .parse(input)
}

/// Parses `[value, ...]`, allowing a trailing comma.
fn array_value(input: Span) -> IResult<Span, Vec<AstValue>> {
    let (input, _) = pair(char('['), ws).parse(input)?;
    let (input, items) =
        separated_list0(delimited(ws, char(','), ws), ast_value).parse(input)?;
    let (input, _) = (ws, opt(char(',')), ws, char(']')).parse(input)?;
    Ok((input, items))
}

/// `=` with optional whitespace or comments on both sides.
fn equals(input: Span) -> IResult<Span, ()> {
    value((), delimited(ws, char('='), ws)).parse(input)
}

/// `keyword = "string"`
fn string_field<'a>(keyword: &'static str, input: Span<'a>) -> IResult<Span<'a>, String> {
    let (input, _) = pair(tag(keyword), equals).parse(input)?;
    string_literal(input)
}

/// Parses key = value.
fn field(input: Span) -> IResult<Span, AstField> {
    let loc = location(&input);
    let (input, (key, _, value)) = (identifier, equals, cut(ast_value)).parse(input)?;
    Ok((
        input,
        AstField {
            key,
            location: loc,
            value,
        },
    ))
}

/// Parses: settings { key = value ... }
fn settings_block(input: Span) -> IResult<Span, Vec<AstField>> {
    let (input, _) = tag("settings")(input)?;
    let (input, _) = ws(input)?;
    braced(field, input)
}

fn description_field(input: Span) -> IResult<Span, String> {
    string_field("description", input)
}

// ============================================================================
// Builder parser
// ============================================================================

/// Parses a builder block: builder "name" { ... }
pub fn builder_block(input: Span) -> IResult<Span, AstBuilder> {
    let loc = location(&input);
    let (input, name) = named_header("builder", input)?;
    let (input, body) = block_body(builder_item, input)?;

    Ok((
        input,
        AstBuilder {
            name,
            location: loc,
            body,
        },
    ))
}

/// Parses a single item within a builder block.
fn builder_item(input: Span) -> IResult<Span, AstBuilderItem> {
    alt((
        map(settings_block, AstBuilderItem::Settings),
        map(field, AstBuilderItem::Field),
    ))
    .parse(input)
}

// ============================================================================
// Project parser
// ============================================================================

/// Parses a project block: project "name" { ... }
pub fn project_block(input: Span) -> IResult<Span, AstProject> {
    let loc = location(&input);
    let (input, name) = named_header("project", input)?;
    let (input, body) = block_body(project_item, input)?;

    Ok((
        input,
        AstProject {
            name,
            location: loc,
            body,
        },
    ))
}

fn project_item(input: Span) -> IResult<Span, AstProjectItem> {
    alt((
        map(settings_block, AstProjectItem::Settings),
        map(builder_block, AstProjectItem::Builder),
    ))
    .parse(input)
}

// ============================================================================
// Recipe parser
// ============================================================================

/// Parses a recipe block: recipe "name" { ... }
pub fn recipe_block(input: Span) -> IResult<Span, AstRecipe> {
    let loc = location(&input);
    let (input, name) = named_header("recipe", input)?;
    let (input, body) = block_body(recipe_item, input)?;

    Ok((
        input,
        AstRecipe {
            name,
            location: loc,
            body,
        },
    ))
}

fn recipe_item(input: Span) -> IResult<Span, AstRecipeItem> {
    alt((
        map(description_field, AstRecipeItem::Description),
        map(settings_block, AstRecipeItem::Settings),
        map(project_block, AstRecipeItem::Project),
    ))
    .parse(input)
}

// ============================================================================
// Default recipe parser
// ============================================================================

/// Parses: default = "recipe_name"
pub fn default_recipe(input: Span) -> IResult<Span, String> {
    string_field("default", input)
}

// ============================================================================
// Root parser
// ============================================================================

/// Parses a complete Recipefile.
pub fn recipefile(input: Span) -> IResult<Span, AstRecipefile> {
    let (input, items) =
        delimited(ws, many0(ws_wrap(recipefile_item)), pair(ws, eof)).parse(input)?;
    Ok((input, AstRecipefile { items }))
}

/// Parses a top-level item in a Recipefile.
fn recipefile_item(input: Span) -> IResult<Span, AstItem> {
    alt((
        map(recipe_block, AstItem::Recipe),
        map(default_recipe, AstItem::Default),
    ))
    .parse(input)
}

// ============================================================================
// Command-line overrides
// ============================================================================

/// Parses `key=value`. A value that is not a complete literal is taken verbatim.
pub fn override_assignment(input: Span) -> IResult<Span, (String, AstValue)> {
    let (input, (key, _)) = pair(identifier, char('=')).parse(input)?;
    let (input, value) = alt((
        map(pair(ast_value, eof), |(value, _)| value),
        map(rest, |s: Span| AstValue::String(s.fragment().to_string())),
    ))
    .parse(input)?;
    Ok((input, (key, value)))
}

// ============================================================================
// Tests
// ============================================================================
