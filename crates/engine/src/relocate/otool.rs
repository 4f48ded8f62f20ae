//! Parser for `otool -L` output.

use std::path::Path;

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_till1},
    character::complete::space0,
    combinator::{rest, verify},
};

/// Install name and load references of one binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Linkage {
    /// The binary's own install name, when it has one.
    pub id: Option<String>,

    /// Libraries the binary loads, in listed order.
    pub references: Vec<String>,
}

/// Parses one `\t/usr/lib/libz.1.dylib (compatibility version 1.0.0, current version 1.2.11)` line.
fn linkage_entry(line: &str) -> IResult<&str, &str> {
    let (input, _) = space0(line)?;
    let (input, path) = take_till1(char::is_whitespace).parse(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = tag("(compatibility version ").parse(input)?;
    let (input, _) = verify(rest, |tail: &str| tail.len() > 1 && tail.ends_with(')')).parse(input)?;
    Ok((input, path))
}

/// Splits `otool -L` output for `binary` into its id and references.
///
/// The header line (`path:`) never matches. The first entry whose file name
/// equals the binary's file name is its install name; every other entry is a
/// reference.
pub fn parse_linkage(binary: &Path, text: &str) -> Linkage {
    let own_name = binary.file_name().and_then(|n| n.to_str());
    let mut linkage = Linkage::default();

    for line in text.lines() {
        let Ok((_, entry)) = linkage_entry(line.trim_end_matches('\r')) else {
            continue;
        };
        let entry_name = Path::new(entry).file_name().and_then(|n| n.to_str());
        if linkage.id.is_none() && entry_name.is_some() && entry_name == own_name {
            linkage.id = Some(entry.to_string());
        } else {
            linkage.references.push(entry.to_string());
        }
    }

    linkage
}
