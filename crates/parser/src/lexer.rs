//! Input span types.

use nom_locate::LocatedSpan;

/// Input type with position tracking.
pub type Span<'a> = LocatedSpan<&'a str>;

/// Creates a new span from a string slice.
pub fn span(input: &str) -> Span<'_> {
    Span::new(input)
}

/// Converts a located input position into an error span covering one character.
pub fn location(input: &Span) -> pybundle_core::Span {
    let start = input.location_offset();
    pybundle_core::Span {
        start,
        end: start + 1,
        line: input.location_line() as usize,
        column: input.get_utf8_column(),
    }
}
