//! Version parsing: `major.minor.patch[tag]`.
//!
//! Versions are close to semantic versions but allow an alphanumeric tag glued
//! directly to the patch component, as used by upstream source releases such as
//! OpenSSL's `1.1.1g`. The tag is informational: two versions compare equal when
//! their numeric triples do.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, one_of},
    combinator::{eof, map_res, recognize},
    sequence::pair,
};
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// A parsed `major.minor.patch[tag]` version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    tag: Option<String>,
}

impl Version {
    /// Creates a version without a tag.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            tag: None,
        }
    }

    /// Attaches a tag such as `g` or `rc1`.
    ///
    /// A tag starting with a digit would run into the patch number when
    /// displayed; [`Version::try_from_parts`] rejects those.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into()).filter(|t| !t.is_empty());
        self
    }

    /// Creates a version from signed parts, rejecting negative components.
    pub fn try_from_parts(major: i64, minor: i64, patch: i64, tag: Option<&str>) -> Result<Self> {
        let input = format!("{}.{}.{}{}", major, minor, patch, tag.unwrap_or_default());
        let component = |name: &str, value: i64| {
            u64::try_from(value).map_err(|_| {
                BundleError::format(
                    input.clone(),
                    format!("{} component is negative ({})", name, value),
                )
            })
        };

        let major = component("major", major)?;
        let minor = component("minor", minor)?;
        let patch = component("patch", patch)?;

        let tag = match tag {
            Some(t) if !t.chars().all(is_word_char) => {
                return Err(BundleError::format(input, "tag must be alphanumeric"));
            }
            Some(t) if t.starts_with(|c: char| c.is_ascii_digit()) => {
                return Err(BundleError::format(input, "tag must not start with a digit"));
            }
            Some("") | None => None,
            Some(t) => Some(t.to_string()),
        };

        Ok(Self {
            major,
            minor,
            patch,
            tag,
        })
    }

    /// Parses a version string.
    pub fn parse(input: &str) -> Result<Self> {
        let (_, (major, minor, patch, tag)) = version_parts(input).map_err(|_| {
            BundleError::format(input, "expected major.minor.patch[tag]")
        })?;

        Ok(Self {
            major,
            minor,
            patch,
            tag: (!tag.is_empty()).then(|| tag.to_string()),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// `major.minor`: 3.9.1 -> 3.9
    pub fn ver(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// `majorminor`: 3.9.1 -> 39
    pub fn ver_nodot(&self) -> String {
        format!("{}{}", self.major, self.minor)
    }

    /// Returns the same version without its tag.
    pub fn finalize(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parses one numeric component: `0|[1-9]\d*`.
fn component(input: &str) -> IResult<&str, u64> {
    map_res(
        alt((recognize(pair(one_of("123456789"), digit0)), tag("0"))),
        str::parse::<u64>,
    )
    .parse(input)
}

fn version_parts(input: &str) -> IResult<&str, (u64, u64, u64, &str)> {
    let (input, major) = component(input)?;
    let (input, _) = char('.')(input)?;
    let (input, minor) = component(input)?;
    let (input, _) = char('.')(input)?;
    let (input, patch) = component(input)?;
    let (input, tag) = take_while(is_word_char)(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (major, minor, patch, tag)))
}

impl FromStr for Version {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = BundleError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(tag) = &self.tag {
            f.write_str(tag)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}
