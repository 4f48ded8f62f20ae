//! Placeholder substitution for command arguments and URL templates.
//!
//! Supports the following syntax:
//! - `${key}` - Value from the substitution context (usually builder settings)
//! - `${env.NAME}` - Environment variable
//! - `$$` - Escaped literal `$`
//!
//! A `$` not followed by `{` or `$` is kept as-is.

use std::collections::HashMap;

use crate::error::{BundleError, Result};
use crate::settings::Settings;

/// Values available to `${...}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    values: HashMap<String, String>,
}

impl InterpolationContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context holding every setting rendered as a string.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            values: settings.to_substitutions(),
        }
    }

    /// Adds a value to the context.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Gets a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }
}

/// Interpolates placeholders in a string.
///
/// # Examples
/// ```
/// use pybundle_core::interpolation::{interpolate, InterpolationContext};
///
/// let ctx = InterpolationContext::new()
///     .with_value("name", "xz")
///     .with_value("version", "5.2.5");
///
/// let url = interpolate("https://tukaani.org/xz/${name}-${version}.tar.gz", &ctx).unwrap();
/// assert_eq!(url, "https://tukaani.org/xz/xz-5.2.5.tar.gz");
/// ```
pub fn interpolate(input: &str, ctx: &InterpolationContext) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('{') {
            let end = tail.find('}').ok_or_else(|| {
                interpolation_error(format!("Unterminated placeholder '${{{}'", tail))
            })?;
            out.push_str(&Reference::parse(&tail[..end])?.resolve(ctx)?);
            rest = &tail[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn interpolation_error(message: String) -> BundleError {
    BundleError::Interpolation { message }
}

/// What a placeholder refers to.
#[derive(Debug, Clone, PartialEq)]
enum Reference<'a> {
    /// `${key}`
    Value(&'a str),
    /// `${env.NAME}`
    Environment(&'a str),
}

impl<'a> Reference<'a> {
    fn parse(name: &'a str) -> Result<Self> {
        if name.is_empty() {
            return Err(interpolation_error("Empty placeholder".to_string()));
        }
        let valid = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '-');
        if let Some(c) = name.chars().find(|&c| !valid(c)) {
            return Err(interpolation_error(format!(
                "Invalid character '{}' in placeholder '{}'",
                c, name
            )));
        }
        Ok(match name.strip_prefix("env.") {
            Some(var) => Reference::Environment(var),
            None => Reference::Value(name),
        })
    }

    fn resolve(&self, ctx: &InterpolationContext) -> Result<String> {
        match *self {
            Reference::Value(key) => ctx
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| interpolation_error(format!("Undefined placeholder: {}", key))),
            Reference::Environment(var) => std::env::var(var).map_err(|_| {
                interpolation_error(format!("Environment variable {} is not set", var))
            }),
        }
    }
}

/// Interpolates every string of a slice.
pub fn interpolate_vec(items: &[String], ctx: &InterpolationContext) -> Result<Vec<String>> {
    items.iter().map(|s| interpolate(s, ctx)).collect()
}
