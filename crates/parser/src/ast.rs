//! Abstract Syntax Tree types.

use pybundle_core::Span;

/// Root AST node representing a Recipefile.
#[derive(Debug, Clone)]
pub struct AstRecipefile {
    pub items: Vec<AstItem>,
}

/// Top-level items in a Recipefile.
#[derive(Debug, Clone)]
pub enum AstItem {
    Recipe(AstRecipe),
    Default(String),
}

/// `recipe "name" { ... }`
#[derive(Debug, Clone)]
pub struct AstRecipe {
    pub name: String,
    pub location: Span,
    pub body: Vec<AstRecipeItem>,
}

/// Items within a recipe block.
#[derive(Debug, Clone)]
pub enum AstRecipeItem {
    Description(String),
    Settings(Vec<AstField>),
    Project(AstProject),
}

/// `project "name" { ... }`
#[derive(Debug, Clone)]
pub struct AstProject {
    pub name: String,
    pub location: Span,
    pub body: Vec<AstProjectItem>,
}

/// Items within a project block.
#[derive(Debug, Clone)]
pub enum AstProjectItem {
    Settings(Vec<AstField>),
    Builder(AstBuilder),
}

/// `builder "name" { ... }`
#[derive(Debug, Clone)]
pub struct AstBuilder {
    pub name: String,
    pub location: Span,
    pub body: Vec<AstBuilderItem>,
}

/// Items within a builder block.
#[derive(Debug, Clone)]
pub enum AstBuilderItem {
    Field(AstField),
    Settings(Vec<AstField>),
}

/// A `key = value` pair with the position of its key.
#[derive(Debug, Clone)]
pub struct AstField {
    pub key: String,
    pub location: Span,
    pub value: AstValue,
}

/// Generic AST value.
#[derive(Debug, Clone)]
pub enum AstValue {
    String(String),
    Number(i64),
    Bool(bool),
    Array(Vec<AstValue>),
}

impl AstValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AstValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AstValue::String(_) => "string",
            AstValue::Number(_) => "number",
            AstValue::Bool(_) => "bool",
            AstValue::Array(_) => "array",
        }
    }
}
