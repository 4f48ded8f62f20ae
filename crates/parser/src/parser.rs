//! AST to Recipefile conversion.

use std::path::Path;

use pybundle_core::{
    BuildFlavor, BuilderSpec, BundleError, ProjectSpec, RecipeSpec, Recipefile, Result,
    SettingValue, Settings, Span, Version,
};

use crate::ast::*;
use crate::combinators;
use crate::lexer::{location, span};

/// Parses a Recipefile from source content.
pub fn parse_recipefile(content: &str, path: &Path) -> Result<Recipefile> {
    let input = span(content);

    let (_, ast) = combinators::recipefile(input).map_err(|e| match e {
        nom::Err::Error(err) | nom::Err::Failure(err) => {
            let at = location(&err.input);
            parse_error(
                format!(
                    "unexpected input at line {}, column {}",
                    at.line, at.column
                ),
                at,
            )
        }
        nom::Err::Incomplete(_) => BundleError::Parse {
            message: "Unexpected end of file".to_string(),
            span: None,
        },
    })?;

    convert_ast(ast, path)
}

/// Parses a `key=value` command-line override.
pub fn parse_override(input: &str) -> Result<(String, SettingValue)> {
    let (_, (key, value)) =
        combinators::override_assignment(span(input)).map_err(|_| BundleError::Parse {
            message: format!("invalid override '{}': expected key=value", input),
            span: None,
        })?;
    let value = convert_value(&key, value, None)?;
    Ok((key, value))
}

fn parse_error(message: String, at: Span) -> BundleError {
    BundleError::Parse {
        message,
        span: Some(at),
    }
}

/// Converts the AST to a Recipefile.
fn convert_ast(ast: AstRecipefile, path: &Path) -> Result<Recipefile> {
    let mut recipefile = Recipefile::new(path);

    for item in ast.items {
        match item {
            AstItem::Recipe(recipe) => {
                recipefile.add_recipe(convert_recipe(recipe)?);
            }
            AstItem::Default(name) => {
                recipefile.set_default_recipe(name);
            }
        }
    }

    Ok(recipefile)
}

fn convert_recipe(ast: AstRecipe) -> Result<RecipeSpec> {
    let mut recipe = RecipeSpec::new(ast.name);

    for item in ast.body {
        match item {
            AstRecipeItem::Description(desc) => {
                recipe = recipe.with_description(desc);
            }
            AstRecipeItem::Settings(fields) => {
                recipe.settings.update(&convert_settings(fields)?);
            }
            AstRecipeItem::Project(project) => {
                let project = convert_project(project)?;
                if recipe.projects.iter().any(|p| p.name == project.name) {
                    return Err(BundleError::Parse {
                        message: format!(
                            "project '{}' is declared twice in recipe '{}'",
                            project.name, recipe.name
                        ),
                        span: Some(ast.location.clone()),
                    });
                }
                recipe.projects.push(project);
            }
        }
    }

    Ok(recipe)
}

fn convert_project(ast: AstProject) -> Result<ProjectSpec> {
    let mut project = ProjectSpec::new(ast.name);

    for item in ast.body {
        match item {
            AstProjectItem::Settings(fields) => {
                project.settings.update(&convert_settings(fields)?);
            }
            AstProjectItem::Builder(builder) => {
                let location = builder.location.clone();
                let builder = convert_builder(builder)?;
                if project.get_builder(&builder.name).is_some() {
                    return Err(parse_error(
                        format!(
                            "builder '{}' is declared twice in project '{}'",
                            builder.name, project.name
                        ),
                        location,
                    ));
                }
                project.builders.push(builder);
            }
        }
    }

    Ok(project)
}

fn convert_builder(ast: AstBuilder) -> Result<BuilderSpec> {
    let mut version: Option<Version> = None;
    let mut kind = None;
    let mut product = None;
    let mut flavor = None;
    let mut url = None;
    let mut depends_on = Vec::new();
    let mut settings = Settings::new();

    for item in ast.body {
        match item {
            AstBuilderItem::Settings(fields) => settings.update(&convert_settings(fields)?),
            AstBuilderItem::Field(field) => match field.key.as_str() {
                "version" => version = Some(expect_string(&field)?.parse()?),
                "kind" => kind = Some(expect_string(&field)?.to_string()),
                "product" => product = Some(expect_string(&field)?.to_string()),
                "flavor" => flavor = Some(expect_string(&field)?.parse::<BuildFlavor>()?),
                "url" => url = Some(expect_string(&field)?.to_string()),
                "depends_on" => depends_on = expect_string_array(&field)?,
                other => {
                    return Err(parse_error(
                        format!("unknown field '{}' in builder '{}'", other, ast.name),
                        field.location,
                    ));
                }
            },
        }
    }

    let version = version.ok_or_else(|| {
        parse_error(
            format!("builder '{}' has no version", ast.name),
            ast.location.clone(),
        )
    })?;

    let mut builder = BuilderSpec::new(ast.name, version)
        .with_depends_on(depends_on)
        .with_settings(settings);

    if let Some(kind) = kind {
        builder = builder.with_kind(kind);
    }
    if let Some(product) = product {
        builder = builder.with_product(product);
    }
    if let Some(flavor) = flavor {
        builder = builder.with_flavor(flavor);
    }
    if let Some(url) = url {
        builder = builder.with_url(url);
    }

    Ok(builder)
}

fn convert_settings(fields: Vec<AstField>) -> Result<Settings> {
    let mut settings = Settings::new();
    for field in fields {
        let value = convert_value(&field.key, field.value, Some(field.location))?;
        settings.insert(field.key, value);
    }
    Ok(settings)
}

fn convert_value(key: &str, value: AstValue, at: Option<Span>) -> Result<SettingValue> {
    Ok(match value {
        AstValue::String(s) => SettingValue::String(s),
        AstValue::Number(n) => SettingValue::Integer(n),
        AstValue::Bool(b) => SettingValue::Bool(b),
        AstValue::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AstValue::String(s) => list.push(s),
                    AstValue::Number(n) => list.push(n.to_string()),
                    AstValue::Bool(b) => list.push(b.to_string()),
                    AstValue::Array(_) => {
                        return Err(BundleError::Parse {
                            message: format!("setting '{}' cannot hold nested arrays", key),
                            span: at,
                        });
                    }
                }
            }
            SettingValue::List(list)
        }
    })
}

fn expect_string(field: &AstField) -> Result<&str> {
    field.value.as_string().ok_or_else(|| {
        parse_error(
            format!(
                "field '{}' expects a string, found {}",
                field.key,
                field.value.type_name()
            ),
            field.location.clone(),
        )
    })
}

fn expect_string_array(field: &AstField) -> Result<Vec<String>> {
    let mismatch = || {
        parse_error(
            format!("field '{}' expects an array of strings", field.key),
            field.location.clone(),
        )
    };

    match &field.value {
        AstValue::Array(items) => items
            .iter()
            .map(|item| item.as_string().map(str::to_string).ok_or_else(mismatch))
            .collect(),
        _ => Err(mismatch()),
    }
}
