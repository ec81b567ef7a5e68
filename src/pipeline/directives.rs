//! Fetch-time directives
//!
//! Directives rewrite string field values during fetch when they find
//! their marker token. A value without the marker passes through
//! unchanged, so re-applying a directive to already-expanded output is a
//! no-op.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde_json::Value;

use crate::domain;
use crate::domain::Fields;
use super::context::FetchFieldContext;
use super::FieldExtension;

/// `@markdown`: renders the field value as markdown, marker stripped.
pub struct MarkdownDirective;

impl FieldExtension for MarkdownDirective {
    fn name(&self) -> &str {
        "markdown"
    }

    fn on_fetch_field(&self, ctx: &mut FetchFieldContext) -> Result<()> {
        if !ctx.settings.entries.directives.markdown.enabled {
            return Ok(());
        }

        let Value::String(s) = &*ctx.value else {
            return Ok(());
        };

        if !s.contains("@markdown") {
            return Ok(());
        }

        let stripped = s.replace("@markdown", "");
        let rendered = ctx.markdown.parse(stripped.trim(), ctx.cache);
        *ctx.value = Value::String(rendered);

        Ok(())
    }
}

/// `@shortcodes`: expands shortcodes, marker stripped. When the shortcode
/// parser is enabled in settings, fields without the marker are expanded
/// implicitly as well.
pub struct ShortcodesDirective;

impl FieldExtension for ShortcodesDirective {
    fn name(&self) -> &str {
        "shortcodes"
    }

    fn on_fetch_field(&self, ctx: &mut FetchFieldContext) -> Result<()> {
        if !ctx.settings.entries.directives.shortcodes.enabled {
            return Ok(());
        }

        let Value::String(s) = &*ctx.value else {
            return Ok(());
        };

        let shortcode_ctx = ctx.shortcode_context();

        if s.contains("@shortcodes") {
            let stripped = s.replace("@shortcodes", "");
            let parsed = ctx.shortcodes.parse(stripped.trim(), &shortcode_ctx)?;
            *ctx.value = Value::String(parsed.trim().to_string());
        } else if ctx.settings.parsers.shortcodes.enabled {
            let parsed = ctx.shortcodes.parse(s, &shortcode_ctx)?;
            *ctx.value = Value::String(parsed);
        }

        Ok(())
    }
}

/// `@var(dotted.path)`: interpolates values from the per-fetch vars bag.
/// Unresolvable paths expand to the empty string.
pub struct VarsDirective;

impl FieldExtension for VarsDirective {
    fn name(&self) -> &str {
        "vars"
    }

    fn on_fetch_field(&self, ctx: &mut FetchFieldContext) -> Result<()> {
        if !ctx.settings.entries.directives.vars.enabled {
            return Ok(());
        }

        let Value::String(s) = &*ctx.value else {
            return Ok(());
        };

        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| Regex::new(r"(?s)@var\((.*?)\)").unwrap());

        if !pattern.is_match(s) {
            return Ok(());
        }

        let replaced = pattern
            .replace_all(s, |caps: &regex::Captures| {
                match domain::get(ctx.vars, caps[1].trim()) {
                    Some(Value::String(v)) => v.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                }
            })
            .into_owned();

        *ctx.value = Value::String(replaced);

        Ok(())
    }
}

/// `@type(t) rest`: converts the remainder of the value to the named type.
pub struct TypesDirective;

impl FieldExtension for TypesDirective {
    fn name(&self) -> &str {
        "types"
    }

    fn on_fetch_field(&self, ctx: &mut FetchFieldContext) -> Result<()> {
        if !ctx.settings.entries.directives.types.enabled {
            return Ok(());
        }

        let Value::String(s) = &*ctx.value else {
            return Ok(());
        };

        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern =
            PATTERN.get_or_init(|| Regex::new(r"(?s)^@type\((.*?)\)\s*(.*)$").unwrap());

        let Some(caps) = pattern.captures(s) else {
            return Ok(());
        };

        let type_name = caps[1].trim().to_string();
        let rest = caps[2].to_string();

        *ctx.value = convert(&type_name, &rest);

        Ok(())
    }
}

fn convert(type_name: &str, rest: &str) -> Value {
    match type_name {
        "int" | "integer" => Value::from(rest.trim().parse::<i64>().unwrap_or(0)),
        "float" => Value::from(rest.trim().parse::<f64>().unwrap_or(0.0)),
        "bool" | "boolean" => Value::from(match rest.trim() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            other => !other.is_empty(),
        }),
        "null" => Value::Null,
        "string" => Value::String(rest.to_string()),
        "array" | "collection" => match serde_json::from_str::<Value>(rest.trim()) {
            Ok(value @ (Value::Array(_) | Value::Object(_))) => value,
            _ => Value::Object(parse_pairs(rest)),
        },
        "json" => {
            if serde_json::from_str::<Value>(rest.trim()).is_ok() {
                Value::String(rest.to_string())
            } else {
                Value::String(
                    serde_json::to_string(&Value::Object(parse_pairs(rest)))
                        .unwrap_or_default(),
                )
            }
        }
        // Unknown type names leave the value untouched.
        _ => Value::String(format!("@type({}) {}", type_name, rest)),
    }
}

/// Parses `key=value` pairs separated by commas; a bare word becomes a
/// key with an empty value.
fn parse_pairs(input: &str) -> Fields {
    let mut fields = Fields::new();

    for pair in input.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        match pair.split_once('=') {
            Some((key, value)) => {
                fields.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
            None => {
                fields.insert(pair.to_string(), Value::String(String::new()));
            }
        }
    }

    fields
}
