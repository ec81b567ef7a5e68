//! Shortcode parsing
//!
//! Shortcodes are a template mini-language embedded in field values:
//!
//! ```text
//! [handler attr=value]content[/handler]
//! ```
//!
//! A registered handler receives the call (name, attributes, content) and
//! returns replacement text. Content of a regular handler is expanded
//! recursively before the handler runs; a raw handler receives its content
//! verbatim, which is how `[raw]...[/raw]` emits literal shortcode-like
//! text without triggering expansion. Unregistered names pass through
//! untouched.
//!
//! Expansions are cache-eligible keyed by the input text. Cache entries are
//! only invalidated by an explicit clear, never by handler registration
//! changes.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::storage::cache::{cache_id, CacheGateway};
use crate::storage::config::{Settings, ShortcodesSettings};
use super::markdown::Markdown;

#[derive(Debug, Error)]
pub enum ShortcodeError {
    #[error("Shortcode handler '{0}' failed: {1}")]
    Handler(String, String),
}

/// Source of entry field values for the `[entries_fetch]` handler.
///
/// Implemented by the entries service; a trait keeps the parser free of a
/// dependency on content storage.
pub trait EntrySource {
    /// Returns a field value of the entry with the given id.
    fn field(&self, id: &str, field: &str) -> Option<Value>;
}

/// Services available to shortcode handlers.
pub struct ShortcodeContext<'a> {
    pub settings: &'a Settings,
    pub cache: &'a CacheGateway,
    pub markdown: &'a Markdown,
    pub entries: Option<&'a dyn EntrySource>,
}

/// A parsed shortcode invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortcodeCall {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub content: Option<String>,
}

impl ShortcodeCall {
    /// Returns an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Returns the content, or the empty string when self-closing.
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

type HandlerFn =
    Box<dyn Fn(&ShortcodeCall, &ShortcodeContext) -> Result<String, ShortcodeError> + Send + Sync>;

struct Handler {
    func: HandlerFn,
    raw: bool,
}

/// Shortcode parser with a registered handler table.
pub struct Shortcodes {
    handlers: BTreeMap<String, Handler>,
    cache_enabled: bool,
}

impl Shortcodes {
    /// An empty parser with no handlers.
    pub fn new(settings: &ShortcodesSettings) -> Self {
        Self {
            handlers: BTreeMap::new(),
            cache_enabled: settings.cache,
        }
    }

    /// A parser with the built-in handlers whose settings toggle is on.
    pub fn with_builtins(settings: &ShortcodesSettings) -> Self {
        let mut shortcodes = Self::new(settings);
        let handlers = &settings.handlers;

        if handlers.raw.enabled {
            shortcodes.add_raw_handler("raw", |call, _ctx| Ok(call.content().to_string()));
        }

        if handlers.markdown.enabled {
            shortcodes.add_handler("markdown", |call, ctx| {
                Ok(ctx.markdown.parse(call.content(), ctx.cache))
            });
        }

        if handlers.url.enabled {
            shortcodes.add_handler("url", |_call, ctx| Ok(ctx.settings.base_url.clone()));
        }

        if handlers.entries_fetch.enabled {
            shortcodes.add_handler("entries_fetch", |call, ctx| {
                let (Some(id), Some(field)) = (call.attr("id"), call.attr("field")) else {
                    return Ok(String::new());
                };

                let value = ctx.entries.and_then(|entries| entries.field(id, field));

                Ok(match value {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
            });
        }

        shortcodes
    }

    /// Registers a handler. Content is expanded before the handler runs.
    pub fn add_handler<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&ShortcodeCall, &ShortcodeContext) -> Result<String, ShortcodeError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            name.into(),
            Handler {
                func: Box::new(func),
                raw: false,
            },
        );
    }

    /// Registers a handler that receives its content verbatim.
    pub fn add_raw_handler<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&ShortcodeCall, &ShortcodeContext) -> Result<String, ShortcodeError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            name.into(),
            Handler {
                func: Box::new(func),
                raw: true,
            },
        );
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the registered handler names.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Returns the cache key for an input text.
    pub fn cache_key(input: &str) -> String {
        cache_id("shortcode", input)
    }

    /// Expands shortcodes, consulting the cache.
    ///
    /// A cache hit returns the previously computed expansion
    /// unconditionally.
    pub fn parse(&self, input: &str, ctx: &ShortcodeContext) -> Result<String, ShortcodeError> {
        if !self.cache_enabled {
            return self.process(input, ctx);
        }

        let key = Self::cache_key(input);

        if let Some(Value::String(cached)) = ctx.cache.get(&key) {
            return Ok(cached);
        }

        let output = self.process(input, ctx)?;
        ctx.cache.set(&key, Value::String(output.clone()));

        Ok(output)
    }

    /// Expands shortcodes without consulting the cache.
    pub fn process(&self, input: &str, ctx: &ShortcodeContext) -> Result<String, ShortcodeError> {
        let mut output = String::new();
        let mut rest = input;

        while let Some(open) = rest.find('[') {
            output.push_str(&rest[..open]);
            let tag_start = &rest[open..];

            let Some(tag) = parse_opening_tag(tag_start) else {
                output.push('[');
                rest = &tag_start[1..];
                continue;
            };

            let Some(handler) = self.handlers.get(&tag.name) else {
                output.push('[');
                rest = &tag_start[1..];
                continue;
            };

            let after_tag = &tag_start[tag.len..];

            let call = match find_closing(after_tag, &tag.name) {
                Some(closing) => {
                    let content = if handler.raw {
                        closing.content.to_string()
                    } else {
                        self.process(closing.content, ctx)?
                    };
                    rest = &after_tag[closing.consumed..];
                    ShortcodeCall {
                        name: tag.name,
                        attrs: tag.attrs,
                        content: Some(content),
                    }
                }
                None => {
                    // No closing tag: treat as self-closing.
                    rest = after_tag;
                    ShortcodeCall {
                        name: tag.name,
                        attrs: tag.attrs,
                        content: None,
                    }
                }
            };

            output.push_str(&(handler.func)(&call, ctx)?);
        }

        output.push_str(rest);
        Ok(output)
    }
}

struct OpeningTag {
    name: String,
    attrs: BTreeMap<String, String>,
    /// Byte length of the tag text, including both brackets.
    len: usize,
}

/// Parses an opening tag at the start of `input` (which begins with `[`).
///
/// Returns None for closing tags and anything that is not well-formed,
/// which the caller then emits literally.
fn parse_opening_tag(input: &str) -> Option<OpeningTag> {
    let mut chars = input.char_indices().peekable();
    let (_, bracket) = chars.next()?;
    if bracket != '[' {
        return None;
    }

    // Name
    let mut name = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }

    if name.is_empty() {
        return None;
    }

    // Attributes
    let mut attrs = BTreeMap::new();

    loop {
        // Skip whitespace
        while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            chars.next();
        }

        match chars.peek() {
            Some(&(pos, ']')) => {
                return Some(OpeningTag {
                    name,
                    attrs,
                    len: pos + 1,
                });
            }
            Some(&(_, c)) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let mut attr_name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        attr_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let value = if chars.peek().is_some_and(|&(_, c)| c == '=') {
                    chars.next();
                    match chars.peek() {
                        Some(&(_, quote @ ('"' | '\''))) => {
                            chars.next();
                            let mut value = String::new();
                            loop {
                                match chars.next() {
                                    Some((_, c)) if c == quote => break,
                                    Some((_, c)) => value.push(c),
                                    None => return None,
                                }
                            }
                            value
                        }
                        _ => {
                            let mut value = String::new();
                            while let Some(&(_, c)) = chars.peek() {
                                if c.is_whitespace() || c == ']' {
                                    break;
                                }
                                value.push(c);
                                chars.next();
                            }
                            value
                        }
                    }
                } else {
                    String::new()
                };

                attrs.insert(attr_name, value);
            }
            _ => return None,
        }
    }
}

struct ClosingMatch<'a> {
    /// Text between the opening and closing tags.
    content: &'a str,
    /// Bytes consumed from the haystack, including the closing tag.
    consumed: usize,
}

/// Finds the matching `[/name]` in `haystack`, honoring nested openings
/// of the same name.
fn find_closing<'a>(haystack: &'a str, name: &str) -> Option<ClosingMatch<'a>> {
    let close_pat = format!("[/{}]", name);
    let open_pat = format!("[{}", name);

    let mut depth = 0usize;

    for (i, c) in haystack.char_indices() {
        if c != '[' {
            continue;
        }

        let rest = &haystack[i..];

        if rest.starts_with(&close_pat) {
            if depth == 0 {
                return Some(ClosingMatch {
                    content: &haystack[..i],
                    consumed: i + close_pat.len(),
                });
            }
            depth -= 1;
        } else if rest.starts_with(&open_pat) {
            // Same-name opening only when the name ends at a boundary.
            let boundary = rest[open_pat.len()..].chars().next();
            if boundary.is_some_and(|c| c == ']' || c.is_whitespace()) {
                depth += 1;
            }
        }
    }

    None
}
