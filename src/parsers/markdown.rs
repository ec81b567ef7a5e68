//! Markdown rendering
//!
//! Thin wrapper around pulldown-cmark with the common extensions enabled.
//! Rendered output is cache-eligible keyed by the input text.

use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;

use crate::storage::cache::{cache_id, CacheGateway};
use crate::storage::config::MarkdownSettings;

/// Markdown to HTML parser.
pub struct Markdown {
    cache_enabled: bool,
}

impl Markdown {
    pub fn new(settings: &MarkdownSettings) -> Self {
        Self {
            cache_enabled: settings.cache,
        }
    }

    /// Returns the cache key for an input text.
    pub fn cache_key(input: &str) -> String {
        cache_id("markdown", input)
    }

    /// Renders markdown to HTML, consulting the cache.
    pub fn parse(&self, input: &str, cache: &CacheGateway) -> String {
        if !self.cache_enabled {
            return self.render(input);
        }

        let key = Self::cache_key(input);

        if let Some(Value::String(cached)) = cache.get(&key) {
            return cached;
        }

        let output = self.render(input);
        cache.set(&key, Value::String(output.clone()));

        output
    }

    /// Renders markdown to HTML without consulting the cache.
    pub fn render(&self, input: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut output = String::new();
        html::push_html(&mut output, Parser::new_ext(input, options));

        output.trim().to_string()
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Self::new(&MarkdownSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_emphasis() {
        let md = Markdown::default();

        assert_eq!(md.render("**x**"), "<p><strong>x</strong></p>");
    }

    #[test]
    fn renders_tables_extension() {
        let md = Markdown::default();
        let html = md.render("| a | b |\n|---|---|\n| 1 | 2 |");

        assert!(html.contains("<table>"));
    }

    #[test]
    fn parse_reads_cache() {
        let md = Markdown::default();
        let cache = CacheGateway::memory();

        let first = md.parse("**x**", &cache);
        assert_eq!(first, "<p><strong>x</strong></p>");

        cache.set(&Markdown::cache_key("**x**"), json!("cached"));
        assert_eq!(md.parse("**x**", &cache), "cached");
    }

    #[test]
    fn disabled_cache_skips_storage() {
        let settings = MarkdownSettings {
            enabled: true,
            cache: false,
        };
        let md = Markdown::new(&settings);
        let cache = CacheGateway::memory();

        md.parse("**x**", &cache);

        assert!(!cache.has(&Markdown::cache_key("**x**")));
    }
}
