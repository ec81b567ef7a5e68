//! # Parsers
//!
//! Text transformation engines applied to field values during fetch:
//! markdown rendering and the shortcode mini-language. Both cache their
//! output in the [`CacheGateway`](crate::storage::CacheGateway) under
//! deterministic keys derived from the input text.

mod markdown;
mod shortcode;

pub use markdown::Markdown;
pub use shortcode::{
    EntrySource, ShortcodeCall, ShortcodeContext, ShortcodeError, Shortcodes,
};

/// Parser services shared by the pipeline.
pub struct Parsers {
    pub markdown: Markdown,
    pub shortcodes: Shortcodes,
}

impl Parsers {
    pub fn new(markdown: Markdown, shortcodes: Shortcodes) -> Self {
        Self {
            markdown,
            shortcodes,
        }
    }
}
