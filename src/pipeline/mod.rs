//! # Directive/Field Pipeline
//!
//! Ordered-broadcast extension mechanism invoked during entry create and
//! fetch. Every extension subscribed to a lifecycle event runs each time
//! the event fires, in registration order; later extensions observe the
//! mutations of earlier ones. An extension that errors aborts the whole
//! operation.
//!
//! ## Events
//!
//! | Event | Fires | Payload |
//! |-------|-------|---------|
//! | Create | once per create, before persistence | [`CreateContext`] |
//! | FetchField | once per leaf field during fetch | [`FetchFieldContext`] |
//! | FetchResult | once per fetched record, after all fields | [`FetchResultContext`] |
//!
//! Each event exists for both the entries and the media collection; an
//! extension declares the [`Scope`] it serves and is only dispatched for
//! that scope.

mod context;
mod directives;
mod fields;

pub use context::{CreateContext, FetchFieldContext, FetchResultContext, Scope};
pub use directives::{MarkdownDirective, ShortcodesDirective, TypesDirective, VarsDirective};
pub use fields::{
    CreatedAtField, MediaModifiedAtField, ModifiedAtField, PublishedAtField, PublishedByField,
    RoutableField, UuidField,
};

use anyhow::Result;
use tracing::debug;

/// A registered listener bound to the pipeline lifecycle events.
///
/// Extensions are stateless; all per-invocation state lives in the
/// context structs, which are discarded when the invocation completes.
/// The default implementations make every hook a no-op, so an extension
/// only implements the events it cares about.
pub trait FieldExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Collection this extension instance serves.
    fn scope(&self) -> Scope {
        Scope::Entries
    }

    fn on_create(&self, _ctx: &mut CreateContext) -> Result<()> {
        Ok(())
    }

    fn on_fetch_field(&self, _ctx: &mut FetchFieldContext) -> Result<()> {
        Ok(())
    }

    fn on_fetch_result(&self, _ctx: &mut FetchResultContext) -> Result<()> {
        Ok(())
    }
}

/// The ordered extension pipeline.
///
/// Registration order is dispatch order: built-ins first, then
/// plugin-contributed extensions in plugin activation order.
#[derive(Default)]
pub struct Pipeline {
    extensions: Vec<Box<dyn FieldExtension>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline with the built-in directives and fields registered.
    pub fn with_builtins() -> Self {
        let mut pipeline = Self::new();

        // Directives run before fields; within each group, registration
        // order matches the original's include order.
        pipeline.register(Box::new(MarkdownDirective));
        pipeline.register(Box::new(ShortcodesDirective));
        pipeline.register(Box::new(TypesDirective));
        pipeline.register(Box::new(VarsDirective));

        pipeline.register(Box::new(CreatedAtField));
        pipeline.register(Box::new(ModifiedAtField));
        pipeline.register(Box::new(PublishedAtField));
        pipeline.register(Box::new(PublishedByField));
        pipeline.register(Box::new(RoutableField));
        pipeline.register(Box::new(UuidField));

        pipeline.register(Box::new(MediaModifiedAtField));

        pipeline
    }

    /// Appends an extension to the pipeline.
    pub fn register(&mut self, extension: Box<dyn FieldExtension>) {
        debug!(name = extension.name(), "registering field extension");
        self.extensions.push(extension);
    }

    /// Returns the registered extension names, in dispatch order.
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Fires the create event for a scope.
    pub fn dispatch_create(&self, scope: Scope, ctx: &mut CreateContext) -> Result<()> {
        for extension in self.extensions.iter().filter(|e| e.scope() == scope) {
            extension.on_create(ctx)?;
        }
        Ok(())
    }

    /// Fires the fetch-field event for a scope.
    pub fn dispatch_fetch_field(&self, scope: Scope, ctx: &mut FetchFieldContext) -> Result<()> {
        for extension in self.extensions.iter().filter(|e| e.scope() == scope) {
            extension.on_fetch_field(ctx)?;
        }
        Ok(())
    }

    /// Fires the fetch-result event for a scope.
    pub fn dispatch_fetch_result(&self, scope: Scope, ctx: &mut FetchResultContext) -> Result<()> {
        for extension in self.extensions.iter().filter(|e| e.scope() == scope) {
            extension.on_fetch_result(ctx)?;
        }
        Ok(())
    }
}
