//! View rendering for the Mica catalog
//!
//! A view selects entities of one kind through [`mica_fetch::EntityFetchers`]
//! and reshapes them. [`ViewRenderer`] runs the stages in a fixed order:
//!
//! 1. validate render parameters against the view's declared schemas
//! 2. select source entities, lazily, from every supporting fetcher
//! 3. per item: extract with `jsonPath`, then apply `jsonPatch`
//! 4. optionally transform the whole batch with a sandboxed script
//! 5. optionally `flatten` one level of arrays, then `merge` into one object
//! 6. validate the document against the output schema
//! 7. append a render-history record (best effort)
//!
//! Item-level failures are skipped and reported in
//! [`RenderedView::item_errors`] unless the request is strict, in which case
//! the first one aborts the render.

pub mod aggregate;
pub mod definition;
pub mod error;
pub mod params;
pub mod render;
pub mod request;
pub mod shape;
pub mod source;

pub use definition::{DataSpec, ResolvedView, ScriptSpec, Selector, ViewDefinition, INLINE_VIEW_NAME};
pub use error::{RenderError, Result};
pub use render::ViewRenderer;
pub use request::{ItemError, RenderRequest, RenderedView, ViewTarget};
pub use shape::Shaper;
pub use source::{HistorySink, ViewSource};
