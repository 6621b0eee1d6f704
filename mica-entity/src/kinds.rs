//! Built-in kind names

/// Kind of entities whose `data.schema` registers a JSON Schema for another kind
pub const KIND_KIND: &str = "/mica/kind/v1";

/// Kind of view entities
pub const VIEW_KIND: &str = "/mica/view/v1";

/// Kind of reusable transform scripts referenced by views
pub const SCRIPT_KIND: &str = "/mica/script/v1";

/// Kind assigned to render-history rows when they are read back as entities
pub const RENDER_HISTORY_KIND: &str = "/mica/render-history/v1";

/// Field of a kind entity holding the schema
pub const SCHEMA_FIELD: &str = "schema";

/// Field of a script entity holding the script source
pub const SCRIPT_SOURCE_FIELD: &str = "source";
