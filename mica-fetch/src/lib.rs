//! Pluggable entity sources for the Mica catalog
//!
//! Every source implements [`EntityFetcher`] and is registered with an
//! [`EntityFetchers`] registry. A request either names a kind (served by the
//! primary store) or carries a URI whose scheme picks the source:
//!
//! | scheme                     | fetcher            |
//! |----------------------------|--------------------|
//! | none, or `mica://store`    | [`StoreFetcher`]   |
//! | `file://`                  | [`FileFetcher`]    |
//! | `history://render`         | [`HistoryFetcher`] |
//! | `mica+http(s)://`          | [`RemoteFetcher`]  |
//!
//! Results are lazy [`Cursor`]s; nothing is materialized up front.

pub mod error;
pub mod fetcher;
pub mod file;
pub mod history;
pub mod registry;
pub mod remote;
pub mod request;
pub mod store;

pub use error::{FetchError, Result};
pub use fetcher::{empty_cursor, failed_cursor, Cursor, EntityFetcher, FetchedEntity};
pub use file::FileFetcher;
pub use history::HistoryFetcher;
pub use registry::EntityFetchers;
pub use remote::RemoteFetcher;
pub use request::{parse_uri, FetchRequest};
pub use store::StoreFetcher;
