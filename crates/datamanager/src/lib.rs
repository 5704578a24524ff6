//! Remote content API client library.
//!
//! Wraps the content API (entries, entry lists) and the asset file API
//! (file, image and thumbnail URLs) using [`reqwest`], with in-process TTL
//! caches in front of both. Also provides the HTTP implementation of the
//! core crate's [`vitrine_core::assets::AssetApi`] seam.

pub mod api;
pub mod cache;
pub mod files;
pub mod manager;

pub use api::{DatamanagerApi, DatamanagerError, EntriesQuery};
pub use cache::TtlCache;
pub use files::{FileUrlApi, HttpAssetApiFactory};
pub use manager::{Datamanager, DatamanagerConfig, LoadRequest};
