//! Domain logic for the Vitrine site renderer.
//!
//! Asset negotiation (shape normalization, best-fit variant search,
//! embedded-entry unwrapping, remote-ID dispatch), linked-entry helpers and
//! dynamic template naming. Nothing in here talks HTTP; network access goes
//! through the [`assets::AssetApi`] trait implemented by the datamanager
//! crate.

pub mod assets;
pub mod entries;
pub mod error;
pub mod templates;
