//! Ball-by-ball cricket scoring core.
//!
//! Deliveries enter through [`scorer::Scorer`], are validated by the pure
//! [`engine`] pipeline, persisted atomically by [`storage`], and fanned out to
//! readers as live snapshots through [`feed`].

pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod logging;
pub mod rates;
pub mod scorer;
pub mod storage;

pub use error::{ErrorKind, ScoringError};
pub use scorer::Scorer;
