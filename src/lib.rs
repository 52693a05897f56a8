pub mod errors;
pub mod index;
pub mod persistence;
pub mod server;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use index::flat::FlatIndex;
pub use persistence::{PersistenceError, StorePaths};
pub use server::{create_app, start_server};
pub use store::{AddAction, Store};

/// Dimension used when none is configured, matching the embedding model
/// that feeds this service.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Slot position reported by the index when a result has no match,
/// e.g. when fewer items exist than were requested.
pub const NO_MATCH: i64 = -1;

/// Raw hit returned by the similarity index: a slot position and its
/// inner-product score against the query. Positions still need to be
/// resolved back to caller IDs by the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub internal_id: i64,
    pub score: f32,
}

pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}
