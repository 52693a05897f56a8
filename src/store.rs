//! # Store Module
//!
//! The owned store object tying the vector array, the ID maps, the
//! metadata records, and the similarity index together. It is constructed
//! once per process with [`Store::open`] and passed to request handlers;
//! there is no ambient global state.
//!
//! Every mutation runs validate, mutate, rebuild index, persist before
//! returning, so a success response guarantees both index consistency and
//! durability. The caller (the HTTP facade) serializes mutations behind a
//! write lock.
//!
//! Deletion is logical: the slot is zeroed and its mappings removed, but
//! the slot itself is never compacted away. Internal IDs therefore stay
//! stable for the lifetime of the store and are never reused.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::{StoreError, StoreResult};
use crate::persistence::{self, StorePaths};
use crate::FlatIndex;

/// Action taken by an add operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddAction {
    Added,
    Updated,
}

/// Outcome of an add operation.
#[derive(Debug, Clone, Copy)]
pub struct AddOutcome {
    pub action: AddAction,
    pub internal_id: u64,
    pub ntotal: usize,
}

/// A ranked search result resolved back to the caller's ID.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub internal_id: u64,
    pub distance: f32,
    pub original_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A stored entry as returned by point lookups and enumerations.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub id: String,
    pub internal_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A live ID pair, for enumeration.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub original_id: String,
    pub internal_id: u64,
}

/// Counters and configuration exposed by the diagnostic endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub dimension: usize,
    pub live_count: usize,
    pub total_slots: usize,
    pub deleted_slots: usize,
    pub index_items: usize,
}

/// Persistent vector store with ID mapping, metadata, and a rebuildable
/// inner-product index.
#[derive(Debug)]
pub struct Store {
    dim: usize,
    vectors: Vec<Vec<f32>>,
    id_to_internal: HashMap<String, u64>,
    internal_to_id: HashMap<u64, String>,
    metadata: HashMap<u64, Value>,
    index: FlatIndex,
    paths: StorePaths,
}

impl Store {
    /// Open a store in `data_dir`, loading any persisted state.
    ///
    /// The three persisted files are treated as one consistency unit with
    /// the vector file as the source of truth: a missing or stale index
    /// file is rebuilt from the vectors, and a missing state file falls
    /// back to empty maps. A vector file whose dimension differs from the
    /// configured one is an error, not a silent reconfiguration.
    pub fn open(dim: usize, data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::Persistence(persistence::PersistenceError::Io(e)))?;
        let paths = StorePaths::in_dir(data_dir);

        let vectors = if paths.vectors.exists() {
            let file = persistence::load_vectors(&paths.vectors)?;
            if file.dim != dim {
                return Err(StoreError::Persistence(
                    persistence::PersistenceError::InvalidFormat(format!(
                        "Stored dimension {} does not match configured dimension {}",
                        file.dim, dim
                    )),
                ));
            }
            file.vectors
        } else {
            Vec::new()
        };

        let (mut id_to_internal, mut internal_to_id, mut metadata) = if paths.state.exists() {
            let file = persistence::load_state(&paths.state)?;
            (file.id_to_internal, file.internal_to_id, file.metadata)
        } else {
            if !vectors.is_empty() {
                warn!(
                    "State file {} missing with {} persisted vectors; starting with empty ID maps",
                    paths.state.display(),
                    vectors.len()
                );
            }
            (HashMap::new(), HashMap::new(), HashMap::new())
        };

        // Vectors are the source of truth: mappings pointing past the end
        // of the slot array (e.g. a vector file from an older snapshot)
        // cannot be resolved and are dropped.
        let stale_ids: Vec<String> = id_to_internal
            .iter()
            .filter(|&(_, &internal_id)| internal_id as usize >= vectors.len())
            .map(|(id, _)| id.clone())
            .collect();
        if !stale_ids.is_empty() {
            warn!(
                "Dropping {} ID mappings past the end of the vector file",
                stale_ids.len()
            );
            for id in &stale_ids {
                if let Some(internal_id) = id_to_internal.remove(id) {
                    internal_to_id.remove(&internal_id);
                    metadata.remove(&internal_id);
                }
            }
        }

        let index = match persistence::load_index(&paths.index) {
            Ok(index) if index.len() == vectors.len() && index.dimension() == dim => index,
            Ok(stale) => {
                warn!(
                    "Index file reports {} items against {} stored vectors; rebuilding from vectors",
                    stale.len(),
                    vectors.len()
                );
                Self::rebuilt_index(dim, &vectors)
            }
            Err(e) => {
                if paths.index.exists() {
                    warn!("Index file unreadable ({}); rebuilding from vectors", e);
                }
                Self::rebuilt_index(dim, &vectors)
            }
        };

        let store = Self {
            dim,
            vectors,
            id_to_internal,
            internal_to_id,
            metadata,
            index,
            paths,
        };

        info!(
            "Opened store: dimension={} live={} slots={}",
            store.dim,
            store.live_count(),
            store.vectors.len()
        );
        Ok(store)
    }

    fn rebuilt_index(dim: usize, vectors: &[Vec<f32>]) -> FlatIndex {
        let mut index = FlatIndex::new(dim);
        index.rebuild(vectors);
        index
    }

    /// Insert a new entry or overwrite an existing one in place.
    ///
    /// Validation happens before any in-memory structure is touched. A
    /// provided metadata record replaces the stored one; an omitted record
    /// leaves the stored one untouched.
    pub fn add(&mut self, id: &str, vector: Vec<f32>, metadata: Option<Value>) -> StoreResult<AddOutcome> {
        self.validate_vector(&vector)?;

        let (action, internal_id) = match self.id_to_internal.get(id).copied() {
            Some(internal_id) => {
                self.vectors[internal_id as usize] = vector;
                (AddAction::Updated, internal_id)
            }
            None => {
                let internal_id = self.assign(id)?;
                self.vectors.push(vector);
                (AddAction::Added, internal_id)
            }
        };

        if let Some(record) = metadata {
            self.metadata.insert(internal_id, record);
        }

        self.rebuild_and_persist()?;

        info!(
            "{} vector id={} internal_id={} ntotal={}",
            match action {
                AddAction::Added => "Added",
                AddAction::Updated => "Updated",
            },
            id,
            internal_id,
            self.live_count()
        );

        Ok(AddOutcome {
            action,
            internal_id,
            ntotal: self.live_count(),
        })
    }

    /// Map a new original ID to the next sequential slot position.
    fn assign(&mut self, id: &str) -> StoreResult<u64> {
        if self.id_to_internal.contains_key(id) {
            return Err(StoreError::DuplicateId { id: id.to_string() });
        }
        let internal_id = self.vectors.len() as u64;
        self.id_to_internal.insert(id.to_string(), internal_id);
        self.internal_to_id.insert(internal_id, id.to_string());
        Ok(internal_id)
    }

    /// Top-k nearest neighbors by inner product, resolved to caller IDs.
    ///
    /// Dead slots stay in the index but have no reverse mapping, so they
    /// are filtered here along with sentinel positions. The index is
    /// over-queried by the number of dead slots so that filtering never
    /// starves the result list while live entries remain.
    pub fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<SearchHit>> {
        if self.live_count() == 0 {
            return Err(StoreError::EmptyIndex);
        }
        self.validate_vector(query)?;

        let fetch = k.saturating_add(self.deleted_slots());
        let hits = self.index.query(query, fetch)?;

        let mut results = Vec::with_capacity(k);
        for hit in hits {
            if hit.internal_id < 0 {
                continue;
            }
            let internal_id = hit.internal_id as u64;
            let Some(original_id) = self.internal_to_id.get(&internal_id) else {
                continue;
            };
            results.push(SearchHit {
                internal_id,
                distance: hit.score,
                original_id: original_id.clone(),
                metadata: self.metadata.get(&internal_id).cloned(),
            });
            if results.len() == k {
                break;
            }
        }

        Ok(results)
    }

    /// Point lookup by caller ID.
    pub fn get(&self, id: &str) -> StoreResult<EntryView> {
        let internal_id = self.resolve(id)?;
        Ok(EntryView {
            id: id.to_string(),
            internal_id,
            vector: Some(self.vectors[internal_id as usize].clone()),
            metadata: self.metadata.get(&internal_id).cloned(),
        })
    }

    /// Point lookup by raw slot position. Fails for slots that were never
    /// assigned and for slots holding a deleted entry.
    pub fn reconstruct(&self, internal_id: u64) -> StoreResult<EntryView> {
        let original_id = self
            .internal_to_id
            .get(&internal_id)
            .ok_or(StoreError::SlotNotFound { internal_id })?;
        Ok(EntryView {
            id: original_id.clone(),
            internal_id,
            vector: Some(self.vectors[internal_id as usize].clone()),
            metadata: self.metadata.get(&internal_id).cloned(),
        })
    }

    /// All live ID pairs, ordered by slot position.
    pub fn list(&self) -> Vec<ListEntry> {
        let mut entries: Vec<ListEntry> = self
            .internal_to_id
            .iter()
            .map(|(&internal_id, original_id)| ListEntry {
                original_id: original_id.clone(),
                internal_id,
            })
            .collect();
        entries.sort_by_key(|e| e.internal_id);
        entries
    }

    /// All live entries with metadata, optionally including raw vectors.
    pub fn entries(&self, with_vectors: bool) -> Vec<EntryView> {
        let mut entries: Vec<EntryView> = self
            .internal_to_id
            .iter()
            .map(|(&internal_id, original_id)| EntryView {
                id: original_id.clone(),
                internal_id,
                vector: with_vectors.then(|| self.vectors[internal_id as usize].clone()),
                metadata: self.metadata.get(&internal_id).cloned(),
            })
            .collect();
        entries.sort_by_key(|e| e.internal_id);
        entries
    }

    /// Logical delete: zero the slot, drop both map directions and the
    /// metadata record. The slot position is permanently retired.
    pub fn delete(&mut self, id: &str) -> StoreResult<u64> {
        let internal_id = self.resolve(id)?;

        self.vectors[internal_id as usize] = vec![0.0; self.dim];
        self.id_to_internal.remove(id);
        self.internal_to_id.remove(&internal_id);
        self.metadata.remove(&internal_id);

        self.rebuild_and_persist()?;

        info!(
            "Deleted vector id={} internal_id={} ntotal={}",
            id,
            internal_id,
            self.live_count()
        );
        Ok(internal_id)
    }

    /// Discard every entry and recreate empty persisted files.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.vectors.clear();
        self.id_to_internal.clear();
        self.internal_to_id.clear();
        self.metadata.clear();

        self.rebuild_and_persist()?;

        info!("Cleared store");
        Ok(())
    }

    fn resolve(&self, id: &str) -> StoreResult<u64> {
        self.id_to_internal
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn validate_vector(&self, vector: &[f32]) -> StoreResult<()> {
        if vector.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(StoreError::InvalidValue { position });
        }
        Ok(())
    }

    /// Rebuild the index over the full slot array, then persist all three
    /// files. Runs after every completed in-memory mutation, so a caller
    /// observing success is guaranteed index consistency and durability.
    fn rebuild_and_persist(&mut self) -> StoreResult<()> {
        self.index.rebuild(&self.vectors);

        persistence::save_vectors(&self.paths.vectors, self.dim, &self.vectors)?;
        persistence::save_state(
            &self.paths.state,
            &self.id_to_internal,
            &self.internal_to_id,
            &self.metadata,
        )?;
        persistence::save_index(&self.paths.index, &self.index)?;

        Ok(())
    }

    pub fn live_count(&self) -> usize {
        self.id_to_internal.len()
    }

    pub fn total_slots(&self) -> usize {
        self.vectors.len()
    }

    pub fn deleted_slots(&self) -> usize {
        self.vectors.len() - self.id_to_internal.len()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            dimension: self.dim,
            live_count: self.live_count(),
            total_slots: self.total_slots(),
            deleted_slots: self.deleted_slots(),
            index_items: self.index.len(),
        }
    }

    /// Full map dump for the debug endpoint.
    pub fn debug_maps(&self) -> (&HashMap<String, u64>, &HashMap<u64, String>, &HashMap<u64, Value>) {
        (&self.id_to_internal, &self.internal_to_id, &self.metadata)
    }
}
