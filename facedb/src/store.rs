use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::FaceSample;
use crate::FaceDbError;

/// A named person and every face filed under that name, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub samples: Vec<FaceSample>,
}

/// The authoritative collection of known faces.
///
/// Identities keep their insertion order; `index` maps each name to its
/// position in `identities` and must always cover exactly the same names.
/// The store has no notion of the centroid cache: [`crate::FaceDb`] marks the
/// cache dirty around every mutating call.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    identities: Vec<Identity>,
    index: HashMap<String, usize>,
}

impl EmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from identities read back from disk.
    /// Duplicate names are rejected rather than silently merged.
    pub fn from_identities(identities: Vec<Identity>) -> Result<Self, FaceDbError> {
        let mut index = HashMap::with_capacity(identities.len());
        for (pos, ident) in identities.iter().enumerate() {
            if index.insert(ident.name.clone(), pos).is_some() {
                return Err(FaceDbError::InconsistentState(format!(
                    "duplicate identity {:?}",
                    ident.name
                )));
            }
        }
        let mut store = Self { identities, index };
        for ident in &mut store.identities {
            for s in &mut ident.samples {
                s.name.clone_from(&ident.name);
            }
        }
        Ok(store)
    }

    /// Appends `sample` under `name`, creating the identity when absent.
    /// The empty name is an identity like any other.
    pub fn add(&mut self, name: &str, mut sample: FaceSample) {
        sample.name = name.to_string();
        match self.index.get(name) {
            Some(&pos) => self.identities[pos].samples.push(sample),
            None => {
                self.index.insert(name.to_string(), self.identities.len());
                self.identities.push(Identity {
                    name: name.to_string(),
                    samples: vec![sample],
                });
            }
        }
        self.assert_consistent();
    }

    /// Relabels `old` as `new`. When `new` already exists the two sample
    /// lists are merged: `old`'s samples are appended to `new`'s and `old`
    /// disappears. Returns false when nothing changed.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return false;
        }
        let Some(&old_pos) = self.index.get(old) else {
            return false;
        };

        match self.index.get(new).copied() {
            None => {
                debug!(old, new, "facedb: renaming identity");
                let ident = &mut self.identities[old_pos];
                ident.name = new.to_string();
                for s in &mut ident.samples {
                    s.name = new.to_string();
                }
                self.index.remove(old);
                self.index.insert(new.to_string(), old_pos);
            }
            Some(_) => {
                let moved = self.remove_at(old_pos);
                debug!(
                    old,
                    new,
                    moved = moved.samples.len(),
                    "facedb: merging identity into existing name"
                );
                // Positions shifted after removal; look the target up again.
                let new_pos = self.index[new];
                let target = &mut self.identities[new_pos];
                target.samples.extend(moved.samples.into_iter().map(|mut s| {
                    s.name = new.to_string();
                    s
                }));
            }
        }
        self.assert_consistent();
        true
    }

    /// Removes `name` and all of its samples. Returns false if it was absent.
    pub fn delete_identity(&mut self, name: &str) -> bool {
        let Some(&pos) = self.index.get(name) else {
            return false;
        };
        let removed = self.remove_at(pos);
        debug!(name, samples = removed.samples.len(), "facedb: deleted identity");
        self.assert_consistent();
        true
    }

    /// Identity names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.identities.iter().map(|i| i.name.clone()).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.identities.iter().map(|i| i.samples.len()).sum()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Samples filed under `name`, or an empty slice.
    pub fn samples_for(&self, name: &str) -> &[FaceSample] {
        match self.index.get(name) {
            Some(&pos) => &self.identities[pos].samples,
            None => &[],
        }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Checks that the name index and the identity list agree.
    pub fn verify(&self) -> Result<(), FaceDbError> {
        if self.index.len() != self.identities.len() {
            return Err(FaceDbError::InconsistentState(format!(
                "{} identities but {} indexed names",
                self.identities.len(),
                self.index.len()
            )));
        }
        for (pos, ident) in self.identities.iter().enumerate() {
            if self.index.get(&ident.name) != Some(&pos) {
                return Err(FaceDbError::InconsistentState(format!(
                    "identity {:?} not indexed at {pos}",
                    ident.name
                )));
            }
        }
        Ok(())
    }

    fn remove_at(&mut self, pos: usize) -> Identity {
        let removed = self.identities.remove(pos);
        self.index.remove(&removed.name);
        for (i, ident) in self.identities.iter().enumerate().skip(pos) {
            if let Some(slot) = self.index.get_mut(&ident.name) {
                *slot = i;
            }
        }
        removed
    }

    fn assert_consistent(&self) {
        assert_eq!(
            self.index.len(),
            self.identities.len(),
            "facedb: name index and identity list diverged"
        );
    }
}
