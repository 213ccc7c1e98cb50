//! In-memory fact store.
//!
//! Facts are kept per claim name as an ordered list of argument tuples, plus an
//! equality index per (name, position, primitive value). The store is built
//! fresh for every tick and has no deletion API.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::claim::Claim;
use crate::error::ValidationError;
use crate::value::{IndexKey, Value};

/// The constant arguments of one stored fact.
///
/// Tuples are shared between the name list and every index bucket they appear in.
pub type Tuple = Arc<[Value]>;

type PositionIndex = HashMap<usize, HashMap<IndexKey, Vec<Tuple>>>;

/// Ground-fact storage with per-position equality indexes.
///
/// Invariant: every tuple in an index bucket also appears in the name list.
#[derive(Debug, Default, Clone)]
pub struct FactStore {
    claims: HashMap<String, Vec<Tuple>>,
    index: HashMap<String, PositionIndex>,
    len: usize,
}

impl FactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a ground fact, rejecting claims with variable arguments.
    pub fn try_insert(&mut self, claim: &Claim) -> Result<(), ValidationError> {
        if claim.name.is_empty() {
            return Err(ValidationError::EmptyClaimName);
        }

        let values = claim.values().ok_or_else(|| ValidationError::VariableInFact {
            name: claim.name.clone(),
            count: claim.variable_count(),
        })?;

        let tuple: Tuple = values.into();
        let by_position = self.index.entry(claim.name.clone()).or_default();
        for (position, value) in tuple.iter().enumerate() {
            // structured payloads are stored but never indexed
            let Some(key) = value.index_key() else {
                continue;
            };
            by_position
                .entry(position)
                .or_default()
                .entry(key)
                .or_default()
                .push(Arc::clone(&tuple));
        }

        self.claims.entry(claim.name.clone()).or_default().push(tuple);
        self.len += 1;
        Ok(())
    }

    /// Stores a ground fact; malformed facts are logged and dropped.
    ///
    /// Returns whether the fact was stored.
    pub fn insert(&mut self, claim: &Claim) -> bool {
        match self.try_insert(claim) {
            Ok(()) => true,
            Err(err) => {
                warn!(claim = %claim, source = %claim.source, error = %err, "skipping malformed claim");
                false
            }
        }
    }

    /// All tuples stored under `name`, in insertion order.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> &[Tuple] {
        self.claims.get(name).map_or(&[], Vec::as_slice)
    }

    /// Tuples stored under `name` whose argument at `position` equals `value`.
    ///
    /// Values without an index key (structured payloads, `NaN`) find nothing.
    #[must_use]
    pub fn lookup_by_index(&self, name: &str, position: usize, value: &Value) -> &[Tuple] {
        let Some(key) = value.index_key() else {
            return &[];
        };
        self.index
            .get(name)
            .and_then(|by_position| by_position.get(&position))
            .and_then(|by_value| by_value.get(&key))
            .map_or(&[], Vec::as_slice)
    }

    /// True when a fact with exactly these argument values is stored.
    #[must_use]
    pub fn contains(&self, name: &str, values: &[Value]) -> bool {
        let candidates = values
            .iter()
            .enumerate()
            .find(|(_, v)| v.index_key().is_some())
            .map_or_else(
                || self.lookup_by_name(name),
                |(position, v)| self.lookup_by_index(name, position, v),
            );
        candidates.iter().any(|t| t.as_ref() == values)
    }

    /// True when the ground claim is already stored.
    #[must_use]
    pub fn contains_claim(&self, claim: &Claim) -> bool {
        claim
            .values()
            .is_some_and(|values| self.contains(&claim.name, &values))
    }

    /// Claim names with at least one stored fact.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    /// Total number of stored facts.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
