//! Column name to ordinal index, built once per header.
//!
//! [`NameLookup::create`] stages the names in sorted order and tries to pack
//! them into an adaptive prefix trie. Name sets whose ordinals, lengths, or
//! jump distances do not fit 16-bit fields (or whose trie the pool cannot
//! hold) silently fall back to a packed sorted array searched by bisection.
//! Either way the index is one pooled block and lookups never allocate.

mod binary_search;
mod trie;

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    ordered_names::OrderedNames,
    pool::SharedPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupKind {
    AdaptiveRadixTrie,
    BinarySearch,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::AdaptiveRadixTrie => write!(f, "adaptive-radix-trie"),
            LookupKind::BinarySearch => write!(f, "binary-search"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupStrategy {
    /// Trie when it fits, binary search otherwise.
    #[default]
    Adaptive,
    BinarySearch,
}

pub struct NameLookup {
    kind: LookupKind,
    block: Vec<u8>,
    used: usize,
    len: usize,
    pool: SharedPool,
}

impl NameLookup {
    pub fn create<S: AsRef<str>>(names: &[S], pool: &SharedPool) -> Result<Self> {
        Self::create_with(names, pool, LookupStrategy::Adaptive)
    }

    pub fn create_with<S: AsRef<str>>(
        names: &[S],
        pool: &SharedPool,
        strategy: LookupStrategy,
    ) -> Result<Self> {
        let staged = OrderedNames::create(names, pool)?;

        if strategy == LookupStrategy::Adaptive {
            if let Some((block, used)) = trie::try_create(&staged, pool)? {
                debug!(
                    "Built {} for {} name(s) in {used} byte(s)",
                    LookupKind::AdaptiveRadixTrie,
                    staged.len()
                );
                return Ok(Self::from_block(
                    LookupKind::AdaptiveRadixTrie,
                    block,
                    used,
                    staged.len(),
                    pool,
                ));
            }
            debug!(
                "Trie cannot encode {} name(s); falling back to binary search",
                staged.len()
            );
        }

        let (block, used) = binary_search::create(&staged, pool)?;
        debug!(
            "Built {} for {} name(s) in {used} byte(s)",
            LookupKind::BinarySearch,
            staged.len()
        );
        Ok(Self::from_block(
            LookupKind::BinarySearch,
            block,
            used,
            staged.len(),
            pool,
        ))
    }

    fn from_block(
        kind: LookupKind,
        block: Vec<u8>,
        used: usize,
        len: usize,
        pool: &SharedPool,
    ) -> Self {
        NameLookup {
            kind,
            block,
            used,
            len,
            pool: pool.clone(),
        }
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    /// Number of names indexed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of the pooled block holding the encoded index.
    pub fn encoded_len(&self) -> usize {
        self.used
    }

    pub fn try_lookup(&self, key: &str) -> Option<usize> {
        let region = &self.block[..self.used];
        let found = match self.kind {
            LookupKind::AdaptiveRadixTrie => trie::lookup(region, key.as_bytes()),
            LookupKind::BinarySearch => binary_search::lookup(region, key.as_bytes()),
        };
        found.unwrap_or_else(|err| {
            warn!("Name index lookup for '{key}' failed: {err}");
            debug_assert!(false, "corrupt name index: {err}");
            None
        })
    }
}

impl fmt::Debug for NameLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameLookup")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("encoded_len", &self.used)
            .finish()
    }
}

impl Drop for NameLookup {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.block));
    }
}
