//! Header names shared by every row read under the same header.
//!
//! A [`ColumnNames`] is built once per header and handed to rows behind an
//! `Arc`; each row holds a clone while it is live and drops it on dispose, so
//! the pooled index block is released when the last row lets go.

use std::sync::Arc;

use crate::{
    error::{DynamicError, Result},
    lookup::{LookupKind, LookupStrategy, NameLookup},
    pool::SharedPool,
};

#[derive(Debug)]
pub struct ColumnNames {
    names: Box<[String]>,
    lookup: NameLookup,
}

impl ColumnNames {
    pub fn create<S: AsRef<str>>(names: &[S], pool: &SharedPool) -> Result<Arc<Self>> {
        Self::create_with(names, pool, LookupStrategy::Adaptive)
    }

    pub fn create_with<S: AsRef<str>>(
        names: &[S],
        pool: &SharedPool,
        strategy: LookupStrategy,
    ) -> Result<Arc<Self>> {
        let lookup = NameLookup::create_with(names, pool, strategy)?;
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(Arc::new(ColumnNames { names, lookup }))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.names.get(ordinal).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn try_ordinal(&self, name: &str) -> Option<usize> {
        self.lookup.try_lookup(name)
    }

    pub fn ordinal_of(&self, name: &str) -> Result<usize> {
        self.try_ordinal(name)
            .ok_or_else(|| DynamicError::UnknownColumn {
                name: name.to_string(),
            })
    }

    pub fn lookup_kind(&self) -> LookupKind {
        self.lookup.kind()
    }

    pub fn lookup(&self) -> &NameLookup {
        &self.lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{RecyclingPool, SharedPool};

    #[test]
    fn last_holder_releases_the_index_block() {
        let recycling = Arc::new(RecyclingPool::new());
        let pool: SharedPool = recycling.clone();
        let header = ColumnNames::create(&["id", "name"], &pool).unwrap();
        let held_by_row = Arc::clone(&header);
        assert_eq!(Arc::strong_count(&header), 2);

        drop(header);
        assert_eq!(recycling.outstanding(), 1);
        assert_eq!(held_by_row.ordinal_of("name").unwrap(), 1);

        drop(held_by_row);
        assert_eq!(recycling.outstanding(), 0);
    }

    #[test]
    fn unknown_names_are_reported() {
        let header = ColumnNames::create(&["id"], &crate::pool::heap_pool()).unwrap();
        assert_eq!(header.name(0), Some("id"));
        assert_eq!(
            header.ordinal_of("missing").unwrap_err(),
            DynamicError::UnknownColumn {
                name: "missing".to_string()
            }
        );
    }
}
