//! Sorted staging of header names ahead of index construction.
//!
//! Layout of the single rented block, for `n` names:
//!
//! ```text
//! [slot 0 .. slot n-1]   ...free...   [record n-1] ... [record 1][record 0]
//!  u32 record offsets,                 records in input order, written
//!  kept in sorted order                from the far end toward the front
//! ```
//!
//! A record is `[len: u32][name bytes][ordinal: u32]`. Sorting is an insertion
//! sort driven by a binary search over the slots already placed, so staging
//! never allocates beyond the one block.

use crate::{
    error::{DynamicError, Result},
    packed::{self, U32},
    pool::{SharedPool, rent_at_least},
};

const SLOT_SIZE: usize = U32;

fn record_size(name_len: usize) -> usize {
    U32 + name_len + U32
}

pub struct OrderedNames {
    block: Vec<u8>,
    count: usize,
    pool: SharedPool,
}

impl OrderedNames {
    pub fn create<S: AsRef<str>>(names: &[S], pool: &SharedPool) -> Result<Self> {
        let required = names.iter().try_fold(names.len() * SLOT_SIZE, |acc, name| {
            acc.checked_add(record_size(name.as_ref().len()))
                .ok_or(DynamicError::capacity(usize::MAX, acc))
        })?;
        let block = rent_at_least(pool.as_ref(), required)?;
        let mut staged = OrderedNames {
            block,
            count: 0,
            pool: pool.clone(),
        };

        let mut tail = staged.block.len();
        for (ordinal, name) in names.iter().enumerate() {
            let name = name.as_ref().as_bytes();
            tail -= record_size(name.len());
            staged.write_record(tail, name, ordinal)?;

            let ix = staged.find_insertion_ix(name)?;
            let count = staged.count;
            staged
                .block
                .copy_within(ix * SLOT_SIZE..count * SLOT_SIZE, (ix + 1) * SLOT_SIZE);
            packed::write_u32(&mut staged.block, ix * SLOT_SIZE, packed::to_u32(tail)?)?;
            staged.count += 1;
        }
        Ok(staged)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The `i`th name in sorted order, with the ordinal it had in the input.
    pub fn get(&self, i: usize) -> Result<(&[u8], usize)> {
        if i >= self.count {
            return Err(DynamicError::OutOfRange {
                ordinal: i,
                width: self.count,
            });
        }
        let offset = packed::read_u32(&self.block, i * SLOT_SIZE)? as usize;
        let len = packed::read_u32(&self.block, offset)? as usize;
        let name = packed::read_bytes(&self.block, offset + U32, len)?;
        let ordinal = packed::read_u32(&self.block, offset + U32 + len)? as usize;
        Ok((name, ordinal))
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<(&[u8], usize)>> + '_ {
        (0..self.count).map(|i| self.get(i))
    }

    pub(crate) fn total_name_bytes(&self) -> Result<usize> {
        self.iter()
            .try_fold(0usize, |acc, entry| entry.map(|(name, _)| acc + name.len()))
    }

    fn write_record(&mut self, at: usize, name: &[u8], ordinal: usize) -> Result<()> {
        packed::write_u32(&mut self.block, at, packed::to_u32(name.len())?)?;
        packed::write_bytes(&mut self.block, at + U32, name)?;
        packed::write_u32(
            &mut self.block,
            at + U32 + name.len(),
            packed::to_u32(ordinal)?,
        )
    }

    fn find_insertion_ix(&self, name: &[u8]) -> Result<usize> {
        let mut lo = 0;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (existing, _) = self.get(mid)?;
            match name.cmp(existing) {
                std::cmp::Ordering::Less => hi = mid,
                std::cmp::Ordering::Greater => lo = mid + 1,
                std::cmp::Ordering::Equal => {
                    return Err(DynamicError::DuplicateKey {
                        name: String::from_utf8_lossy(name).into_owned(),
                    });
                }
            }
        }
        Ok(lo)
    }
}

impl Drop for OrderedNames {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.block));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pool::RecyclingPool;

    fn staged_names(staged: &OrderedNames) -> Vec<(String, usize)> {
        staged
            .iter()
            .map(|entry| {
                let (name, ordinal) = entry.unwrap();
                (String::from_utf8(name.to_vec()).unwrap(), ordinal)
            })
            .collect()
    }

    #[test]
    fn names_are_sorted_and_keep_their_ordinals() {
        let pool: SharedPool = Arc::new(RecyclingPool::new());
        let staged = OrderedNames::create(&["email", "id", "name", "", "ab"], &pool).unwrap();
        assert_eq!(
            staged_names(&staged),
            vec![
                ("".to_string(), 3),
                ("ab".to_string(), 4),
                ("email".to_string(), 0),
                ("id".to_string(), 1),
                ("name".to_string(), 2),
            ]
        );
        assert_eq!(staged.total_name_bytes().unwrap(), 13);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let pool: SharedPool = Arc::new(RecyclingPool::new());
        let err = OrderedNames::create(&["a", "b", "a"], &pool).err().unwrap();
        assert_eq!(
            err,
            DynamicError::DuplicateKey {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn block_returns_to_pool_on_drop() {
        let recycling = Arc::new(RecyclingPool::new());
        let pool: SharedPool = recycling.clone();
        let staged = OrderedNames::create(&["x", "y"], &pool).unwrap();
        assert_eq!(recycling.outstanding(), 1);
        drop(staged);
        assert_eq!(recycling.outstanding(), 0);
    }

    #[test]
    fn undersized_block_is_a_capacity_error() {
        let pool: SharedPool = Arc::new(RecyclingPool::with_max_block(8));
        let err = OrderedNames::create(&["alpha", "beta"], &pool).err().unwrap();
        assert!(matches!(err, DynamicError::CapacityExceeded { .. }));
    }
}
