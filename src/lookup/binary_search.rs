//! Sorted-array fallback for name sets the trie cannot encode.
//!
//! ```text
//! [count: u32] [offset: u32, ordinal: u32] * count  ...  [name n-1] ... [name 1][name 0]
//! ```
//!
//! Pairs are in name order. Names are packed back to front, so the length of
//! name `i` is the gap to the offset of name `i - 1`, or to the end of the
//! used region for name 0.

use crate::{
    error::Result,
    ordered_names::OrderedNames,
    packed::{self, U32},
    pool::{SharedPool, rent_at_least},
};

const PAIR_SIZE: usize = U32 + U32;

pub(crate) fn create(names: &OrderedNames, pool: &SharedPool) -> Result<(Vec<u8>, usize)> {
    let used = U32 + names.len() * PAIR_SIZE + names.total_name_bytes()?;
    let mut block = rent_at_least(pool.as_ref(), used)?;

    packed::write_u32(&mut block, 0, packed::to_u32(names.len())?)?;
    let mut string_at = used;
    for (i, entry) in names.iter().enumerate() {
        let (name, ordinal) = entry?;
        string_at -= name.len();
        packed::write_bytes(&mut block, string_at, name)?;
        let pair_at = U32 + i * PAIR_SIZE;
        packed::write_u32(&mut block, pair_at, packed::to_u32(string_at)?)?;
        packed::write_u32(&mut block, pair_at + U32, packed::to_u32(ordinal)?)?;
    }
    Ok((block, used))
}

/// `block` must be the used region only; its end bounds the first name.
pub(crate) fn lookup(block: &[u8], key: &[u8]) -> Result<Option<usize>> {
    let count = packed::read_u32(block, 0)? as usize;
    let mut lo = 0usize;
    let mut hi = count;
    while lo < hi {
        let pivot = lo + (hi - lo) / 2;
        let pair_at = U32 + pivot * PAIR_SIZE;
        let offset = packed::read_u32(block, pair_at)? as usize;
        let end = if pivot == 0 {
            block.len()
        } else {
            packed::read_u32(block, pair_at - PAIR_SIZE)? as usize
        };
        let candidate = packed::read_bytes(block, offset, end.saturating_sub(offset))?;
        match candidate.cmp(key) {
            std::cmp::Ordering::Equal => {
                return Ok(Some(packed::read_u32(block, pair_at + U32)? as usize));
            }
            std::cmp::Ordering::Less => lo = pivot + 1,
            std::cmp::Ordering::Greater => hi = pivot,
        }
    }
    Ok(None)
}
