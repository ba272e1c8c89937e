//! Adaptive prefix trie packed into one byte block.
//!
//! ```text
//! group := [count: u16] entry*count
//! entry := [len: u16] [prefix bytes: len] [slot: u16]
//! ```
//!
//! Entries within a group are sorted and have distinct first bytes (an empty
//! prefix, when present, comes first). A slot is a [`TrieSlot`]: either the
//! ordinal of the name that ends at this prefix, or the forward distance from
//! the slot to the nested group holding every name that continues past it.

use log::trace;

use crate::{
    error::{DynamicError, Result},
    ordered_names::OrderedNames,
    packed::{self, U16},
    pool::{SharedPool, rent_at_least},
};

/// Largest ordinal or jump distance a slot can carry.
pub(crate) const MAX_SLOT: usize = i16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrieSlot {
    Value(u16),
    Jump(u16),
}

impl TrieSlot {
    /// Values are stored as non-negative `i16`, jumps as the negated distance.
    fn encode(self) -> u16 {
        let signed = match self {
            TrieSlot::Value(ordinal) => ordinal as i16,
            TrieSlot::Jump(distance) => -(distance as i16),
        };
        u16::from_le_bytes(signed.to_le_bytes())
    }

    fn decode(raw: u16) -> Self {
        match i16::from_le_bytes(raw.to_le_bytes()) {
            value @ 0.. => TrieSlot::Value(value as u16),
            offset => TrieSlot::Jump(offset.unsigned_abs()),
        }
    }

    fn jump(distance: usize) -> Option<Self> {
        (1..=MAX_SLOT)
            .contains(&distance)
            .then(|| TrieSlot::Jump(distance as u16))
    }
}

/// One entry of a prefix group: names `[lo, hi)` of the staging buffer share `prefix`.
struct Entry<'a> {
    lo: usize,
    hi: usize,
    prefix: &'a [u8],
    ordinal: usize,
}

impl Entry<'_> {
    fn is_leaf(&self) -> bool {
        self.hi - self.lo == 1
    }
}

fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Splits the names `[lo, hi)`, all sharing their first `depth` bytes, into entries
/// keyed by the next byte.
fn partition<'a>(
    names: &'a OrderedNames,
    lo: usize,
    hi: usize,
    depth: usize,
) -> Result<Vec<Entry<'a>>> {
    let mut entries = Vec::new();
    let mut i = lo;
    while i < hi {
        let (first, ordinal) = names.get(i)?;
        let rest = &first[depth..];
        let mut j = i + 1;
        while j < hi {
            let (next, _) = names.get(j)?;
            if rest.is_empty() || next[depth..].first() != rest.first() {
                break;
            }
            j += 1;
        }
        let prefix = if j - i == 1 {
            rest
        } else {
            let (last, _) = names.get(j - 1)?;
            &rest[..common_prefix_length(rest, &last[depth..])]
        };
        entries.push(Entry {
            lo: i,
            hi: j,
            prefix,
            ordinal,
        });
        i = j;
    }
    Ok(entries)
}

/// Total encoded size, or `None` when a group count or prefix length does not fit 16 bits.
fn encoded_size(names: &OrderedNames) -> Result<Option<usize>> {
    let mut size = 0usize;
    let mut pending = vec![(0, names.len(), 0)];
    while let Some((lo, hi, depth)) = pending.pop() {
        let entries = partition(names, lo, hi, depth)?;
        if entries.len() > u16::MAX as usize {
            return Ok(None);
        }
        size += U16;
        for entry in entries {
            if entry.prefix.len() > u16::MAX as usize {
                return Ok(None);
            }
            if !entry.is_leaf() {
                pending.push((entry.lo, entry.hi, depth + entry.prefix.len()));
            }
            size += U16 + entry.prefix.len() + U16;
        }
    }
    Ok(Some(size))
}

/// Builds the trie, returning the block and the number of bytes used, or `None`
/// when the names cannot be encoded in 16-bit fields or the pool is too small.
///
/// Every ordinal fits a value slot once the name count is checked, so only
/// jump distances can overflow while writing.
pub(crate) fn try_create(
    names: &OrderedNames,
    pool: &SharedPool,
) -> Result<Option<(Vec<u8>, usize)>> {
    if names.len() > MAX_SLOT + 1 {
        trace!("{} names exceed trie ordinal range", names.len());
        return Ok(None);
    }
    let Some(size) = encoded_size(names)? else {
        return Ok(None);
    };
    let mut block = match rent_at_least(pool.as_ref(), size) {
        Ok(block) => block,
        Err(DynamicError::CapacityExceeded { .. }) => return Ok(None),
        Err(other) => return Err(other),
    };
    match write_groups(names, &mut block)? {
        Some(used) => Ok(Some((block, used))),
        None => {
            pool.give_back(block);
            Ok(None)
        }
    }
}

fn write_groups(names: &OrderedNames, block: &mut [u8]) -> Result<Option<usize>> {
    let mut cursor = 0usize;
    // (lo, hi, depth, slot of the parent entry that jumps here)
    let mut pending: Vec<(usize, usize, usize, Option<usize>)> = vec![(0, names.len(), 0, None)];
    while let Some((lo, hi, depth, parent_slot)) = pending.pop() {
        let start = cursor;
        if let Some(slot_at) = parent_slot {
            let Some(jump) = TrieSlot::jump(start - slot_at) else {
                trace!("Trie jump of {} byte(s) overflows", start - slot_at);
                return Ok(None);
            };
            packed::write_u16(block, slot_at, jump.encode())?;
        }

        let entries = partition(names, lo, hi, depth)?;
        packed::write_u16(block, start, entries.len() as u16)?;
        cursor += U16;
        for entry in entries {
            packed::write_u16(block, cursor, entry.prefix.len() as u16)?;
            packed::write_bytes(block, cursor + U16, entry.prefix)?;
            let slot_at = cursor + U16 + entry.prefix.len();
            if entry.is_leaf() {
                let value = TrieSlot::Value(entry.ordinal as u16);
                packed::write_u16(block, slot_at, value.encode())?;
            } else {
                pending.push((
                    entry.lo,
                    entry.hi,
                    depth + entry.prefix.len(),
                    Some(slot_at),
                ));
            }
            cursor = slot_at + U16;
        }
    }
    Ok(Some(cursor))
}

pub(crate) fn lookup(block: &[u8], key: &[u8]) -> Result<Option<usize>> {
    let mut at = 0usize;
    let mut key = key;
    'groups: loop {
        let count = packed::read_u16(block, at)?;
        at += U16;
        for _ in 0..count {
            let len = packed::read_u16(block, at)? as usize;
            let prefix = packed::read_bytes(block, at + U16, len)?;
            let slot_at = at + U16 + len;
            at = slot_at + U16;

            if prefix.is_empty() {
                if key.is_empty() {
                    return match TrieSlot::decode(packed::read_u16(block, slot_at)?) {
                        TrieSlot::Value(ordinal) => Ok(Some(ordinal as usize)),
                        TrieSlot::Jump(_) => Err(DynamicError::Corrupt { offset: slot_at }),
                    };
                }
                continue;
            }
            if key.starts_with(prefix) {
                match TrieSlot::decode(packed::read_u16(block, slot_at)?) {
                    TrieSlot::Value(ordinal) => {
                        return Ok((key.len() == len).then_some(ordinal as usize));
                    }
                    TrieSlot::Jump(distance) => {
                        key = &key[len..];
                        at = slot_at + distance as usize;
                        continue 'groups;
                    }
                }
            }
            if prefix > key {
                return Ok(None);
            }
        }
        return Ok(None);
    }
}
