//! Contiguous column sub-views of a row.

use std::ops::{Bound, RangeBounds};

use crate::{
    cell::DynamicCell,
    convert::{RowConverter, TypedRow},
    error::{DynamicError, Result},
    owner::RowOwner,
    row::{ColumnIdentifier, RowId, RowView},
};

/// Resolves `bounds` against `width`, yielding a half-open `(start, end)`.
pub(crate) fn resolve_bounds<B: RangeBounds<usize>>(bounds: &B, width: usize) -> Result<(usize, usize)> {
    let start = match bounds.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start + 1,
        Bound::Unbounded => 0,
    };
    let end = match bounds.end_bound() {
        Bound::Included(&end) => end + 1,
        Bound::Excluded(&end) => end,
        Bound::Unbounded => width,
    };
    if end > width {
        return Err(DynamicError::OutOfRange {
            ordinal: end.saturating_sub(1),
            width,
        });
    }
    if start > end {
        return Err(DynamicError::OutOfRange {
            ordinal: start,
            width: end,
        });
    }
    Ok((start, end))
}

/// Columns `[offset, offset + len)` of a row, addressed from zero. Copies no
/// text and, like a cell, goes stale when the row is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicRowRange {
    row: RowId,
    generation: u32,
    offset: usize,
    len: usize,
}

impl DynamicRowRange {
    pub(crate) fn new(row: RowId, generation: u32, offset: usize, len: usize) -> Self {
        DynamicRowRange {
            row,
            generation,
            offset,
            len,
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn view<'a>(&self, owner: &'a RowOwner) -> Result<RowView<'a>> {
        let row = owner.slot(self.row)?;
        row.check_generation(self.generation)?;
        row.view_of(self.offset, self.len)
    }

    pub fn get<'a>(&self, owner: &'a RowOwner, ordinal: usize) -> Result<Option<&'a str>> {
        self.view(owner)?.text(ordinal)
    }

    /// Text of a named column, which must fall inside the range.
    pub fn get_by_name<'a>(&self, owner: &'a RowOwner, name: &str) -> Result<Option<&'a str>> {
        self.view(owner)?.text_by_name(name)
    }

    pub fn ordinal_of(&self, owner: &RowOwner, name: &str) -> Result<usize> {
        self.view(owner)?.ordinal_of(name)
    }

    pub fn cell(&self, ordinal: usize) -> Result<DynamicCell> {
        if ordinal >= self.len {
            return Err(DynamicError::OutOfRange {
                ordinal,
                width: self.len,
            });
        }
        Ok(DynamicCell::new(self.row, self.generation, self.offset + ordinal))
    }

    /// The range's columns renumbered from zero, keeping the parent's names.
    pub fn columns<'a>(&self, owner: &'a RowOwner) -> Result<Vec<ColumnIdentifier<'a>>> {
        self.view(owner)?.columns()
    }

    /// A range relative to this one.
    pub fn range<B: RangeBounds<usize>>(&self, bounds: B) -> Result<DynamicRowRange> {
        let (start, end) = resolve_bounds(&bounds, self.len)?;
        Ok(DynamicRowRange::new(
            self.row,
            self.generation,
            self.offset + start,
            end - start,
        ))
    }

    pub fn convert(&self, owner: &RowOwner, converter: &RowConverter) -> Result<TypedRow> {
        self.view(owner)?.convert(converter)
    }
}
