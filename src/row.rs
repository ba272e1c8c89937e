//! Reusable packed storage for one untyped record.
//!
//! A live row owns at most one pooled block laid out as
//!
//! ```text
//! [slot 0][slot 1]..[slot width-1]  ...free...  [len][text] .. [len][text]
//!  u32 each: 0 = unset,                          payloads written back to
//!  otherwise payload offset + 1                  front from the block end
//! ```
//!
//! The block is rented lazily on the first [`DynamicRow::set_value`]. When a
//! payload would run into the slot region the block is swapped for a larger
//! one and every stored offset is shifted by the size difference. Overwriting
//! a cell writes a fresh payload; the old one stays in the block, unreachable,
//! until the row is disposed.
//!
//! Every [`init`](DynamicRow::init) bumps the row's generation. Handles
//! ([`DynamicCell`], [`DynamicRowRange`]) capture the generation they were
//! created under and refuse to read once it has moved on.

use std::{ops::RangeBounds, sync::Arc};

use log::trace;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    cell::DynamicCell,
    convert::{ReadContext, RowConverter, TypeDescriber, TypedRow},
    error::{DynamicError, Result},
    names::ColumnNames,
    owner::{OwnerContext, UserContext},
    packed::{self, U32},
    pool::{SharedPool, rent_at_least},
    range::{DynamicRowRange, resolve_bounds},
};

const SLOT_SIZE: usize = U32;

/// Position of a row inside its [`RowOwner`](crate::owner::RowOwner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub(crate) usize);

impl RowId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A column as seen through a row or range: its ordinal there and, when the
/// header was captured, its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIdentifier<'a> {
    pub ordinal: usize,
    pub name: Option<&'a str>,
}

impl ColumnIdentifier<'_> {
    pub fn label(&self) -> String {
        match self.name {
            Some(name) => name.to_string(),
            None => format!("#{}", self.ordinal),
        }
    }
}

pub struct DynamicRow {
    id: RowId,
    generation: u32,
    live: bool,
    row_number: usize,
    width: usize,
    names: Option<Arc<ColumnNames>>,
    describer: Option<Arc<TypeDescriber>>,
    context: Option<UserContext>,
    pool: Option<SharedPool>,
    data: Option<Vec<u8>>,
    write_cursor: usize,
    pub(crate) tracked_generation: Option<u32>,
    pub(crate) next_tracked: Option<RowId>,
}

impl DynamicRow {
    /// A row in the disposed state, ready for its first `init`.
    pub(crate) fn new(id: RowId) -> Self {
        DynamicRow {
            id,
            generation: 0,
            live: false,
            row_number: 0,
            width: 0,
            names: None,
            describer: None,
            context: None,
            pool: None,
            data: None,
            write_cursor: 0,
            tracked_generation: None,
            next_tracked: None,
        }
    }

    pub(crate) fn init(
        &mut self,
        owner: &OwnerContext,
        row_number: usize,
        width: usize,
        names: Option<Arc<ColumnNames>>,
    ) -> Result<()> {
        if self.live {
            return Err(DynamicError::AlreadyInitialized);
        }
        // wraps after u32::MAX reuses of one slot
        self.generation = self.generation.wrapping_add(1);
        self.live = true;
        self.row_number = row_number;
        self.width = width;
        self.names = names;
        self.describer = Some(owner.describer().clone());
        self.context = owner.user_context().cloned();
        self.pool = Some(owner.pool().clone());
        self.data = None;
        self.write_cursor = 0;
        Ok(())
    }

    /// Returns the block to the pool and drops the shared header. Idempotent.
    pub(crate) fn dispose(&mut self) {
        if !self.live {
            return;
        }
        if let (Some(block), Some(pool)) = (self.data.take(), self.pool.as_ref()) {
            pool.give_back(block);
        }
        self.live = false;
        self.names = None;
        self.describer = None;
        self.context = None;
        self.pool = None;
        self.write_cursor = 0;
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_disposed(&self) -> bool {
        !self.live
    }

    pub fn row_number(&self) -> usize {
        self.row_number
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn names(&self) -> Option<&Arc<ColumnNames>> {
        self.names.as_ref()
    }

    pub fn user_context(&self) -> Option<&UserContext> {
        self.context.as_ref()
    }

    pub(crate) fn describer(&self) -> Result<&TypeDescriber> {
        self.describer.as_deref().ok_or(DynamicError::Disposed)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.live {
            Ok(())
        } else {
            Err(DynamicError::Disposed)
        }
    }

    /// Fails unless the row is live and still at `generation`.
    pub(crate) fn check_generation(&self, generation: u32) -> Result<()> {
        if self.generation != generation {
            return Err(DynamicError::StaleHandle {
                captured: generation,
                current: self.generation,
            });
        }
        self.ensure_live()
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        if ordinal < self.width {
            Ok(())
        } else {
            Err(DynamicError::OutOfRange {
                ordinal,
                width: self.width,
            })
        }
    }

    fn index_region_end(&self) -> usize {
        self.width * SLOT_SIZE
    }

    pub fn set_value(&mut self, ordinal: usize, text: &str) -> Result<()> {
        self.ensure_live()?;
        self.check_ordinal(ordinal)?;

        let payload_size = U32 + text.len();
        if self.data.is_none() {
            self.rent_initial(payload_size)?;
        }
        let index_end = self.index_region_end();
        let fits = self
            .write_cursor
            .checked_sub(payload_size)
            .is_some_and(|at| at >= index_end);
        if !fits {
            self.resize_data(payload_size)?;
        }

        let at = self.write_cursor - payload_size;
        let data = self.data.as_mut().ok_or(DynamicError::Disposed)?;
        packed::write_u32(data, at, packed::to_u32(text.len())?)?;
        packed::write_bytes(data, at + U32, text.as_bytes())?;
        packed::write_u32(data, ordinal * SLOT_SIZE, packed::to_u32(at + 1)?)?;
        self.write_cursor = at;
        Ok(())
    }

    fn pool(&self) -> Result<&SharedPool> {
        self.pool.as_ref().ok_or(DynamicError::Disposed)
    }

    fn rent_initial(&mut self, payload_size: usize) -> Result<()> {
        let index_end = self.index_region_end();
        let mut block = rent_at_least(self.pool()?.as_ref(), index_end + payload_size)?;
        block[..index_end].fill(0);
        self.write_cursor = block.len();
        self.data = Some(block);
        Ok(())
    }

    /// Moves the payloads into a block just large enough for `payload_size` more
    /// bytes, translating every stored offset by the growth.
    fn resize_data(&mut self, payload_size: usize) -> Result<()> {
        let index_end = self.index_region_end();
        let pool = self.pool()?.clone();
        let old = self.data.take().ok_or(DynamicError::Disposed)?;
        let old_size = old.len();
        let shortfall = (index_end + payload_size).saturating_sub(self.write_cursor);
        let mut grown = match rent_at_least(pool.as_ref(), old_size + shortfall) {
            Ok(block) => block,
            Err(err) => {
                self.data = Some(old);
                return Err(err);
            }
        };
        let delta = grown.len() - old_size;
        trace!(
            "Row {} growing from {old_size} to {} byte(s)",
            self.row_number,
            grown.len()
        );

        grown[..index_end].fill(0);
        for ordinal in 0..self.width {
            let at = ordinal * SLOT_SIZE;
            let stored = packed::read_u32(&old, at)?;
            if stored != 0 {
                let moved = packed::to_u32(stored as usize + delta)?;
                packed::write_u32(&mut grown, at, moved)?;
            }
        }
        grown[self.write_cursor + delta..].copy_from_slice(&old[self.write_cursor..]);
        self.write_cursor += delta;
        pool.give_back(old);
        self.data = Some(grown);
        Ok(())
    }

    fn payload_offset(&self, ordinal: usize) -> Result<Option<usize>> {
        self.ensure_live()?;
        self.check_ordinal(ordinal)?;
        let Some(data) = self.data.as_ref() else {
            return Ok(None);
        };
        let stored = packed::read_u32(data, ordinal * SLOT_SIZE)? as usize;
        Ok(stored.checked_sub(1))
    }

    pub fn is_set(&self, ordinal: usize) -> Result<bool> {
        Ok(self.payload_offset(ordinal)?.is_some())
    }

    /// The exact text last stored for `ordinal`, or `None` when the cell was never set.
    pub fn data_span(&self, ordinal: usize) -> Result<Option<&str>> {
        let (Some(offset), Some(data)) = (self.payload_offset(ordinal)?, self.data.as_ref()) else {
            return Ok(None);
        };
        let len = packed::read_u32(data, offset)? as usize;
        let bytes = packed::read_bytes(data, offset + U32, len)?;
        std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|_| DynamicError::Corrupt { offset })
    }

    pub fn ordinal_of(&self, name: &str) -> Result<usize> {
        self.ensure_live()?;
        match &self.names {
            Some(names) => names.ordinal_of(name),
            None => Err(DynamicError::UnknownColumn {
                name: name.to_string(),
            }),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<&str>> {
        self.data_span(self.ordinal_of(name)?)
    }

    pub fn column(&self, ordinal: usize) -> Result<ColumnIdentifier<'_>> {
        self.ensure_live()?;
        self.check_ordinal(ordinal)?;
        Ok(ColumnIdentifier {
            ordinal,
            name: self.names.as_ref().and_then(|names| names.name(ordinal)),
        })
    }

    pub fn columns(&self) -> Result<Vec<ColumnIdentifier<'_>>> {
        (0..self.width).map(|ordinal| self.column(ordinal)).collect()
    }

    pub fn cell(&self, ordinal: usize) -> Result<DynamicCell> {
        self.ensure_live()?;
        self.check_ordinal(ordinal)?;
        Ok(DynamicCell::new(self.id, self.generation, ordinal))
    }

    pub fn cell_by_name(&self, name: &str) -> Result<DynamicCell> {
        self.cell(self.ordinal_of(name)?)
    }

    pub fn range<B: RangeBounds<usize>>(&self, bounds: B) -> Result<DynamicRowRange> {
        self.ensure_live()?;
        let (start, end) = resolve_bounds(&bounds, self.width)?;
        Ok(DynamicRowRange::new(
            self.id,
            self.generation,
            start,
            end - start,
        ))
    }

    pub fn view(&self) -> Result<RowView<'_>> {
        self.ensure_live()?;
        Ok(RowView {
            row: self,
            offset: 0,
            len: self.width,
        })
    }

    pub(crate) fn view_of(&self, offset: usize, len: usize) -> Result<RowView<'_>> {
        self.ensure_live()?;
        Ok(RowView {
            row: self,
            offset,
            len,
        })
    }

    pub fn read_context(&self, ordinal: Option<usize>) -> Result<ReadContext<'_>> {
        let column = ordinal.map(|ordinal| self.column(ordinal)).transpose()?;
        self.ensure_live()?;
        Ok(ReadContext {
            row_number: self.row_number,
            column,
            context: self.context.as_ref(),
        })
    }

    /// Converts the whole row with `converter`.
    pub fn convert(&self, converter: &RowConverter) -> Result<TypedRow> {
        self.view()?.convert(converter)
    }

    /// Converts the whole row with the row converter its describer supplies.
    pub fn convert_default(&self) -> Result<TypedRow> {
        let converter = self.describer()?.row_converter().clone();
        self.convert(&converter)
    }
}

impl Drop for DynamicRow {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for DynamicRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRow")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("live", &self.live)
            .field("row_number", &self.row_number)
            .field("width", &self.width)
            .field("block", &self.data.as_ref().map(Vec::len))
            .field("write_cursor", &self.write_cursor)
            .finish()
    }
}

/// Rows serialize as a map of column label to text, unset cells as `null`.
impl Serialize for DynamicRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.view()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Borrowed view of a contiguous run of a row's columns, renumbered from zero.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    row: &'a DynamicRow,
    offset: usize,
    len: usize,
}

impl<'a> RowView<'a> {
    pub fn width(&self) -> usize {
        self.len
    }

    pub fn row_number(&self) -> usize {
        self.row.row_number
    }

    fn absolute(&self, ordinal: usize) -> Result<usize> {
        if ordinal < self.len {
            Ok(self.offset + ordinal)
        } else {
            Err(DynamicError::OutOfRange {
                ordinal,
                width: self.len,
            })
        }
    }

    pub fn text(&self, ordinal: usize) -> Result<Option<&'a str>> {
        self.row.data_span(self.absolute(ordinal)?)
    }

    /// Resolves `name` to an ordinal within this view.
    pub fn ordinal_of(&self, name: &str) -> Result<usize> {
        let absolute = self.row.ordinal_of(name)?;
        absolute
            .checked_sub(self.offset)
            .filter(|relative| *relative < self.len)
            .ok_or_else(|| DynamicError::UnknownColumn {
                name: name.to_string(),
            })
    }

    pub fn text_by_name(&self, name: &str) -> Result<Option<&'a str>> {
        self.text(self.ordinal_of(name)?)
    }

    pub fn column(&self, ordinal: usize) -> Result<ColumnIdentifier<'a>> {
        let parent = self.row.column(self.absolute(ordinal)?)?;
        Ok(ColumnIdentifier {
            ordinal,
            name: parent.name,
        })
    }

    pub fn columns(&self) -> Result<Vec<ColumnIdentifier<'a>>> {
        (0..self.len).map(|ordinal| self.column(ordinal)).collect()
    }

    pub fn read_context(&self, ordinal: Option<usize>) -> Result<ReadContext<'a>> {
        let column = ordinal.map(|ordinal| self.column(ordinal)).transpose()?;
        Ok(ReadContext {
            row_number: self.row.row_number,
            column,
            context: self.row.context.as_ref(),
        })
    }

    pub fn convert(&self, converter: &RowConverter) -> Result<TypedRow> {
        converter.convert(self, &self.read_context(None)?)
    }

    pub fn texts(&self) -> Result<Vec<Option<&'a str>>> {
        (0..self.len).map(|ordinal| self.text(ordinal)).collect()
    }
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let columns = self.columns().map_err(serde::ser::Error::custom)?;
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for column in columns {
            let text = self
                .text(column.ordinal)
                .map_err(serde::ser::Error::custom)?;
            map.serialize_entry(&column.label(), &text)?;
        }
        map.end()
    }
}
