//! The reader-side owner of a set of reusable rows.
//!
//! A [`RowOwner`] is an arena of [`DynamicRow`] slots. Handles never hold a
//! reference to a row, only its [`RowId`] and the generation it was created
//! under, and every read goes back through the owner. Disposed slots are
//! handed out again by [`RowOwner::acquire_row`], which is what makes old
//! handles stale.
//!
//! Rows started while the owner is in [`RowDisposal::OnOwnerDispose`] mode
//! are threaded onto an intrusive list (through the rows themselves) so the
//! owner can reclaim them in one sweep, or when it is dropped.

use std::{any::Any, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    cell::RowCells,
    convert::TypeDescriber,
    error::{DynamicError, Result},
    names::ColumnNames,
    pool::SharedPool,
    row::{DynamicRow, RowId},
};

pub type UserContext = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowDisposal {
    /// Callers dispose each row they are handed.
    #[default]
    OnExplicitDispose,
    /// The owner disposes every row it started when it is disposed.
    OnOwnerDispose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// When false, rows are started without header names and only ordinal access works.
    pub capture_names: bool,
    pub disposal: RowDisposal,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            capture_names: true,
            disposal: RowDisposal::default(),
        }
    }
}

/// What a row takes from its owner at init time.
#[derive(Debug, Clone)]
pub struct OwnerContext {
    pool: SharedPool,
    describer: Arc<TypeDescriber>,
    context: Option<UserContext>,
}

impl OwnerContext {
    pub fn new(
        pool: SharedPool,
        describer: Arc<TypeDescriber>,
        context: Option<UserContext>,
    ) -> Self {
        OwnerContext {
            pool,
            describer,
            context,
        }
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn describer(&self) -> &Arc<TypeDescriber> {
        &self.describer
    }

    pub fn user_context(&self) -> Option<&UserContext> {
        self.context.as_ref()
    }
}

#[derive(Debug)]
pub struct RowOwner {
    shared: OwnerContext,
    options: ReadOptions,
    rows: Vec<DynamicRow>,
    free: Vec<RowId>,
    tracked_head: Option<RowId>,
    tracked_len: usize,
    row_number: usize,
}

impl RowOwner {
    pub fn new(pool: SharedPool, describer: TypeDescriber, options: ReadOptions) -> Self {
        RowOwner {
            shared: OwnerContext::new(pool, Arc::new(describer), None),
            options,
            rows: Vec::new(),
            free: Vec::new(),
            tracked_head: None,
            tracked_len: 0,
            row_number: 0,
        }
    }

    pub fn with_context(mut self, context: UserContext) -> Self {
        self.shared.context = Some(context);
        self
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn context(&self) -> &OwnerContext {
        &self.shared
    }

    pub fn pool(&self) -> &SharedPool {
        &self.shared.pool
    }

    /// Number of rows started so far; the next row started gets this plus one.
    pub fn row_number(&self) -> usize {
        self.row_number
    }

    /// Number of slots, live or disposed.
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// A disposed slot, reusing one when available.
    pub fn acquire_row(&mut self) -> RowId {
        while let Some(id) = self.free.pop() {
            if self.rows[id.0].is_disposed() {
                return id;
            }
        }
        let id = RowId(self.rows.len());
        self.rows.push(DynamicRow::new(id));
        id
    }

    pub fn start_row(
        &mut self,
        id: RowId,
        width: usize,
        names: Option<&Arc<ColumnNames>>,
    ) -> Result<()> {
        let names = if self.options.capture_names {
            names.cloned()
        } else {
            None
        };
        let row_number = self.row_number + 1;
        let slots = self.rows.len();
        let row = self.rows.get_mut(id.0).ok_or(DynamicError::OutOfRange {
            ordinal: id.0,
            width: slots,
        })?;
        row.init(&self.shared, row_number, width, names)?;
        self.row_number = row_number;
        self.free.retain(|free| *free != id);
        if self.options.disposal == RowDisposal::OnOwnerDispose {
            self.track(id);
        }
        Ok(())
    }

    /// Acquires a slot and starts it as the next row.
    pub fn next_row(&mut self, width: usize, names: Option<&Arc<ColumnNames>>) -> Result<RowId> {
        let id = self.acquire_row();
        self.start_row(id, width, names)?;
        Ok(id)
    }

    fn slot_mut(&mut self, id: RowId) -> Result<&mut DynamicRow> {
        let slots = self.rows.len();
        self.rows.get_mut(id.0).ok_or(DynamicError::OutOfRange {
            ordinal: id.0,
            width: slots,
        })
    }

    pub(crate) fn slot(&self, id: RowId) -> Result<&DynamicRow> {
        self.rows.get(id.0).ok_or(DynamicError::OutOfRange {
            ordinal: id.0,
            width: self.rows.len(),
        })
    }

    pub fn row(&self, id: RowId) -> Result<&DynamicRow> {
        let row = self.slot(id)?;
        row.ensure_live()?;
        Ok(row)
    }

    pub fn row_mut(&mut self, id: RowId) -> Result<&mut DynamicRow> {
        let row = self.slot_mut(id)?;
        row.ensure_live()?;
        Ok(row)
    }

    pub fn cells(&self, id: RowId) -> Result<RowCells<'_>> {
        let row = self.row(id)?;
        Ok(RowCells::new(self, id, row.generation(), row.width()))
    }

    /// Disposes one row and makes its slot available again.
    pub fn dispose_row(&mut self, id: RowId) -> Result<()> {
        let row = self.slot_mut(id)?;
        if row.is_disposed() {
            return Ok(());
        }
        row.dispose();
        self.untrack(id);
        self.free.push(id);
        Ok(())
    }

    /// Disposes every tracked row still at the generation it was tracked under.
    /// Returns how many rows were reclaimed.
    pub fn dispose_tracked(&mut self) -> usize {
        let mut reclaimed = 0;
        let mut next = self.tracked_head.take();
        while let Some(id) = next {
            let row = &mut self.rows[id.0];
            next = row.next_tracked.take();
            let tracked_generation = row.tracked_generation.take();
            if tracked_generation == Some(row.generation()) && !row.is_disposed() {
                row.dispose();
                self.free.push(id);
                reclaimed += 1;
            }
        }
        self.tracked_len = 0;
        if reclaimed > 0 {
            debug!("Reclaimed {reclaimed} tracked row(s)");
        }
        reclaimed
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked_len
    }

    fn track(&mut self, id: RowId) {
        let head = self.tracked_head;
        let row = &mut self.rows[id.0];
        row.tracked_generation = Some(row.generation());
        row.next_tracked = head;
        self.tracked_head = Some(id);
        self.tracked_len += 1;
    }

    fn untrack(&mut self, id: RowId) {
        if self.rows[id.0].tracked_generation.is_none() {
            return;
        }
        let mut prev: Option<RowId> = None;
        let mut cursor = self.tracked_head;
        while let Some(current) = cursor {
            let next = self.rows[current.0].next_tracked;
            if current == id {
                match prev {
                    Some(prev) => self.rows[prev.0].next_tracked = next,
                    None => self.tracked_head = next,
                }
                let row = &mut self.rows[id.0];
                row.next_tracked = None;
                row.tracked_generation = None;
                self.tracked_len -= 1;
                return;
            }
            prev = cursor;
            cursor = next;
        }
    }
}

impl Drop for RowOwner {
    fn drop(&mut self) {
        self.dispose_tracked();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{RecyclingPool, heap_pool};

    #[test]
    fn disposed_slots_are_reused() {
        let mut owner = RowOwner::new(heap_pool(), TypeDescriber::default(), ReadOptions::default());
        let first = owner.next_row(2, None).unwrap();
        let second = owner.next_row(2, None).unwrap();
        assert_ne!(first, second);
        assert_eq!(owner.row_number(), 2);

        owner.dispose_row(first).unwrap();
        let third = owner.next_row(2, None).unwrap();
        assert_eq!(third, first);
        assert_eq!(owner.row(third).unwrap().row_number(), 3);
        assert_eq!(owner.capacity(), 2);
    }

    #[test]
    fn starting_a_live_row_is_rejected() {
        let mut owner = RowOwner::new(heap_pool(), TypeDescriber::default(), ReadOptions::default());
        let id = owner.next_row(1, None).unwrap();
        assert_eq!(
            owner.start_row(id, 1, None).unwrap_err(),
            DynamicError::AlreadyInitialized
        );
        assert_eq!(owner.row_number(), 1);
    }

    #[test]
    fn tracked_rows_are_reclaimed_together() {
        let recycling = Arc::new(RecyclingPool::new());
        let options = ReadOptions {
            disposal: RowDisposal::OnOwnerDispose,
            ..ReadOptions::default()
        };
        let mut owner = RowOwner::new(recycling.clone(), TypeDescriber::default(), options);
        let ids: Vec<RowId> = (0..3).map(|_| owner.next_row(1, None).unwrap()).collect();
        for id in &ids {
            owner.row_mut(*id).unwrap().set_value(0, "v").unwrap();
        }
        assert_eq!(owner.tracked_len(), 3);
        assert_eq!(recycling.outstanding(), 3);

        owner.dispose_row(ids[1]).unwrap();
        assert_eq!(owner.tracked_len(), 2);

        assert_eq!(owner.dispose_tracked(), 2);
        assert_eq!(owner.tracked_len(), 0);
        assert_eq!(recycling.outstanding(), 0);
        assert!(ids.iter().all(|id| owner.row(*id).is_err()));
    }

    #[test]
    fn names_are_dropped_when_capture_is_disabled() {
        let names = ColumnNames::create(&["a"], &heap_pool()).unwrap();
        let options = ReadOptions {
            capture_names: false,
            ..ReadOptions::default()
        };
        let mut owner = RowOwner::new(heap_pool(), TypeDescriber::default(), options);
        let id = owner.next_row(1, Some(&names)).unwrap();
        assert!(owner.row(id).unwrap().names().is_none());
        assert_eq!(Arc::strong_count(&names), 1);
    }

    #[test]
    fn dropping_owner_releases_every_block() {
        let recycling = Arc::new(RecyclingPool::new());
        {
            let mut owner =
                RowOwner::new(recycling.clone(), TypeDescriber::default(), ReadOptions::default());
            let id = owner.next_row(1, None).unwrap();
            owner.row_mut(id).unwrap().set_value(0, "kept").unwrap();
            assert_eq!(recycling.outstanding(), 1);
        }
        assert_eq!(recycling.outstanding(), 0);
    }
}
