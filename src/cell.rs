//! Lazy handles to a single cell of a row.

use crate::{
    convert::{CellConverter, ReadContext},
    data::Value,
    error::Result,
    owner::RowOwner,
    row::{DynamicRow, RowId},
};

/// A column of a row at a particular generation. Holds no text; every read goes
/// back to the owner and fails with [`StaleHandle`](crate::DynamicError::StaleHandle)
/// once the row has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicCell {
    row: RowId,
    generation: u32,
    ordinal: usize,
}

impl DynamicCell {
    pub(crate) fn new(row: RowId, generation: u32, ordinal: usize) -> Self {
        DynamicCell {
            row,
            generation,
            ordinal,
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn resolve<'a>(&self, owner: &'a RowOwner) -> Result<&'a DynamicRow> {
        let row = owner.slot(self.row)?;
        row.check_generation(self.generation)?;
        Ok(row)
    }

    pub fn text<'a>(&self, owner: &'a RowOwner) -> Result<Option<&'a str>> {
        self.resolve(owner)?.data_span(self.ordinal)
    }

    pub fn read_context<'a>(&self, owner: &'a RowOwner) -> Result<ReadContext<'a>> {
        self.resolve(owner)?.read_context(Some(self.ordinal))
    }

    /// Converts with the converter the row's describer assigns to this column.
    pub fn convert(&self, owner: &RowOwner) -> Result<Option<Value>> {
        let row = self.resolve(owner)?;
        let ctx = row.read_context(Some(self.ordinal))?;
        let converter = row.describer()?.cell_converter(ctx.column.and_then(|c| c.name));
        converter.convert(row.data_span(self.ordinal)?, &ctx)
    }

    pub fn convert_with(&self, owner: &RowOwner, converter: &CellConverter) -> Result<Option<Value>> {
        let row = self.resolve(owner)?;
        let ctx = row.read_context(Some(self.ordinal))?;
        converter.convert(row.data_span(self.ordinal)?, &ctx)
    }
}

/// Enumerates the cells of one row, re-checking its generation at every step.
#[derive(Debug)]
pub struct RowCells<'a> {
    owner: &'a RowOwner,
    row: RowId,
    generation: u32,
    next: usize,
    end: usize,
}

impl<'a> RowCells<'a> {
    pub(crate) fn new(owner: &'a RowOwner, row: RowId, generation: u32, width: usize) -> Self {
        RowCells {
            owner,
            row,
            generation,
            next: 0,
            end: width,
        }
    }
}

impl Iterator for RowCells<'_> {
    type Item = Result<DynamicCell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let checked = self
            .owner
            .slot(self.row)
            .and_then(|row| row.check_generation(self.generation));
        if let Err(err) = checked {
            self.next = self.end;
            return Some(Err(err));
        }
        let cell = DynamicCell::new(self.row, self.generation, self.next);
        self.next += 1;
        Some(Ok(cell))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        (0, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        convert::TypeDescriber,
        data::ColumnType,
        error::DynamicError,
        names::ColumnNames,
        owner::ReadOptions,
        pool::heap_pool,
    };

    fn owner() -> RowOwner {
        let describer = TypeDescriber::default()
            .with_column("qty", CellConverter::Parse(ColumnType::Integer));
        RowOwner::new(heap_pool(), describer, ReadOptions::default())
    }

    #[test]
    fn cell_reads_and_converts_through_the_describer() {
        let mut owner = owner();
        let names = ColumnNames::create(&["sku", "qty"], owner.pool()).unwrap();
        let id = owner.next_row(2, Some(&names)).unwrap();
        let row = owner.row_mut(id).unwrap();
        row.set_value(0, "A-1").unwrap();
        row.set_value(1, "12").unwrap();

        let qty = owner.row(id).unwrap().cell_by_name("qty").unwrap();
        assert_eq!(qty.text(&owner).unwrap(), Some("12"));
        assert_eq!(qty.convert(&owner).unwrap(), Some(Value::Integer(12)));

        let sku = owner.row(id).unwrap().cell(0).unwrap();
        assert_eq!(
            sku.convert(&owner).unwrap(),
            Some(Value::String("A-1".to_string()))
        );
        assert!(sku
            .convert_with(&owner, &CellConverter::Parse(ColumnType::Integer))
            .is_err());

        let ctx = qty.read_context(&owner).unwrap();
        assert_eq!(ctx.row_number, 1);
        assert_eq!(ctx.column.unwrap().name, Some("qty"));
    }

    #[test]
    fn cells_go_stale_after_reuse() {
        let mut owner = owner();
        let id = owner.next_row(1, None).unwrap();
        owner.row_mut(id).unwrap().set_value(0, "before").unwrap();
        let cell = owner.row(id).unwrap().cell(0).unwrap();

        owner.dispose_row(id).unwrap();
        assert_eq!(cell.text(&owner).unwrap_err(), DynamicError::Disposed);

        let reused = owner.next_row(1, None).unwrap();
        assert_eq!(reused, id);
        owner.row_mut(reused).unwrap().set_value(0, "after").unwrap();
        let err = cell.text(&owner).unwrap_err();
        assert!(err.is_stale());
        assert!(cell.read_context(&owner).unwrap_err().is_stale());
    }

    #[test]
    fn enumerator_yields_every_column() {
        let mut owner = owner();
        let id = owner.next_row(3, None).unwrap();
        owner.row_mut(id).unwrap().set_value(1, "mid").unwrap();
        let texts: Vec<Option<&str>> = owner
            .cells(id)
            .unwrap()
            .map(|cell| cell.unwrap().text(&owner).unwrap())
            .collect();
        assert_eq!(texts, vec![None, Some("mid"), None]);
    }
}
