//! Deferred conversion of cell text into typed values.
//!
//! Conversion strategies form a closed set: a cell converter is a column type
//! to parse with, a plain constructor function, or a caller-supplied closure;
//! a row converter builds a whole typed row by position, by name, or through a
//! closure. A [`TypeDescriber`] bundles the defaults a row uses when a handle
//! is converted without an explicit strategy. A converter returning `None`
//! signals failure, surfaced as [`DynamicError::Conversion`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    data::{ColumnType, Value, parse_typed_value},
    error::{DynamicError, Result},
    owner::UserContext,
    row::{ColumnIdentifier, RowView},
};

pub type TypedRow = Vec<Option<Value>>;

/// Where a conversion is happening: which row, which column (for cells), and
/// the owner's user context.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub row_number: usize,
    pub column: Option<ColumnIdentifier<'a>>,
    pub context: Option<&'a UserContext>,
}

impl ReadContext<'_> {
    fn column_label(&self) -> String {
        self.column
            .map(|column| column.label())
            .unwrap_or_else(|| "<row>".to_string())
    }
}

type CellDelegate = dyn Fn(&str, &ReadContext<'_>) -> Option<Value> + Send + Sync;
type RowDelegate = dyn Fn(&RowView<'_>, &ReadContext<'_>) -> Option<TypedRow> + Send + Sync;

#[derive(Clone)]
pub enum CellConverter {
    Parse(ColumnType),
    Construct(fn(&str) -> Option<Value>),
    Delegate(Arc<CellDelegate>),
}

impl CellConverter {
    pub fn delegate<F>(f: F) -> Self
    where
        F: Fn(&str, &ReadContext<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        CellConverter::Delegate(Arc::new(f))
    }

    /// Unset cells convert to `None` under every strategy.
    pub fn convert(&self, text: Option<&str>, ctx: &ReadContext<'_>) -> Result<Option<Value>> {
        let Some(text) = text else {
            return Ok(None);
        };
        match self {
            CellConverter::Parse(ty) => {
                parse_typed_value(text, *ty).map_err(|err| DynamicError::Conversion {
                    column: ctx.column_label(),
                    message: err.to_string(),
                })
            }
            CellConverter::Construct(construct) => construct(text)
                .map(Some)
                .ok_or_else(|| rejected(ctx, text)),
            CellConverter::Delegate(delegate) => delegate(text, ctx)
                .map(Some)
                .ok_or_else(|| rejected(ctx, text)),
        }
    }
}

fn rejected(ctx: &ReadContext<'_>, text: &str) -> DynamicError {
    DynamicError::Conversion {
        column: ctx.column_label(),
        message: format!("converter rejected '{text}'"),
    }
}

impl fmt::Debug for CellConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellConverter::Parse(ty) => f.debug_tuple("Parse").field(ty).finish(),
            CellConverter::Construct(_) => f.write_str("Construct(..)"),
            CellConverter::Delegate(_) => f.write_str("Delegate(..)"),
        }
    }
}

#[derive(Clone)]
pub enum RowConverter {
    /// Every column parsed as the same type.
    Uniform(ColumnType),
    /// Column `i` parsed as the `i`th type; the view must be at least that wide.
    Positional(Vec<ColumnType>),
    /// Each named column resolved through the header index, in the listed order.
    Named(Vec<(String, ColumnType)>),
    Delegate(Arc<RowDelegate>),
}

impl RowConverter {
    pub fn delegate<F>(f: F) -> Self
    where
        F: Fn(&RowView<'_>, &ReadContext<'_>) -> Option<TypedRow> + Send + Sync + 'static,
    {
        RowConverter::Delegate(Arc::new(f))
    }

    pub fn convert(&self, view: &RowView<'_>, ctx: &ReadContext<'_>) -> Result<TypedRow> {
        match self {
            RowConverter::Uniform(ty) => (0..view.width())
                .map(|ordinal| convert_cell(view, ordinal, *ty))
                .collect(),
            RowConverter::Positional(types) => types
                .iter()
                .enumerate()
                .map(|(ordinal, ty)| convert_cell(view, ordinal, *ty))
                .collect(),
            RowConverter::Named(columns) => columns
                .iter()
                .map(|(name, ty)| convert_cell(view, view.ordinal_of(name)?, *ty))
                .collect(),
            RowConverter::Delegate(delegate) => {
                delegate(view, ctx).ok_or_else(|| DynamicError::Conversion {
                    column: ctx.column_label(),
                    message: format!("row {} rejected by converter", ctx.row_number),
                })
            }
        }
    }
}

fn convert_cell(view: &RowView<'_>, ordinal: usize, ty: ColumnType) -> Result<Option<Value>> {
    let ctx = view.read_context(Some(ordinal))?;
    CellConverter::Parse(ty).convert(view.text(ordinal)?, &ctx)
}

impl fmt::Debug for RowConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowConverter::Uniform(ty) => f.debug_tuple("Uniform").field(ty).finish(),
            RowConverter::Positional(types) => f.debug_tuple("Positional").field(types).finish(),
            RowConverter::Named(columns) => f.debug_tuple("Named").field(columns).finish(),
            RowConverter::Delegate(_) => f.write_str("Delegate(..)"),
        }
    }
}

/// Conversion defaults shared by every row of an owner.
#[derive(Debug, Clone)]
pub struct TypeDescriber {
    cell: CellConverter,
    columns: BTreeMap<String, CellConverter>,
    row: RowConverter,
}

impl Default for TypeDescriber {
    fn default() -> Self {
        TypeDescriber {
            cell: CellConverter::Parse(ColumnType::String),
            columns: BTreeMap::new(),
            row: RowConverter::Uniform(ColumnType::String),
        }
    }
}

impl TypeDescriber {
    pub fn with_cell_converter(mut self, converter: CellConverter) -> Self {
        self.cell = converter;
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, converter: CellConverter) -> Self {
        self.columns.insert(name.into(), converter);
        self
    }

    pub fn with_row_converter(mut self, converter: RowConverter) -> Self {
        self.row = converter;
        self
    }

    /// The converter for a column, falling back to the default when the column
    /// is unnamed or has no override.
    pub fn cell_converter(&self, name: Option<&str>) -> &CellConverter {
        name.and_then(|name| self.columns.get(name))
            .unwrap_or(&self.cell)
    }

    pub fn row_converter(&self) -> &RowConverter {
        &self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReadContext<'static> {
        ReadContext {
            row_number: 7,
            column: Some(ColumnIdentifier {
                ordinal: 2,
                name: Some("amount"),
            }),
            context: None,
        }
    }

    #[test]
    fn parse_failures_name_the_column() {
        let err = CellConverter::Parse(ColumnType::Integer)
            .convert(Some("abc"), &ctx())
            .unwrap_err();
        match err {
            DynamicError::Conversion { column, message } => {
                assert_eq!(column, "amount");
                assert!(message.contains("as integer"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn constructor_and_delegate_strategies() {
        fn shout(text: &str) -> Option<Value> {
            Some(Value::String(text.to_uppercase()))
        }
        let construct = CellConverter::Construct(shout);
        assert_eq!(
            construct.convert(Some("hi"), &ctx()).unwrap(),
            Some(Value::String("HI".to_string()))
        );

        let with_row = CellConverter::delegate(|text, ctx| {
            Some(Value::String(format!("{}:{text}", ctx.row_number)))
        });
        assert_eq!(
            with_row.convert(Some("x"), &ctx()).unwrap(),
            Some(Value::String("7:x".to_string()))
        );

        let refuse = CellConverter::delegate(|_, _| None);
        assert!(refuse.convert(Some("x"), &ctx()).is_err());
        assert_eq!(refuse.convert(None, &ctx()).unwrap(), None);
    }

    #[test]
    fn describer_prefers_column_overrides() {
        let describer = TypeDescriber::default()
            .with_column("amount", CellConverter::Parse(ColumnType::Decimal));
        assert!(matches!(
            describer.cell_converter(Some("amount")),
            CellConverter::Parse(ColumnType::Decimal)
        ));
        assert!(matches!(
            describer.cell_converter(Some("other")),
            CellConverter::Parse(ColumnType::String)
        ));
        assert!(matches!(
            describer.cell_converter(None),
            CellConverter::Parse(ColumnType::String)
        ));
    }
}
