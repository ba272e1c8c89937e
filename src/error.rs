//! Error type shared by the row store, the name index, and the handles.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DynamicError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DynamicError {
    /// A cell, range, or enumerator outlived the row generation it was created against.
    #[error("handle refers to row generation {captured}, but the row is now at generation {current}")]
    StaleHandle { captured: u32, current: u32 },

    /// The row (or the slot a handle points at) is in the disposed state.
    #[error("row has been disposed")]
    Disposed,

    #[error("row must be disposed before it can be initialized again")]
    AlreadyInitialized,

    #[error("column ordinal {ordinal} out of range for row width {width}")]
    OutOfRange { ordinal: usize, width: usize },

    #[error("two or more members with same name: '{name}'")]
    DuplicateKey { name: String },

    /// The memory pool handed back a block smaller than the pre-computed size.
    #[error("memory pool returned {available} unit(s), {required} required")]
    CapacityExceeded { required: usize, available: usize },

    #[error("column '{name}' not found")]
    UnknownColumn { name: String },

    #[error("failed to convert column {column}: {message}")]
    Conversion { column: String, message: String },

    /// Packed buffer contents did not decode; indicates a bug in the writer.
    #[error("packed buffer is corrupt at offset {offset}")]
    Corrupt { offset: usize },
}

impl DynamicError {
    pub(crate) fn capacity(required: usize, available: usize) -> Self {
        DynamicError::CapacityExceeded {
            required,
            available,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, DynamicError::StaleHandle { .. })
    }
}
