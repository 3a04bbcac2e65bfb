//! Postgres bulk-load helpers

pub mod copy;
pub mod value;

pub use copy::{
    copy_expert, copy_expert_onconflict_skip, quote_ident, BulkCopy, CopyOutcome, TableRef,
    DEFAULT_CHUNK_BYTES,
};
pub use value::{encode_field, encode_row, CopyValue, ToCopyRow};
