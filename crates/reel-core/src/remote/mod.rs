//! Remote log storage over a shared document collection

mod document;
mod log_store;
mod memory;

pub use document::{
    apply_field_update, get_path, matches_filter, remove_path, set_path, Document, DocumentStore,
    FieldUpdate, Filter, WriteBatch, WriteOp,
};
pub use log_store::{NewLog, RemoteLogStore};
pub use memory::MemoryDocumentStore;
