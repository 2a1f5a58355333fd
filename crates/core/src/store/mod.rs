pub mod document;
pub mod path;
pub mod query;
pub mod traits;

// Store implementations
pub mod firestore;
pub mod firestore_codec;
pub mod memory;
