pub mod client;
pub mod events;
pub mod settings;
pub mod value;

pub use client::{Document, DocumentStore, RemoteError};
