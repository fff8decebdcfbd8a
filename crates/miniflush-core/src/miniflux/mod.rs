mod client;
mod models;
mod request;

pub use client::{MinifluxClient, ReaderApi};
pub use models::{Category, Entry, EntryResultSet, EntryStatus, Feed, User};
pub use request::{EntriesRequest, BASE_PARAMS};
