mod keys;
mod pages;
mod schema;
mod titles;
mod types;

pub use schema::Store;
pub use titles::CachedTitlesView;
pub use types::{CachedTitle, ListKey, RemoteKey, RemotePage, RemoteTitle, StoreError};
