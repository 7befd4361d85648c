//! Offline-first movie catalog with resumable remote pagination.
//!
//! The durable core is [`store::Store`]: cached titles per logical list plus
//! the remote-key cursor records that let a paging session resume exactly
//! where it left off, across process restarts. [`session::Pager`] drives the
//! refresh/append protocol against a [`catalog::RemoteSource`], serializing
//! operations per list while unrelated lists proceed concurrently.

pub mod catalog;
pub mod config;
pub mod session;
pub mod store;
pub mod util;
