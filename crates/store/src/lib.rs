//! StoreGateway: typed read/write access to responses, conversations,
//! branches, items, shares, and artifacts.
//!
//! The database driver is an external collaborator (§1) — there is no
//! live Postgres connection here. `MemoryStoreGateway` implements the
//! same atomicity contracts (winner-take-all claim, write-once terminal
//! status, atomic `is_latest` version flips) against an in-process,
//! lock-guarded index with a JSONL change log for crash recovery.

mod artifacts;
mod conversations;
mod gateway;
mod responses;
mod shares;

pub use gateway::{MemoryStoreGateway, StoreGateway};
