//! Adapters implementing the domain ports: an in-memory and an optional
//! RocksDB order repository, and a scripted payment gateway.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated;
