//! Adapters behind the domain ports: storage, HTTP clients for the
//! assistant's upstream services, caching and fault tolerance.

pub mod cache;
pub mod http_clients;
pub mod in_memory;
pub mod resilience;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod seed;
