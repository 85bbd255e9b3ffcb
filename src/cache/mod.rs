//! Cache layer for barcode lookups
//!
//! The [`CacheStore`] trait is the capability the lookup pipeline depends on.
//! Two backends implement it: [`RedisCacheStore`] for deployments and
//! [`MemoryCacheStore`] for local runs and tests. Keys come from
//! [`food_barcode_key`] and entries live for [`CACHE_TTL`].

mod keys;
mod memory;
mod redis;
mod store;

pub use keys::food_barcode_key;
pub use memory::{MemoryCacheStore, DEFAULT_MAX_CAPACITY};
pub use self::redis::{RedisCacheStore, COMMAND_TIMEOUT};
pub use store::{CacheError, CacheResult, CacheStore, CACHE_TTL};
