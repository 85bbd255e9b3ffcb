//! Barcode calorie lookup
//!
//! A cache-aside lookup service: barcodes are resolved against a shared cache
//! first and against the Open Food Facts API on a miss. The modules are
//! exposed for the binary and for integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod logging;
pub mod lookup;
pub mod server;
