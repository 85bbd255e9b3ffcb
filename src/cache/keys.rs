//! Cache key derivation for barcode lookups

/// Namespace prefix for barcode lookup entries
const FOOD_BARCODE_PREFIX: &str = "food:barcode:";

/// Returns the cache key for a barcode.
///
/// The barcode is appended verbatim, so distinct barcodes never share a key.
pub fn food_barcode_key(barcode: &str) -> String {
    format!("{}{}", FOOD_BARCODE_PREFIX, barcode)
}
