//! Request id generation.

use crate::error::TripError;
use rand::rngs::OsRng;
use rand::RngCore;

/// Generate a random version-4 UUID in its 36-character hyphenated form.
///
/// Fails only when the operating system cannot supply secure randomness.
pub fn new_request_id() -> Result<String, TripError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TripError::encoding(format!("secure randomness unavailable: {}", e)))?;

    // Builder forces the version nibble to 4 and the variant bits to 10.
    let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
    Ok(id.hyphenated().to_string())
}
