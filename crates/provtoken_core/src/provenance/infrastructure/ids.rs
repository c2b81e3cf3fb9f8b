//! Token identifier generation.
use uuid::Uuid;

/// Generates a new random (version 4) token identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
