//! `_id` generation.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::IdGeneration;

/// Characters that are hard to confuse with one another.
const UNMISTAKABLE: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTWXYZabcdefghijkmnopqrstuvwxyz";

const STRING_ID_LEN: usize = 17;

pub fn generate_id(strategy: IdGeneration) -> String {
    match strategy {
        IdGeneration::String => random_string_id(),
        IdGeneration::ObjectId => object_id(),
    }
}

fn random_bytes() -> impl Iterator<Item = u8> {
    std::iter::repeat_with(|| uuid::Uuid::new_v4().into_bytes()).flatten()
}

/// 17 characters from [`UNMISTAKABLE`].
pub fn random_string_id() -> String {
    random_bytes()
        .take(STRING_ID_LEN)
        .map(|b| UNMISTAKABLE[b as usize % UNMISTAKABLE.len()] as char)
        .collect()
}

/// 24 lowercase hex characters: a 4-byte big-endian timestamp followed by
/// 8 random bytes.
pub fn object_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let mut hex = format!("{secs:08x}");
    for b in random_bytes().take(8) {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}
