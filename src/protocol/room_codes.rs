use rand::RngExt;

use crate::config::ProtocolConfig;

use super::types::RoomId;

const HEX_CHARS: &[u8] = b"0123456789abcdef";
const GENERATED_SUFFIX_LENGTH: usize = 8;

/// Generate a server-side room identifier of the form `{prefix}_{8 hex}`.
pub fn generate_room_id(prefix: &str) -> RoomId {
    let mut rng = rand::rng();
    let suffix: String = (0..GENERATED_SUFFIX_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..HEX_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = HEX_CHARS[idx] as char;
            ch
        })
        .collect();
    RoomId::new(format!("{prefix}_{suffix}"))
}

/// Normalize a client-supplied invite code: uppercase, strip everything
/// outside `[A-Z0-9]`, then require 3-10 remaining characters.
pub fn normalize_invite_code(raw: &str, config: &ProtocolConfig) -> Result<String, String> {
    let normalized: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect();

    if normalized.len() < config.invite_code_min_length
        || normalized.len() > config.invite_code_max_length
    {
        return Err(format!(
            "Invite code must be {}-{} letters or digits",
            config.invite_code_min_length, config.invite_code_max_length
        ));
    }

    Ok(normalized)
}

/// Whether `raw` has the server-generated form `^[A-Za-z]+_[A-Fa-f0-9]{8}$`.
pub fn is_generated_room_id(raw: &str) -> bool {
    let Some((prefix, suffix)) = raw.split_once('_') else {
        return false;
    };
    !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && suffix.len() == GENERATED_SUFFIX_LENGTH
        && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether `raw` is acceptable as a room identifier: a normalized invite code
/// or a server-generated id.
pub fn is_valid_room_id(raw: &str, config: &ProtocolConfig) -> bool {
    if is_generated_room_id(raw) {
        return true;
    }
    raw.len() >= config.invite_code_min_length
        && raw.len() <= config.invite_code_max_length
        && raw
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
