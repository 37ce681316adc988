use unicode_normalization::UnicodeNormalization;

use crate::config::ProtocolConfig;

/// Symbols permitted inside a display name besides letters, digits and spaces.
const DISPLAY_NAME_SYMBOLS: [char; 5] = ['_', '\'', '\u{2019}', '.', '-'];

/// Sanitize and validate a client-supplied display name.
///
/// The raw value is NFKC-normalized, internal whitespace runs are collapsed
/// to a single space and the result is trimmed before the character rules
/// are applied. Returns the sanitized name on success.
pub fn sanitize_display_name(raw: &str, config: &ProtocolConfig) -> Result<String, String> {
    let normalized: String = raw.nfkc().collect();
    let collapsed = collapse_whitespace(&normalized);
    let name = collapsed.trim();

    if name.is_empty() {
        return Err("Display name cannot be empty".to_string());
    }

    let char_count = name.chars().count();
    if char_count > config.max_display_name_chars {
        return Err(format!(
            "Display name too long (max {} characters)",
            config.max_display_name_chars
        ));
    }

    for ch in name.chars() {
        if ch == ' ' || ch.is_alphabetic() || ch.is_numeric() {
            continue;
        }
        if DISPLAY_NAME_SYMBOLS.contains(&ch) {
            continue;
        }
        return Err("Display name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}

/// Validate an account name: `^[A-Za-z0-9_-]{3,24}$`.
pub fn validate_account_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(3..=24).contains(&len) {
        return Err("Account name must be 3-24 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Account name contains invalid characters".to_string());
    }
    Ok(())
}

/// Validate a game type identifier: `^[A-Za-z0-9_-]{1,50}$`.
///
/// Registry membership is checked separately by the caller.
pub fn validate_game_type(name: &str, config: &ProtocolConfig) -> Result<(), String> {
    if name.is_empty() {
        return Err("Game type cannot be empty".to_string());
    }
    if name.len() > config.max_game_type_length {
        return Err(format!(
            "Game type too long (max {} characters)",
            config.max_game_type_length
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Game type contains invalid characters".to_string());
    }
    Ok(())
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

// Convenience wrappers using the default protocol config.
#[allow(dead_code)]
pub fn sanitize_display_name_default(raw: &str) -> Result<String, String> {
    sanitize_display_name(raw, &ProtocolConfig::default())
}

#[allow(dead_code)]
pub fn validate_game_type_default(name: &str) -> Result<(), String> {
    validate_game_type(name, &ProtocolConfig::default())
}
