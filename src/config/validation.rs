//! Configuration sanity checks.

use super::Config;

/// Validate the loaded configuration. Returns a combined error message
/// listing every violated constraint.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut problems = Vec::new();

    if config.port == 0 {
        problems.push("port must be non-zero".to_string());
    }
    if config.port_scan_limit == 0 {
        problems.push("port_scan_limit must be at least 1".to_string());
    }
    if config.server.sweep_interval == 0 {
        problems.push("server.sweep_interval must be at least 1 second".to_string());
    }
    if config.protocol.invite_code_min_length == 0
        || config.protocol.invite_code_min_length > config.protocol.invite_code_max_length
    {
        problems.push(
            "protocol invite code bounds must satisfy 1 <= min <= max".to_string(),
        );
    }
    if config.protocol.max_display_name_chars == 0 {
        problems.push("protocol.max_display_name_chars must be at least 1".to_string());
    }
    if config.security.max_message_size < 256 {
        problems.push("security.max_message_size must be at least 256 bytes".to_string());
    }
    if config.security.max_connections_per_ip == 0 {
        problems.push("security.max_connections_per_ip must be at least 1".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn bad_values_are_all_reported() {
        let mut config = Config::default();
        config.port = 0;
        config.server.sweep_interval = 0;
        config.security.max_connections_per_ip = 0;

        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("port must be non-zero"));
        assert!(err.contains("sweep_interval"));
        assert!(err.contains("max_connections_per_ip"));
    }
}
