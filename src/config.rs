use anyhow::{Context, Result};
use apdu_lib::ExchangeConfig;
use std::path::Path;
use tracing::debug;

/// Load exchange settings from a JSON file, or the defaults when no file is given.
///
/// Missing fields fall back to their defaults, so a file may set only what it needs:
///
/// ```json
/// { "encoder": { "frame_limit": 128 }, "get_response_cla": 0 }
/// ```
pub fn load_config(path: Option<&Path>) -> Result<ExchangeConfig> {
    let Some(path) = path else {
        return Ok(ExchangeConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at: {:?}", path))?;
    let config = parse_config(&text).with_context(|| format!("Invalid config file: {:?}", path))?;
    debug!(?config, "Loaded configuration");
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<ExchangeConfig> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apdu_lib::constants::DEFAULT_MAX_CONTINUATIONS;

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(load_config(None).unwrap(), ExchangeConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = parse_config(r#"{ "encoder": { "extended_supported": false }, "timeout_ms": 1500 }"#).unwrap();

        assert!(!config.encoder.extended_supported);
        assert_eq!(config.timeout_ms, Some(1500));
        assert_eq!(config.max_continuations, DEFAULT_MAX_CONTINUATIONS);
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        assert!(parse_config(r#"{ "encoder": { "frame_limit": "big" } }"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/apdu.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
