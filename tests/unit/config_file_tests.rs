use liquidity_mirror::{ConfigError, MirrorConfig, MirrorError, ToleranceMode};
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"{
                "premium": "1.02",
                "tolerance": "0.5",
                "tolerance_mode": "absolute",
                "reset_only": false,
                "min_value": "50",
                "max_orders": 8,
                "stop_after": 100,
                "progress_interval_ms": 30000,
                "max_volatility": "0.05",
                "padding": "1.1",
                "alert_interval_ms": 120000,
                "history": { "capacity": 50, "interval_ms": 500, "rolling_num": 10 }
            }"#,
        );
        let config = MirrorConfig::from_path(file.path()).unwrap();

        assert_eq!(config.premium, dec!(1.02));
        assert_eq!(config.tolerance_mode, ToleranceMode::Absolute);
        assert_eq!(config.max_orders, Some(8));
        assert_eq!(config.stop_after, Some(100));
        assert_eq!(config.progress_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_volatility, Some(dec!(0.05)));
        assert_eq!(config.padding, dec!(1.1));
        assert_eq!(config.alert_interval(), Duration::from_secs(120));
        assert_eq!(config.history.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_numeric_decimals_accepted() {
        let file = write_config(r#"{ "premium": 2, "min_value": 12.5 }"#);
        let config = MirrorConfig::from_path(file.path()).unwrap();
        assert_eq!(config.premium, dec!(2));
        assert_eq!(config.min_value, Some(dec!(12.5)));
    }

    #[test]
    fn test_invalid_file_contents() {
        let file = write_config(r#"{ "premium": "-1" }"#);
        assert!(matches!(
            MirrorConfig::from_path(file.path()),
            Err(MirrorError::Config(ConfigError::InvalidPremium { .. }))
        ));

        let file = write_config(r#"{ "tolerance": "1" }"#);
        assert!(matches!(
            MirrorConfig::from_path(file.path()),
            Err(MirrorError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            MirrorConfig::from_path(missing),
            Err(MirrorError::Io(_))
        ));
    }
}
