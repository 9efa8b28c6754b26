#[cfg(test)]
mod tests {
    use rpc_core::config::{ENV_LOG_LEVEL, ENV_REQUEST_TIMEOUT_MS};
    use rpc_core::Config;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_file_yields_defaults_and_writes_them() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(config.transport.channel_capacity, 64);
        assert_eq!(config.logging.level, "info");
        assert!(path.exists(), "Default config should be written out");

        let reloaded = Config::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(reloaded.transport.max_line_length, config.transport.max_line_length);
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"client": {"request_timeout_ms": 250}}"#).unwrap();

        let config = Config::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(
            config.client.request_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.server.max_concurrent_handlers, 0);
        assert_eq!(config.transport.replay, 0);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let err = Config::load_with_env(Some(&path), no_env).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config file"));
    }

    #[test]
    fn test_env_timeout_overrides_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"client": {"request_timeout_ms": 250}}"#).unwrap();

        let config =
            Config::load_with_env(Some(&path), env(&[(ENV_REQUEST_TIMEOUT_MS, " 1500 ")])).unwrap();
        assert_eq!(
            config.client.request_timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_env_timeout_of_zero_disables_the_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_with_env(Some(&path), env(&[(ENV_REQUEST_TIMEOUT_MS, "0")])).unwrap();
        assert_eq!(config.client.request_timeout(), None);
    }

    #[test]
    fn test_env_timeout_must_be_a_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let err = Config::load_with_env(Some(&path), env(&[(ENV_REQUEST_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains(ENV_REQUEST_TIMEOUT_MS));
    }

    #[test]
    fn test_env_log_level_overrides_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"logging": {"level": "warn", "log_dir": null}}"#).unwrap();

        let config = Config::load_with_env(Some(&path), env(&[(ENV_LOG_LEVEL, "trace")])).unwrap();
        assert_eq!(config.logging.level, "trace");
    }
}
