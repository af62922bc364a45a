use std::env;
use std::path::PathBuf;

/// Runtime configuration for the Identifier Provider, read from the
/// environment the way `scielo_core/config.py` reads `os.environ` into a
/// settings object.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub store_map_size: usize,
}

const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

impl Config {
    /// Reads `IDP_STORE_PATH` (default `./data/idp-store`) and
    /// `IDP_STORE_MAP_SIZE` (bytes, default 10 GiB).
    pub fn from_env() -> Self {
        let store_path = env::var("IDP_STORE_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/idp-store"));
        let store_map_size = env::var("IDP_STORE_MAP_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAP_SIZE);
        Config { store_path, store_map_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_is_unset() {
        // SAFETY: test-only process-wide env mutation; no other test in
        // this crate reads these two variables concurrently.
        unsafe {
            env::remove_var("IDP_STORE_PATH");
            env::remove_var("IDP_STORE_MAP_SIZE");
        }
        let config = Config::from_env();
        assert_eq!(config.store_path, PathBuf::from("./data/idp-store"));
        assert_eq!(config.store_map_size, DEFAULT_MAP_SIZE);
    }
}
