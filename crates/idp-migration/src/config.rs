use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the Migration Orchestrator, grounded on
/// `scielo_core/config.py`'s environment-variable surface, minus the
/// broker/result-backend settings this crate replaces with an in-process
/// queue (SPEC_FULL.md "Configuration").
#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub store_map_size: usize,
    pub xml_folder_path: PathBuf,
    pub website_base_url: String,
    pub articlemeta_collection: String,
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    pub concurrency: bool,
}

const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

impl Config {
    pub fn from_env() -> Self {
        Config {
            store_path: env::var("MIGR_STORE_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/migration")),
            store_map_size: env::var("MIGR_STORE_MAP_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_MAP_SIZE),
            xml_folder_path: env::var("MIGR_XML_FOLDER_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/legacy-xml")),
            website_base_url: env::var("MIGR_WEBSITE_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            articlemeta_collection: env::var("MIGR_ARTICLEMETA_COLLECTION").unwrap_or_else(|_| "scl".to_string()),
            http_timeout: Duration::from_secs(env::var("MIGR_HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10)),
            http_max_retries: env::var("MIGR_HTTP_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            concurrency: env::var("MIGR_CONCURRENCY").ok().map(|v| v != "false").unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_is_unset() {
        unsafe {
            for var in ["MIGR_STORE_PATH", "MIGR_STORE_MAP_SIZE", "MIGR_XML_FOLDER_PATH", "MIGR_WEBSITE_BASE_URL", "MIGR_ARTICLEMETA_COLLECTION", "MIGR_HTTP_TIMEOUT_SECS", "MIGR_HTTP_MAX_RETRIES", "MIGR_CONCURRENCY"] {
                env::remove_var(var);
            }
        }
        let config = Config::from_env();
        assert_eq!(config.store_path, PathBuf::from("./data/migration"));
        assert!(config.concurrency);
        assert_eq!(config.http_max_retries, 5);
    }
}
