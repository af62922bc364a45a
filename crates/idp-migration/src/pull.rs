use std::cell::Cell;

use idp_types::{Migration, PullSource};

use crate::config::Config;
use crate::error::Error;

/// Non-empty XML pulled from one of the three sources, plus which source won
/// (spec.md §4.6, recorded on the `Migration` row).
pub struct Pulled {
    pub xml: Vec<u8>,
    pub source: PullSource,
}

/// Try the three sources in order, first non-empty XML wins (spec.md §4.6).
pub fn pull(client: &reqwest::blocking::Client, config: &Config, migration: &Migration) -> Result<Pulled, Error> {
    if let Some(xml) = pull_from_website(client, config, &migration.v2)? {
        return Ok(Pulled { xml, source: PullSource::Website });
    }
    if let Some(xml) = pull_from_filesystem(config, &migration.file_path)? {
        return Ok(Pulled { xml, source: PullSource::Filesystem });
    }
    if let Some(xml) = pull_from_articlemeta(client, config, &migration.v2)? {
        return Ok(Pulled { xml, source: PullSource::ArticleMeta });
    }
    Err(Error::PullFailed(migration.v2.clone()))
}

/// New-website article store: an article record exposes an `xml` URL and
/// `_id` (the v3); we fetch the record then the XML it points at.
fn pull_from_website(client: &reqwest::blocking::Client, config: &Config, pid: &str) -> Result<Option<Vec<u8>>, Error> {
    let article_url = format!("{}/api/v1/article/{pid}", config.website_base_url);
    let Some(body) = fetch_with_backoff(client, &article_url, config)? else {
        return Ok(None);
    };
    let article: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let Some(xml_url) = article.get("xml").and_then(|v| v.as_str()) else {
        return Ok(None);
    };
    fetch_with_backoff(client, xml_url, config).map(|body| body.map(String::into_bytes))
}

/// Legacy filesystem path under a configured root (spec.md §4.6).
fn pull_from_filesystem(config: &Config, file_path: &str) -> Result<Option<Vec<u8>>, Error> {
    if file_path.is_empty() {
        return Ok(None);
    }
    let full_path = config.xml_folder_path.join(file_path);
    match std::fs::read(&full_path) {
        Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::PullFailed(format!("{}: {err}", full_path.display()))),
    }
}

/// `https://articlemeta.scielo.org/api/v1/article/?collection=<c>&code=<pid>&format=xmlrsps` (spec.md §6).
fn pull_from_articlemeta(client: &reqwest::blocking::Client, config: &Config, pid: &str) -> Result<Option<Vec<u8>>, Error> {
    let collection = &config.articlemeta_collection;
    let url = format!("https://articlemeta.scielo.org/api/v1/article/?collection={collection}&code={pid}&format=xmlrsps");
    fetch_with_backoff(client, &url, config).map(|body| body.map(String::into_bytes))
}

/// HTTP GET with the deadline doubling on timeout from
/// `migration/tasks.py::_get_xml_file_content`'s recursive `timeout=timeout*2`,
/// bounded at `config.http_max_retries` attempts instead of recursing
/// forever, driven through `backoff::retry` the way
/// `meilisearch::proxy::enterprise_edition` drives its own remote calls.
/// Non-timeout errors are permanent: they fail the pull immediately
/// (spec.md §4.6).
fn fetch_with_backoff(client: &reqwest::blocking::Client, url: &str, config: &Config) -> Result<Option<String>, Error> {
    let deadline = Cell::new(config.http_timeout);
    let attempts = Cell::new(0u32);
    let backoff = backoff::ExponentialBackoffBuilder::new().build();

    let outcome = backoff::retry(backoff, || -> Result<Option<String>, backoff::Error<Error>> {
        let timeout = deadline.get();
        match client.get(url).timeout(timeout).send() {
            Ok(response) if response.status().is_success() => {
                response.text().map(Some).map_err(|err| backoff::Error::Permanent(Error::PullFailed(err.to_string())))
            }
            Ok(response) if response.status().as_u16() == 404 => Ok(None),
            Ok(response) => Err(backoff::Error::Permanent(Error::PullFailed(format!("{url}: status {}", response.status())))),
            Err(err) if err.is_timeout() => {
                attempts.set(attempts.get() + 1);
                if attempts.get() > config.http_max_retries {
                    return Err(backoff::Error::Permanent(Error::PullFailed(format!("{url}: exhausted {} retries", config.http_max_retries))));
                }
                deadline.set(timeout * 2);
                Err(backoff::Error::transient(Error::PullFailed(format!("{url}: timed out after {timeout:?}"))))
            }
            Err(err) => Err(backoff::Error::Permanent(Error::PullFailed(err.to_string()))),
        }
    });

    match outcome {
        Ok(body) => Ok(body),
        Err(backoff::Error::Permanent(err)) => Err(err),
        Err(backoff::Error::Transient { err, .. }) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_source_reads_under_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), b"<article/>").unwrap();
        let mut config = Config::from_env();
        config.xml_folder_path = dir.path().to_path_buf();

        let xml = pull_from_filesystem(&config, "a.xml").unwrap();
        assert_eq!(xml, Some(b"<article/>".to_vec()));
    }

    #[test]
    fn filesystem_source_misses_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::from_env();
        config.xml_folder_path = dir.path().to_path_buf();

        assert_eq!(pull_from_filesystem(&config, "missing.xml").unwrap(), None);
    }

    #[test]
    fn filesystem_source_skipped_when_path_is_empty() {
        let config = Config::from_env();
        assert_eq!(pull_from_filesystem(&config, "").unwrap(), None);
    }
}
