use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Locale;
use chrono_tz::Tz;
use vitrine_core::assets::ApiContext;
use vitrine_datamanager::DatamanagerConfig;

use crate::middleware::csp::SETTABLE_DIRECTIVES;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Public site URL, sent as `Access-Control-Allow-Origin` outside CORS routes.
    pub public_url: String,
    /// Site name reported in `X-Powered-By`.
    pub friendly_name: String,
    /// Path prefixes answered with `Access-Control-Allow-Origin: *`.
    pub cors_routes: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory holding `views/` and `static/`.
    pub basedir: PathBuf,
    /// Content API base URL.
    pub datamanager_url: String,
    /// Short ID of the data manager (relation names).
    pub datamanager_id: String,
    /// Files endpoint for the `dm_*` URL filters.
    pub datamanager_files_url: String,
    /// API context for negotiating bare asset IDs in templates.
    pub dm_config: Option<ApiContext>,
    /// Asset API base URL per environment.
    pub asset_api_environments: HashMap<String, String>,
    /// TTL of the entry and URL caches, in seconds.
    pub memory_cache_ttl_secs: u64,
    /// `Cache-Control` max-age of rendered pages, in seconds.
    pub page_cache_ttl_secs: u64,
    /// Rebuild the template environment for every render.
    pub disable_template_cache: bool,
    /// Dynamic template kind -> model.
    pub dynamic_templates: HashMap<String, String>,
    /// CSP directive -> sources, replacing the default sources.
    pub csp_sources: BTreeMap<String, Vec<String>>,
    /// Default timezone of `date_format`.
    pub timezone: Tz,
    /// Default locale of `date_format`.
    pub locale: Locale,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                   |
    /// |---------------------------|-------------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                                 |
    /// | `PORT`                    | `3000`                                    |
    /// | `PUBLIC_URL`              | `http://localhost:3000`                   |
    /// | `FRIENDLY_NAME`           | `vitrine`                                 |
    /// | `CORS_ROUTES`             | (none)                                    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                      |
    /// | `BASEDIR`                 | `.`                                       |
    /// | `DATAMANAGER_URL`         | `http://localhost:8080/api`               |
    /// | `DATAMANAGER_ID`          | (empty)                                   |
    /// | `DATAMANAGER_FILES_URL`   | `{DATAMANAGER_URL}/files`                 |
    /// | `DM_CONFIG_ID`            | (unset)                                   |
    /// | `DM_CONFIG_ENVIRONMENT`   | (unset)                                   |
    /// | `ASSET_API_ENVIRONMENTS`  | `live=https://datamanager.entrecode.de`   |
    /// | `MEMORY_CACHE_TTL_SECS`   | `60`                                      |
    /// | `PAGE_CACHE_TTL_SECS`     | `300`                                     |
    /// | `DISABLE_TEMPLATE_CACHE`  | `false`                                   |
    /// | `DYNAMIC_TEMPLATES`       | (none), e.g. `teaser=teasers`             |
    /// | `CSP_SCRIPT_SRC` etc.     | (built-in policy), space-separated        |
    /// | `TIMEZONE`                | `UTC`                                     |
    /// | `LOCALE`                  | `en_US`                                   |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "3000")
            .parse()
            .expect("PORT must be a valid u16");

        let public_url = env_or("PUBLIC_URL", "http://localhost:3000");
        let friendly_name = env_or("FRIENDLY_NAME", "vitrine");

        let cors_routes = split_list(&env_or("CORS_ROUTES", ""));

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let basedir = PathBuf::from(env_or("BASEDIR", "."));

        let datamanager_url = env_or("DATAMANAGER_URL", "http://localhost:8080/api");
        let datamanager_id = env_or("DATAMANAGER_ID", "");
        let datamanager_files_url = std::env::var("DATAMANAGER_FILES_URL")
            .unwrap_or_else(|_| format!("{}/files", datamanager_url.trim_end_matches('/')));

        let dm_config = match (
            std::env::var("DM_CONFIG_ID"),
            std::env::var("DM_CONFIG_ENVIRONMENT"),
        ) {
            (Ok(id), Ok(environment)) => Some(ApiContext::new(id, environment)),
            _ => None,
        };

        let asset_api_environments = parse_pairs(&env_or(
            "ASSET_API_ENVIRONMENTS",
            "live=https://datamanager.entrecode.de",
        ));

        let memory_cache_ttl_secs: u64 = env_or("MEMORY_CACHE_TTL_SECS", "60")
            .parse()
            .expect("MEMORY_CACHE_TTL_SECS must be a valid u64");

        let page_cache_ttl_secs: u64 = env_or("PAGE_CACHE_TTL_SECS", "300")
            .parse()
            .expect("PAGE_CACHE_TTL_SECS must be a valid u64");

        let disable_template_cache: bool = env_or("DISABLE_TEMPLATE_CACHE", "false")
            .parse()
            .expect("DISABLE_TEMPLATE_CACHE must be true or false");

        let dynamic_templates = parse_pairs(&env_or("DYNAMIC_TEMPLATES", ""));

        let csp_sources = SETTABLE_DIRECTIVES
            .iter()
            .filter_map(|directive| {
                let raw = std::env::var(csp_env_var(directive)).ok()?;
                let sources = raw.split_whitespace().map(str::to_string).collect();
                Some((directive.to_string(), sources))
            })
            .collect();

        let timezone: Tz = env_or("TIMEZONE", "UTC")
            .parse()
            .expect("TIMEZONE must be an IANA timezone name");

        let locale = Locale::try_from(env_or("LOCALE", "en_US").as_str())
            .expect("LOCALE must be a known locale such as en_US");

        Self {
            host,
            port,
            public_url,
            friendly_name,
            cors_routes,
            request_timeout_secs,
            basedir,
            datamanager_url,
            datamanager_id,
            datamanager_files_url,
            dm_config,
            asset_api_environments,
            memory_cache_ttl_secs,
            page_cache_ttl_secs,
            disable_template_cache,
            dynamic_templates,
            csp_sources,
            timezone,
            locale,
        }
    }

    /// Settings for the content API layer.
    pub fn datamanager_config(&self) -> DatamanagerConfig {
        DatamanagerConfig {
            url: self.datamanager_url.clone(),
            files_url: self.datamanager_files_url.clone(),
            short_id: self.datamanager_id.clone(),
            cache_ttl: Duration::from_secs(self.memory_cache_ttl_secs),
            dynamic_templates: self.dynamic_templates.clone(),
        }
    }

    pub fn views_dir(&self) -> PathBuf {
        self.basedir.join("views")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.basedir.join("static")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// `script-src` -> `CSP_SCRIPT_SRC`.
fn csp_env_var(directive: &str) -> String {
    format!("CSP_{}", directive.replace('-', "_").to_uppercase())
}

/// Comma-separated list, blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Comma-separated `key=value` pairs; entries without `=` are ignored.
fn parse_pairs(raw: &str) -> HashMap<String, String> {
    split_list(raw)
        .iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_trimmed_and_malformed_ones_skipped() {
        let pairs = parse_pairs(" teaser = teasers ,broken, snippet=snippets");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["teaser"], "teasers");
        assert_eq!(pairs["snippet"], "snippets");
    }

    #[test]
    fn csp_env_var_names() {
        assert_eq!(csp_env_var("script-src"), "CSP_SCRIPT_SRC");
        assert_eq!(csp_env_var("manifest-src"), "CSP_MANIFEST_SRC");
    }

    #[test]
    fn list_drops_blank_items() {
        assert_eq!(split_list("/api, ,/feeds,"), vec!["/api", "/feeds"]);
        assert!(split_list("").is_empty());
    }
}
