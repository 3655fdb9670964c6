// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use crate::catalog::locations::CountryCode;
use crate::fetch::RetryPolicy;
use crate::process::reshape::{ReshapeOptions, DEFAULT_CODE_SUFFIX, DEFAULT_VALUE_TAG};

/// Project configuration, read from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    /// Endpoint (dataflow) id → link to the provider's topic page.
    pub endpoints: BTreeMap<String, String>,
    /// Soft cap on observations per CSV request.
    pub max_observations: u64,
    /// HXL tag for the value column.
    pub value_tag: String,
    pub store_code: bool,
    pub code_suffix: String,
    /// Column whose values split a table into resources; `None` keeps one resource.
    pub split_to_resources_by_column: Option<String>,
    pub remove_useless_columns: bool,
    pub merge_resources: bool,
    pub single_dataset: bool,
    pub pause_between_endpoints_ms: u64,
    pub quota_backoff_secs: u64,
    pub transient_backoff_secs: u64,
    pub max_transient_retries: u32,
    pub user_agent: String,
    pub countries: Vec<CountryCode>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://api.uis.unesco.org/sdmx/".to_string(),
            endpoints: BTreeMap::new(),
            max_observations: 1800,
            value_tag: DEFAULT_VALUE_TAG.to_string(),
            store_code: false,
            code_suffix: DEFAULT_CODE_SUFFIX.to_string(),
            split_to_resources_by_column: Some("STAT_UNIT".to_string()),
            remove_useless_columns: true,
            merge_resources: true,
            single_dataset: false,
            pause_between_endpoints_ms: 200,
            quota_backoff_secs: 60,
            transient_backoff_secs: 5,
            max_transient_retries: 5,
            user_agent: "unesco-hdx".to_string(),
            countries: Vec::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(text)?;
        if !config.base_url.ends_with('/') {
            config.base_url.push('/');
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            quota_backoff: Duration::from_secs(self.quota_backoff_secs),
            transient_backoff: Duration::from_secs(self.transient_backoff_secs),
            max_transient_retries: self.max_transient_retries,
        }
    }

    pub fn reshape_options(&self) -> ReshapeOptions {
        ReshapeOptions {
            store_code: self.store_code,
            code_suffix: self.code_suffix.clone(),
            value_tag: self.value_tag.clone(),
            ..ReshapeOptions::default()
        }
    }

    pub fn pause_between_endpoints(&self) -> Duration {
        Duration::from_millis(self.pause_between_endpoints_ms)
    }
}

/// Query parameters appended to every data request (locale, subscription key).
pub fn load_extra_params<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading extra params {}", path.display()))?;
    let params: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing extra params {}", path.display()))?;

    Ok(params
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| {
            let v = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k, v))
        })
        .collect())
}
