// src/fetch/download.rs

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::{collections::BTreeMap, thread::sleep, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use url::form_urlencoded;

use super::{Downloader, FetchError};
use crate::process::{ProcessError, RawTable};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Blocking HTTP downloader that appends fixed query parameters
/// (e.g. `locale`, `subscription-key`) to data requests.
pub struct HttpDownloader {
    client: Client,
    extra_params: BTreeMap<String, String>,
}

impl HttpDownloader {
    pub fn new(extra_params: BTreeMap<String, String>, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            extra_params,
        })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(%url, "GET");
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = self.client.get(url).send().map_err(transport)?;
        let status = resp.status();
        if status.is_success() {
            return resp.bytes().map(|b| b.to_vec()).map_err(transport);
        }

        let body = resp.text().unwrap_or_default();
        Err(classify_failure(url, status.as_u16(), &body))
    }

    fn full_url(&self, url: &str) -> String {
        append_query(url, &self.extra_params)
    }
}

/// Append `params` to `url`, keeping whatever query the URL already carries.
pub fn append_query(url: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    let sep = match url.find('?') {
        None => "?",
        Some(_) if url.ends_with('?') || url.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{}{}{}", url, sep, query)
}

/// Map a non-success response onto the retry taxonomy.
pub fn classify_failure(url: &str, status: u16, body: &str) -> FetchError {
    let lower = body.to_lowercase();
    if status == 429 || lower.contains("quota exceeded") || lower.contains("out of call volume quota")
    {
        FetchError::QuotaExceeded {
            url: url.to_string(),
        }
    } else if status == 404 || lower.contains("not found") {
        FetchError::NotFound {
            url: url.to_string(),
        }
    } else {
        let snippet: String = body.chars().take(200).collect();
        FetchError::Transport {
            url: url.to_string(),
            message: format!("HTTP {}: {}", status, snippet),
        }
    }
}

/// How long to wait between attempts, and how often to retry unclassified
/// failures before giving up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub quota_backoff: Duration,
    pub transient_backoff: Duration,
    pub max_transient_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            quota_backoff: Duration::from_secs(60),
            transient_backoff: Duration::from_secs(5),
            max_transient_retries: 5,
        }
    }
}

/// GET `url`, sleeping through quota errors for as long as it takes.
/// Not-found returns `Ok(None)` at once; other failures are retried up to
/// `max_transient_retries` times and then returned.
#[instrument(level = "debug", skip(downloader, policy))]
pub fn fetch_with_retry<D: Downloader>(
    downloader: &D,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Option<Vec<u8>>> {
    let mut attempts = 0;
    loop {
        match downloader.download(url) {
            Ok(body) => return Ok(Some(body)),
            Err(FetchError::QuotaExceeded { .. }) => {
                info!(%url, delay = ?policy.quota_backoff, "quota exceeded, sleeping");
                sleep(policy.quota_backoff);
            }
            Err(FetchError::NotFound { .. }) => {
                warn!(%url, "resource not found");
                return Ok(None);
            }
            Err(e) if attempts < policy.max_transient_retries => {
                attempts += 1;
                warn!(%url, attempt = attempts, error = %e, "retrying");
                sleep(policy.transient_backoff);
            }
            Err(e) => {
                error!(%url, error = %e, "exhausted retries");
                return Err(e.into());
            }
        }
    }
}

/// Fetch and decode a JSON document; `Ok(None)` when the URL does not exist.
/// Provider parameters are appended to `url` first.
pub fn fetch_json<D: Downloader, T: DeserializeOwned>(
    downloader: &D,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Option<T>> {
    let url = downloader.full_url(url);
    match fetch_with_retry(downloader, &url, policy)? {
        Some(body) => {
            let value = serde_json::from_slice(&body)
                .with_context(|| format!("decoding JSON from {}", url))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Download the CSV export at `csv_url` restricted to `start..=end`.
/// `Ok(None)` means the provider has no such slice.
#[instrument(level = "info", skip(downloader, csv_url, policy))]
pub fn fetch_table<D: Downloader>(
    downloader: &D,
    csv_url: &str,
    start: i32,
    end: i32,
    policy: &RetryPolicy,
) -> Result<Option<RawTable>> {
    if start > end {
        return Err(ProcessError::InvalidRange { start, end }.into());
    }
    let url = downloader.full_url(&format!(
        "{}&startPeriod={}&endPeriod={}",
        csv_url, start, end
    ));

    let Some(body) = fetch_with_retry(downloader, &url, policy)? else {
        return Ok(None);
    };
    let table = RawTable::from_latin1_csv(&body)
        .with_context(|| format!("parsing CSV from {}", url))?;
    debug!(rows = table.num_rows(), columns = table.headers.len(), "downloaded chunk");
    Ok(Some(table))
}
