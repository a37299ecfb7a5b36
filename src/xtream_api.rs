// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (xtream-dash)";

fn deserialize_number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("Expected string or number")),
    }
}

fn deserialize_optional_number_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    // Anything that isn't text or a number is treated as absent
    match value {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}

fn deserialize_flexible_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("Number out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| D::Error::custom(format!("Expected numeric string, got {:?}", s))),
        Value::Null => Ok(0),
        _ => Err(D::Error::custom("Expected number or numeric string")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub user_info: UserInfo,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_u32")]
    pub auth: u32,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub exp_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub active_cons: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub max_connections: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub port: Option<String>,
    #[serde(default)]
    pub server_protocol: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub time_now: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub parent_id: Option<Value>,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.category_name)
    }
}

/// Live channel or VOD entry as returned by `get_live_streams` / `get_vod_streams`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub num: Option<Value>,
    pub name: String,
    #[serde(default)]
    pub stream_type: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_u32")]
    pub stream_id: u32,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub added: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tv_archive: Option<Value>,
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub rating_5based: Option<Value>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfo {
    #[serde(default)]
    pub num: Option<Value>,
    pub name: String,
    #[serde(deserialize_with = "deserialize_flexible_u32")]
    pub series_id: u32,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(rename = "releaseDate", default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub rating: Option<String>,
    #[serde(default)]
    pub rating_5based: Option<Value>,
    #[serde(default)]
    pub episode_run_time: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    #[serde(default)]
    pub releasedate: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default, rename = "durationSecs")]
    pub duration_secs: Option<Value>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub movie_image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEpisode {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_flexible_u32")]
    pub episode_num: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
    // Some panels send `[]` instead of an object when there is no info
    #[serde(default, deserialize_with = "deserialize_episode_info")]
    pub info: Option<EpisodeInfo>,
    #[serde(default, deserialize_with = "deserialize_flexible_u32")]
    pub season: u32,
}

fn deserialize_episode_info<'de, D>(deserializer: D) -> Result<Option<EpisodeInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfoResponse {
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub seasons: Vec<Value>,
    #[serde(default)]
    pub episodes: Option<HashMap<String, Vec<ApiEpisode>>>,
}

/// One listing from `get_short_epg`. Title and description are usually base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgListing {
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub epg_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub channel_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub start_timestamp: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub stop_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortEpgResponse {
    #[serde(default)]
    pub epg_listings: Vec<EpgListing>,
}

#[derive(Debug, Clone)]
pub struct XTreamAPI {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    progress: MultiProgress,
}

impl XTreamAPI {
    pub fn new(server_url: String, username: String, password: String) -> Result<Self> {
        let base_url = normalize_base_url(&server_url)?;

        Ok(Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(USER_AGENT)
                .build()?,
            base_url,
            username,
            password,
            progress: MultiProgress::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, action: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}/player_api.php?username={}&password={}&action={}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            urlencoding::encode(action)
        );

        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }

        url
    }

    /// Fetch an action and return the JSON body untouched
    pub async fn make_request_raw(&self, action: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.api_url(action, params);

        debug!(
            "Requesting action {} from {} with params {:?}",
            action, self.base_url, params
        );

        let pb = self.spinner(action);
        let body = self.fetch_body(&url, action, &pb).await;
        pb.finish_and_clear();
        self.progress.remove(&pb);

        let response_bytes = body?;
        debug!("{} response size: {} bytes", action, response_bytes.len());

        let response_text = String::from_utf8(response_bytes)
            .with_context(|| "Failed to convert response to UTF-8 string")?;

        let json = parse_response(action, &response_text)?;
        check_auth(&json)?;
        Ok(json)
    }

    /// Spinner on its own line of the shared progress display, so requests
    /// running side by side don't draw over each other
    fn spinner(&self, action: &str) -> ProgressBar {
        let pb = self.progress.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}] {bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Requesting {}...", action));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    async fn fetch_body(&self, url: &str, action: &str, pb: &ProgressBar) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", action, self.base_url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "HTTP request for {} failed with status: {}",
                action,
                response.status()
            ));
        }

        let mut response_bytes = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = futures_util::StreamExt::next(&mut stream).await {
            let chunk = chunk_result.with_context(|| "Failed to read response chunk")?;
            response_bytes.extend_from_slice(&chunk);
            pb.set_position(response_bytes.len() as u64);
        }

        Ok(response_bytes)
    }

    async fn make_request<T>(&self, action: &str, params: &[(&str, String)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let json = self.make_request_raw(action, params).await?;
        serde_json::from_value(json)
            .with_context(|| format!("Unexpected response shape for {}", action))
    }

    pub async fn get_user_info(&self) -> Result<UserInfo> {
        let response: UserInfoResponse = self.make_request("get_user_info", &[]).await?;
        Ok(response.user_info)
    }

    pub async fn get_live_categories(&self) -> Result<Vec<Category>> {
        self.make_list("get_live_categories", &[]).await
    }

    pub async fn get_vod_categories(&self) -> Result<Vec<Category>> {
        self.make_list("get_vod_categories", &[]).await
    }

    pub async fn get_series_categories(&self) -> Result<Vec<Category>> {
        self.make_list("get_series_categories", &[]).await
    }

    pub async fn get_live_streams(&self, category_id: Option<&str>) -> Result<Vec<Stream>> {
        self.make_list("get_live_streams", &category_param(category_id))
            .await
    }

    pub async fn get_vod_streams(&self, category_id: Option<&str>) -> Result<Vec<Stream>> {
        self.make_list("get_vod_streams", &category_param(category_id))
            .await
    }

    pub async fn get_series(&self, category_id: Option<&str>) -> Result<Vec<SeriesInfo>> {
        self.make_list("get_series", &category_param(category_id))
            .await
    }

    pub async fn get_series_info(&self, series_id: u32) -> Result<SeriesInfoResponse> {
        self.make_request("get_series_info", &[("series_id", series_id.to_string())])
            .await
    }

    pub async fn get_short_epg(&self, stream_id: u32, limit: Option<u32>) -> Result<Vec<EpgListing>> {
        let mut params = vec![("stream_id", stream_id.to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }

        let json = self.make_request_raw("get_short_epg", &params).await?;
        Ok(parse_short_epg(json))
    }

    /// List endpoints sometimes answer with `{}` or `null` when empty
    async fn make_list<T>(&self, action: &str, params: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let json = self.make_request_raw(action, params).await?;
        parse_list(action, json)
    }

    pub fn get_stream_url(&self, stream_id: u32, stream_type: &str, extension: Option<&str>) -> String {
        let (path, default_ext) = match stream_type {
            "movie" => ("movie", "mp4"),
            "series" => ("series", "mp4"),
            _ => ("live", "m3u8"),
        };
        let ext = extension.unwrap_or(default_ext);

        format!(
            "{}/{}/{}/{}/{}.{}",
            self.base_url,
            path,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            stream_id,
            ext
        )
    }

    pub fn get_episode_stream_url(&self, episode_id: &str, extension: &str) -> String {
        format!(
            "{}/series/{}/{}/{}.{}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            episode_id,
            extension
        )
    }
}

fn category_param(category_id: Option<&str>) -> Vec<(&'static str, String)> {
    category_id
        .map(|id| vec![("category_id", id.to_string())])
        .unwrap_or_default()
}

/// Reduce a configured server URL to `scheme://host[:port]`
pub fn normalize_base_url(server_url: &str) -> Result<String> {
    let url = url::Url::parse(server_url.trim())
        .with_context(|| format!("Invalid server URL: {}", server_url))?;

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Server URL has no host: {}", server_url))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

fn parse_response(action: &str, response_text: &str) -> Result<Value> {
    if response_text.trim().is_empty() {
        return Err(anyhow::anyhow!("Empty response from server for {}", action));
    }

    serde_json::from_str(response_text).map_err(|e| {
        let line_num = e.line();
        let col_num = e.column();

        let mut byte_pos = 0;
        for (i, line_content) in response_text.lines().enumerate() {
            if i + 1 == line_num {
                byte_pos += col_num.saturating_sub(1);
                break;
            }
            byte_pos += line_content.len() + 1;
        }
        let byte_pos = byte_pos.min(response_text.len());

        let mut start = byte_pos.saturating_sub(100);
        while !response_text.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = std::cmp::min(byte_pos + 100, response_text.len());
        while !response_text.is_char_boundary(end) {
            end += 1;
        }

        let error_msg = format!(
            "JSON parsing failed for {} at line {}, column {}:\nContext: ...{}...\nError: {}",
            action,
            line_num,
            col_num,
            response_text[start..end].replace(['\n', '\r'], " "),
            e
        );

        warn!("JSON parsing error: {}", error_msg);
        anyhow::anyhow!(error_msg)
    })
}

// Panels answer bad credentials with HTTP 200 and `user_info.auth == 0`
fn check_auth(json: &Value) -> Result<()> {
    let auth = json
        .get("user_info")
        .and_then(|info| info.get("auth"))
        .and_then(|auth| match auth {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

    if auth == Some(0) {
        anyhow::bail!("Xtream API authentication failed");
    }
    Ok(())
}

fn parse_list<T>(action: &str, json: Value) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    match json {
        Value::Array(items) => {
            let total = items.len();
            let parsed: Vec<T> = items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        debug!("Skipping malformed {} entry: {}", action, e);
                        None
                    }
                })
                .collect();

            if parsed.len() < total {
                warn!(
                    "Skipped {} malformed entries in {} response",
                    total - parsed.len(),
                    action
                );
            }
            Ok(parsed)
        }
        Value::Null => Ok(Vec::new()),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        _ => Err(anyhow::anyhow!("Expected a list in {} response", action)),
    }
}

fn parse_short_epg(json: Value) -> Vec<EpgListing> {
    match serde_json::from_value::<ShortEpgResponse>(json) {
        Ok(response) => response.epg_listings,
        Err(e) => {
            debug!("No usable EPG listings in response: {}", e);
            Vec::new()
        }
    }
}
