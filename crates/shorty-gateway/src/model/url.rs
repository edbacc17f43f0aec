use serde::{Deserialize, Serialize};
use shorty_core::UrlRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlRequest {
    pub long_url: String,
    #[serde(default)]
    pub custom_short_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrlResponse {
    pub short_code: String,
    pub short_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectResponse {
    pub redirect_url: String,
}

/// `shortUrl` carries the short code, not the rendered URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlRequest {
    pub short_url: String,
    pub new_long_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlEntry {
    pub short_code: String,
    pub long_url: String,
    pub click_count: u64,
}

impl From<UrlRecord> for UrlEntry {
    fn from(record: UrlRecord) -> Self {
        Self {
            short_code: record.short_code.to_string(),
            long_url: record.long_url,
            click_count: record.click_count,
        }
    }
}
