//! HTTP plumbing shared by the explorer and Stacks node clients.

use std::time::Duration;

use reqwest::{Response, Url};
use tracing::{debug, trace};

use crate::error::{ApiError, CoreError};

pub(crate) fn build_client() -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(8)
        .tcp_nodelay(true)
        .build()
        .map_err(ApiError::Transport)
}

/// Validate an HTTP(S) base URL and strip any trailing slash so paths can
/// be appended with `format!("{base}/...")`.
pub fn parse_base_url(url: &str) -> Result<String, CoreError> {
    let parsed = Url::parse(url).map_err(|e| {
        CoreError::InvalidConfig(format!("invalid URL `{url}`: expected HTTP(S) URL ({e})"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(url.trim_end_matches('/').to_owned()),
        other => Err(CoreError::InvalidConfig(format!(
            "unsupported URL scheme `{other}`; expected http or https"
        ))),
    }
}

/// Read the body of `response`, turning non-2xx statuses into
/// [`ApiError::Status`].
pub(crate) async fn read_body(url: &str, response: Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    debug!(%url, %status, body_len = body.len(), "http response");
    trace!(%url, body = %body, "http response body");

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: body.trim().to_owned(),
        });
    }
    Ok(body)
}
