use anyhow::{Context, Result, bail};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::debug;

const BOT_USER_AGENT: &str = concat!("DiscordBot (ovi-tracker, ", env!("CARGO_PKG_VERSION"), ")");

/// Authenticated client for the Discord REST API.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
}

impl RestClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .context("bot token contains invalid header characters")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static(BOT_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build Discord HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Post `content` to a channel with one attached file.
    pub async fn send_file_with_message(
        &self,
        channel_id: &str,
        content: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        let payload = json!({
            "content": content,
            "attachments": [{ "id": 0, "filename": file_name }],
        });

        let file = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", file);

        let resp = self.http.post(&url).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Discord API returned {status}: {body}");
        }
        debug!("Posted message with {file_name} to channel {channel_id}");
        Ok(())
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
