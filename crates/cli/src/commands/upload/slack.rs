//! Slack file upload

use anyhow::{bail, Context, Result};
use clap::Args;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::UploadFile;
use crate::github::write_outputs;
use crate::output::print_success;

const SLACK_API: &str = "https://slack.com/api";

#[derive(Args, Debug)]
pub struct SlackArgs {
    /// File to upload
    #[arg(long = "file", env = "FILE_NAME")]
    pub file: PathBuf,

    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, env = "SLACK_CHANNEL")]
    pub channel: Option<String>,

    /// Defaults to the file name
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, default_value = "🎥 E2E test recording")]
    pub comment: String,

    #[arg(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    file: Option<SlackFile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlackFile {
    pub id: String,
    pub permalink: String,
}

pub struct SlackUploader {
    http: reqwest::Client,
    api: String,
    token: String,
}

impl SlackUploader {
    pub fn new(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self::with_api(http, token, SLACK_API)
    }

    pub fn with_api(http: reqwest::Client, token: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            http,
            api: api.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// POST `files.upload` with the file streamed as the `file` part.
    pub async fn upload(&self, path: &Path, channel: &str, title: Option<&str>, comment: &str) -> Result<SlackFile> {
        let file = UploadFile::open(path).await?;
        let title = title.map(str::to_string).unwrap_or_else(|| file.name.clone());
        info!("Uploading {} ({} bytes) to Slack channel {}", file.name, file.len, channel);

        let name = file.name.clone();
        let mime = file.mime;
        let len = file.len;
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(file.into_stream()), len)
            .file_name(name)
            .mime_str(mime)?;
        let form = Form::new()
            .text("channels", channel.to_string())
            .text("title", title)
            .text("initial_comment", comment.to_string())
            .part("file", part);

        let resp = self
            .http
            .post(format!("{}/files.upload", self.api))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .context("Slack upload request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("Slack upload failed: {}", body);
            bail!("Slack upload failed ({}): {}", status, body);
        }

        // Slack reports API errors with a 200 and ok=false
        let parsed: UploadResponse =
            serde_json::from_str(&body).with_context(|| format!("unexpected Slack response: {}", body))?;
        if !parsed.ok {
            error!("Slack upload failed: {}", body);
            bail!("Slack upload failed: {}", parsed.error.unwrap_or_else(|| body.clone()));
        }
        parsed.file.with_context(|| format!("Slack response has no file: {}", body))
    }
}

pub async fn execute(args: SlackArgs) -> Result<()> {
    let token = args
        .token
        .filter(|t| !t.trim().is_empty())
        .context("SLACK_BOT_TOKEN is not set")?;
    let channel = args
        .channel
        .filter(|c| !c.trim().is_empty())
        .context("SLACK_CHANNEL is not set")?;

    let uploader = SlackUploader::new(reqwest::Client::new(), token);
    let file = uploader
        .upload(&args.file, &channel, args.title.as_deref(), &args.comment)
        .await?;

    write_outputs(
        args.github_output.as_deref(),
        &[("slack_file_url", file.permalink.as_str()), ("slack_file_id", file.id.as_str())],
    )?;
    print_success(&format!("Uploaded to Slack: {}", file.permalink));
    Ok(())
}
