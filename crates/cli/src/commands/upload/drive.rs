//! Google Drive upload via a service account

use anyhow::{bail, Context, Result};
use clap::Args;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::UploadFile;
use crate::github::write_outputs;
use crate::output::print_success;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Args, Debug)]
pub struct DriveArgs {
    /// File to upload
    #[arg(long = "file", env = "FILE_NAME")]
    pub file: PathBuf,

    /// Service account key, inline JSON or a path to the key file
    #[arg(long, env = "GOOGLE_DRIVE_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    #[arg(long, env = "GOOGLE_DRIVE_FOLDER_ID")]
    pub folder_id: Option<String>,

    #[arg(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccount {
    /// Accepts the key JSON itself or a path to it.
    pub fn load(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let raw = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            std::fs::read_to_string(trimmed).with_context(|| format!("reading service account key {}", trimmed))?
        };
        serde_json::from_str(&raw).context("GOOGLE_DRIVE_CREDENTIALS is not a service account key")
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// RS256 assertion for the JWT bearer grant.
pub fn sign_assertion(account: &ServiceAccount, now: i64) -> Result<String> {
    let claims = AssertionClaims {
        iss: account.client_email.clone(),
        scope: DRIVE_SCOPE.to_string(),
        aud: account.token_uri.clone(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).context("invalid service account private key")?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub api: String,
    pub upload: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api: "https://www.googleapis.com/drive/v3".to_string(),
            upload: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveLinks {
    pub web_view_link: String,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

pub struct DriveClient {
    http: reqwest::Client,
    endpoints: DriveEndpoints,
    access_token: String,
}

impl DriveClient {
    /// Exchange a signed assertion for an access token.
    pub async fn authenticate(http: reqwest::Client, account: &ServiceAccount, endpoints: DriveEndpoints) -> Result<Self> {
        let assertion = sign_assertion(account, chrono::Utc::now().timestamp())?;
        let resp = http
            .post(&account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("token exchange failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Token exchange failed: {}", body);
            bail!("token exchange failed ({}): {}", status, body);
        }

        let token: TokenResponse = resp.json().await.context("token response parse failed")?;
        debug!("Authenticated as {}", account.client_email);
        Ok(Self {
            http,
            endpoints,
            access_token: token.access_token,
        })
    }

    /// Multipart upload with the file streamed after the metadata part.
    pub async fn upload(&self, path: &Path, folder_id: &str) -> Result<DriveFile> {
        let file = UploadFile::open(path).await?;
        let boundary = format!("lumimeds-{}", chrono::Utc::now().timestamp_millis());
        let metadata = json!({ "name": file.name, "parents": [folder_id] });
        let head = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = metadata,
            mime = file.mime,
        );
        let tail = format!("\r\n--{}--\r\n", boundary);
        let content_length = head.len() as u64 + file.len + tail.len() as u64;

        info!("Uploading {} ({} bytes) to Drive folder {}", file.name, file.len, folder_id);
        let body = reqwest::Body::wrap_stream(file.into_framed_stream(head.into_bytes(), tail.into_bytes()));
        let resp = self
            .http
            .post(format!("{}/files", self.endpoints.upload))
            .query(&[("uploadType", "multipart"), ("supportsAllDrives", "true"), ("fields", "id,name")])
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .context("upload request failed")?;

        parse_response(resp, "upload").await
    }

    /// Anyone with the link can view.
    pub async fn share_publicly(&self, file_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/files/{}/permissions", self.endpoints.api, file_id))
            .query(&[("supportsAllDrives", "true")])
            .bearer_auth(&self.access_token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .context("permission request failed")?;
        let _: serde_json::Value = parse_response(resp, "permission").await?;
        Ok(())
    }

    pub async fn links(&self, file_id: &str) -> Result<DriveLinks> {
        let resp = self
            .http
            .get(format!("{}/files/{}", self.endpoints.api, file_id))
            .query(&[("fields", "webViewLink,webContentLink"), ("supportsAllDrives", "true")])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("link lookup failed")?;
        parse_response(resp, "link lookup").await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        error!("Drive {} failed: {}", what, body);
        bail!("Drive {} failed ({}): {}", what, status, body);
    }
    serde_json::from_str(&body).with_context(|| format!("Drive {} response parse failed", what))
}

pub async fn execute(args: DriveArgs) -> Result<()> {
    let credentials = args
        .credentials
        .filter(|c| !c.trim().is_empty())
        .context("GOOGLE_DRIVE_CREDENTIALS is not set")?;
    let folder_id = args
        .folder_id
        .filter(|f| !f.trim().is_empty())
        .context("GOOGLE_DRIVE_FOLDER_ID is not set")?;
    let account = ServiceAccount::load(&credentials)?;

    let client = DriveClient::authenticate(reqwest::Client::new(), &account, DriveEndpoints::default()).await?;
    let file = client.upload(&args.file, &folder_id).await?;
    client.share_publicly(&file.id).await?;
    let links = client.links(&file.id).await?;

    let download_url = links.web_content_link.clone().unwrap_or_default();
    write_outputs(
        args.github_output.as_deref(),
        &[
            ("file_id", file.id.as_str()),
            ("view_url", links.web_view_link.as_str()),
            ("download_url", download_url.as_str()),
        ],
    )?;

    print_success(&format!(
        "Uploaded {} to Google Drive: {}",
        file.name.as_deref().unwrap_or(&file.id),
        links.web_view_link
    ));
    Ok(())
}
