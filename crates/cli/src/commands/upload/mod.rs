//! Upload Commands
//!
//! Ship a recorded run video somewhere reviewers can open it.

pub mod drive;
pub mod slack;

use anyhow::{Context, Result};
use clap::Subcommand;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use tokio_util::io::ReaderStream;

#[derive(Subcommand, Debug)]
pub enum UploadCommands {
    /// Upload to a shared Google Drive folder
    Drive(drive::DriveArgs),

    /// Upload straight into a Slack channel
    Slack(slack::SlackArgs),
}

pub async fn execute(cmd: UploadCommands) -> Result<()> {
    match cmd {
        UploadCommands::Drive(args) => drive::execute(args).await,
        UploadCommands::Slack(args) => slack::execute(args).await,
    }
}

/// An opened file ready to be streamed into a request body.
pub struct UploadFile {
    pub name: String,
    pub len: u64,
    pub mime: &'static str,
    file: tokio::fs::File,
}

impl UploadFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let len = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        Ok(Self {
            mime: mime_for(&name),
            name,
            len,
            file,
        })
    }

    /// File contents as chunks, never fully buffered.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
        ReaderStream::new(self.file).map(|chunk| chunk.map(|bytes| bytes.to_vec()))
    }

    /// Surround the streamed contents with fixed leading and trailing bytes.
    pub fn into_framed_stream(
        self,
        head: Vec<u8>,
        tail: Vec<u8>,
    ) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
        stream::once(async move { Ok(head) })
            .chain(self.into_stream())
            .chain(stream::once(async move { Ok(tail) }))
    }
}

pub fn mime_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("png") => "image/png",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("run.webm", "video/webm")]
    #[test_case("RUN.MP4", "video/mp4")]
    #[test_case("playwright-report.zip", "application/zip")]
    #[test_case("trace", "application/octet-stream")]
    fn test_mime_for(name: &str, expected: &str) {
        assert_eq!(mime_for(name), expected);
    }

    #[tokio::test]
    async fn test_framed_stream_wraps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.webm");
        std::fs::write(&path, b"frames").unwrap();

        let file = UploadFile::open(&path).await.unwrap();
        assert_eq!(file.name, "video.webm");
        assert_eq!(file.len, 6);
        assert_eq!(file.mime, "video/webm");

        let chunks: Vec<Vec<u8>> = file
            .into_framed_stream(b"<".to_vec(), b">".to_vec())
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"<frames>");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let err = UploadFile::open(Path::new("/nonexistent/video.webm")).await.err().unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/video.webm"));
    }
}
