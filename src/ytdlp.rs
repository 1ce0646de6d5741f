use std::{io::ErrorKind, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::resolver::{ResolveError, ResolvedVideo, StreamInfo, VideoResolver};

/// Resolver backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
}

#[derive(Debug, Deserialize)]
struct YtDlpVideoInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: Vec<String>) -> Result<std::process::Output, ResolveError> {
        debug!("running {} {:?}", self.bin, args);
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ResolveError::Launch(format!("yt-dlp executable not found: {}", self.bin))
                } else {
                    ResolveError::Launch(format!("could not run yt-dlp: {error}"))
                }
            })?;

        if !output.status.success() {
            return Err(ResolveError::Failed(run_error_message(&output.stderr)));
        }

        Ok(output)
    }
}

#[async_trait]
impl VideoResolver for YtDlp {
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo, ResolveError> {
        let output = self.run(resolve_args(url)).await?;

        parse_video_info(&output.stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        stream: &StreamInfo,
        destination: &Path,
    ) -> Result<(), ResolveError> {
        self.run(fetch_args(url, stream, destination)).await?;
        Ok(())
    }
}

fn parse_video_info(stdout: &[u8]) -> Result<ResolvedVideo, ResolveError> {
    let info: YtDlpVideoInfo = serde_json::from_slice(stdout)
        .map_err(|error| ResolveError::InvalidOutput(error.to_string()))?;

    Ok(ResolvedVideo {
        title: info.title.unwrap_or_default(),
        thumbnail_url: info.thumbnail.unwrap_or_default(),
        streams: info.formats.iter().map(stream_info).collect(),
    })
}

fn stream_info(format: &YtDlpFormat) -> StreamInfo {
    StreamInfo {
        id: format.format_id.clone(),
        resolution: format.height.map(|height| format!("{height}p")),
        extension: format.ext.clone().unwrap_or_default(),
        has_video: has_video(format),
        has_audio: has_audio(format),
    }
}

// The URL comes from the request; `--` keeps yt-dlp from parsing it as an option.
fn resolve_args(url: &str) -> Vec<String> {
    vec![
        "-J".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

fn fetch_args(url: &str, stream: &StreamInfo, destination: &Path) -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--no-part".to_string(),
        "--force-overwrites".to_string(),
        "-f".to_string(),
        stream.id.clone(),
        "-o".to_string(),
        escape_output_template(&destination.to_string_lossy()),
        "--".to_string(),
        url.to_string(),
    ]
}

// `-o` takes an output template, so a literal `%` must be doubled.
fn escape_output_template(path: &str) -> String {
    path.replace('%', "%%")
}

fn run_error_message(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp could not complete the operation")
        .to_string()
}

fn has_video(format: &YtDlpFormat) -> bool {
    matches!(format.vcodec.as_deref(), Some(value) if value != "none")
}

fn has_audio(format: &YtDlpFormat) -> bool {
    matches!(format.acodec.as_deref(), Some(value) if value != "none")
}
