use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVideo {
    pub title: String,
    pub thumbnail_url: String,
    pub streams: Vec<StreamInfo>,
}

/// One selectable encoding of a video, as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: String,
    /// Label such as `720p`; absent for audio-only encodings.
    pub resolution: Option<String>,
    /// Container extension without the leading dot.
    pub extension: String,
    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamInfo {
    pub fn is_progressive(&self) -> bool {
        self.has_video && self.has_audio
    }

    pub fn is_progressive_mp4(&self) -> bool {
        self.is_progressive() && self.extension.eq_ignore_ascii_case("mp4")
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0}")]
    Launch(String),
    #[error("{0}")]
    Failed(String),
    #[error("could not read resolver output: {0}")]
    InvalidOutput(String),
}

/// Turns a video page URL into metadata and downloadable streams.
#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo, ResolveError>;

    /// Writes the bytes of `stream` to `destination`, replacing any existing file.
    async fn fetch(
        &self,
        url: &str,
        stream: &StreamInfo,
        destination: &Path,
    ) -> Result<(), ResolveError>;
}

pub fn progressive_mp4_resolutions(streams: &[StreamInfo]) -> Vec<String> {
    streams
        .iter()
        .filter(|stream| stream.is_progressive_mp4())
        .filter_map(|stream| stream.resolution.clone())
        .collect()
}

pub fn select_progressive_mp4<'a>(
    streams: &'a [StreamInfo],
    resolution: &str,
) -> Option<&'a StreamInfo> {
    streams.iter().find(|stream| {
        stream.is_progressive_mp4() && stream.resolution.as_deref() == Some(resolution)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: &str, resolution: Option<&str>, ext: &str, video: bool, audio: bool) -> StreamInfo {
        StreamInfo {
            id: id.to_string(),
            resolution: resolution.map(ToString::to_string),
            extension: ext.to_string(),
            has_video: video,
            has_audio: audio,
        }
    }

    fn sample_streams() -> Vec<StreamInfo> {
        vec![
            stream("18", Some("360p"), "mp4", true, true),
            stream("137", Some("1080p"), "mp4", true, false),
            stream("140", None, "m4a", false, true),
            stream("43", Some("360p"), "webm", true, true),
            stream("22", Some("720p"), "mp4", true, true),
            stream("18b", Some("360p"), "mp4", true, true),
        ]
    }

    #[test]
    fn resolutions_keep_resolver_order_and_duplicates() {
        assert_eq!(
            progressive_mp4_resolutions(&sample_streams()),
            vec!["360p", "720p", "360p"]
        );
    }

    #[test]
    fn resolutions_empty_without_progressive_mp4() {
        let streams = vec![
            stream("137", Some("1080p"), "mp4", true, false),
            stream("43", Some("360p"), "webm", true, true),
        ];
        assert!(progressive_mp4_resolutions(&streams).is_empty());
    }

    #[test]
    fn select_takes_first_match() {
        let streams = sample_streams();
        let selected = select_progressive_mp4(&streams, "360p").unwrap();
        assert_eq!(selected.id, "18");
    }

    #[test]
    fn select_ignores_adaptive_and_non_mp4_streams() {
        let streams = sample_streams();
        assert!(select_progressive_mp4(&streams, "1080p").is_none());
        assert!(select_progressive_mp4(&streams, "720").is_none());
        assert_eq!(select_progressive_mp4(&streams, "720p").unwrap().id, "22");
    }

    #[test]
    fn error_display_is_the_underlying_message() {
        let error = ResolveError::Failed("ERROR: Video unavailable".to_string());
        assert_eq!(error.to_string(), "ERROR: Video unavailable");
    }
}
