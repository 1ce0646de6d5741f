use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs::File;

pub const VIDEO_EXTENSION: &str = ".mp4";

const UNSAFE_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Flat directory holding every materialized download.
///
/// The directory listing is the only inventory; nothing else tracks which
/// files exist. Handlers go through this type instead of touching the
/// filesystem directly.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    root: PathBuf,
}

impl DownloadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Target path for a video title. Titles that sanitize to the same name
    /// share a path, so a later download replaces the earlier file.
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.root.join(video_filename(title))
    }

    pub async fn open(&self, path: &Path) -> io::Result<(File, u64)> {
        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        Ok((file, length))
    }

    pub async fn list_with_suffix(&self, suffix: &str) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut matches = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix))
            {
                matches.push(entry.path());
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Deletes every entry whose name ends with `suffix`. Stops at the first
    /// failure; files removed before it stay removed.
    pub async fn remove_with_suffix(&self, suffix: &str) -> io::Result<usize> {
        let targets = self.list_with_suffix(suffix).await?;
        for path in &targets {
            tokio::fs::remove_file(path).await?;
        }
        Ok(targets.len())
    }
}

pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|character| {
            if UNSAFE_FILENAME_CHARS.contains(&character) {
                '_'
            } else {
                character
            }
        })
        .collect()
}

pub fn video_filename(title: &str) -> String {
    format!("{}{VIDEO_EXTENSION}", sanitize_filename(title))
}
