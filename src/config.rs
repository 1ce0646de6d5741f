use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub download_dir: PathBuf,
    pub yt_dlp_bin: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name).and_then(|value| non_empty(&value).map(ToString::to_string))
        };

        let bind_addr = read("APP_ADDR")
            .or_else(|| {
                read("PORT")
                    .and_then(|value| value.parse::<u16>().ok())
                    .map(|port| format!("0.0.0.0:{port}"))
            })
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Self {
            bind_addr,
            download_dir: read("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            yt_dlp_bin: read("YT_DLP_BIN").unwrap_or_else(|| DEFAULT_YT_DLP_BIN.to_string()),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
