use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    resolver::{ResolveError, VideoResolver, progressive_mp4_resolutions, select_progressive_mp4},
    storage::{DownloadDir, VIDEO_EXTENSION, video_filename},
};

const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const CLEANUP_FAILURE_MESSAGE: &str = "Error while cleaning up files";

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<dyn VideoResolver>,
    pub downloads: DownloadDir,
}

#[derive(Debug, Deserialize)]
pub struct VideoInfoQuery {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: String,
    resolution: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoInfoResponse {
    title: String,
    thumbnail_url: String,
    resolutions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The URL could not be resolved or no stream matched the request.
    ResolutionFailure(String),
    /// Listing or deleting downloaded files failed.
    CleanupFailure,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::ResolutionFailure(_) => StatusCode::BAD_REQUEST,
            Self::CleanupFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::ResolutionFailure(message) => message,
            Self::CleanupFailure => CLEANUP_FAILURE_MESSAGE,
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        Self::ResolutionFailure(error.to_string())
    }
}

// A malformed or incomplete query leaves nothing to resolve.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::ResolutionFailure(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.message().to_string(),
        });
        (self.status(), body).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/video_info/", get(get_video_info))
        .route("/video_info", get(get_video_info))
        .route("/download/", get(download_video))
        .route("/download", get(download_video))
        .route("/clean/", get(clean_up))
        .route("/clean", get(clean_up))
        .with_state(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
}

// Any origin, method and header, with credentials. Wildcards are not allowed
// alongside credentials, so the request values are echoed back instead.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([CONTENT_DISPOSITION])
}

async fn read_root() -> Json<MessageBody> {
    Json(MessageBody {
        message: "Welcome to YouTube Downloader API",
    })
}

async fn get_video_info(
    State(state): State<AppState>,
    query: Result<Query<VideoInfoQuery>, QueryRejection>,
) -> Result<Json<VideoInfoResponse>, ApiError> {
    let Query(query) = query?;
    let video = state.resolver.resolve(&query.url).await.map_err(|error| {
        warn!("could not resolve {:?}: {error}", query.url);
        ApiError::from(error)
    })?;

    let resolutions = progressive_mp4_resolutions(&video.streams);
    if resolutions.is_empty() {
        return Err(ApiError::ResolutionFailure(
            "No progressive streams available".to_string(),
        ));
    }

    Ok(Json(VideoInfoResponse {
        title: video.title,
        thumbnail_url: video.thumbnail_url,
        resolutions,
    }))
}

async fn download_video(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let video = state.resolver.resolve(&query.url).await.map_err(|error| {
        warn!("could not resolve {:?}: {error}", query.url);
        ApiError::from(error)
    })?;

    let stream = select_progressive_mp4(&video.streams, &query.resolution).ok_or_else(|| {
        ApiError::ResolutionFailure("Resolution not available".to_string())
    })?;

    let filename = video_filename(&video.title);
    let path = state.downloads.path_for(&video.title);
    info!(
        "fetching stream {} ({}) of {:?} into {:?}",
        stream.id, query.resolution, query.url, path
    );

    state
        .resolver
        .fetch(&query.url, stream, &path)
        .await
        .map_err(|error| {
            warn!("could not fetch {:?} at {}: {error}", query.url, query.resolution);
            ApiError::from(error)
        })?;

    let (file, length) = state.downloads.open(&path).await.map_err(|error| {
        ApiError::ResolutionFailure(format!("Downloaded file could not be opened: {error}"))
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(VIDEO_CONTENT_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

async fn clean_up(State(state): State<AppState>) -> Result<Json<MessageBody>, ApiError> {
    let removed = state
        .downloads
        .remove_with_suffix(VIDEO_EXTENSION)
        .await
        .map_err(|error| {
            warn!(
                "could not clean up {:?}: {error}",
                state.downloads.root()
            );
            ApiError::CleanupFailure
        })?;

    info!("removed {removed} downloaded file(s)");
    Ok(Json(MessageBody {
        message: "Temporary files cleaned.",
    }))
}

fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() || compact == VIDEO_EXTENSION {
        format!("video{VIDEO_EXTENSION}")
    } else {
        compact.to_string()
    }
}
