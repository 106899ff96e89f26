use axum::{
    Extension,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use vidtube_db::models::NewVideo;
use vidtube_media::{ResourceKind, asset_ref_from_url};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};
use crate::response::respond;
use crate::uploads::MultipartForm;

/// POST /videos/create: multipart `videoFile`, `thumbnail`, `title`, `description`.
pub async fn create_video(
    State(state): State<AppState>,
    Extension(CurrentUser(owner)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form =
        MultipartForm::read(multipart, &state.settings.temp_dir, &["videoFile", "thumbnail"]).await?;

    let (Some(title), Some(description)) = (form.text("title"), form.text("description")) else {
        return Err(ApiError::invalid("Title and description are required"));
    };
    let title = title.to_string();
    let description = description.to_string();

    let (Some(video_file), Some(thumbnail_file)) =
        (form.take_file("videoFile"), form.take_file("thumbnail"))
    else {
        return Err(ApiError::invalid("Video file and thumbnail are required"));
    };

    let video = state
        .media
        .upload(Some(video_file.path()))
        .await
        .ok_or_else(|| ApiError::invalid("Video file upload failed"))?;

    let Some(thumbnail) = state.media.upload(Some(thumbnail_file.path())).await else {
        state.media.compensate(&[&video]).await;
        return Err(ApiError::invalid("Thumbnail upload failed"));
    };

    let video_url = video.url.clone();
    let thumbnail_url = thumbnail.url.clone();
    let duration = video.duration.unwrap_or(0.0);
    let owner_id = owner.id.clone();
    let created = run_db(&state, move |db| {
        let id = Uuid::new_v4().to_string();
        db.create_video(&NewVideo {
            id: &id,
            video_file: &video_url,
            thumbnail: &thumbnail_url,
            title: &title,
            description: &description,
            duration,
            is_published: true,
            owner_id: &owner_id,
        })?;
        db.get_video_with_owner(&id)?
            .ok_or_else(|| anyhow::anyhow!("Video {} missing right after insert", id))
    })
    .await;

    match created {
        Ok(created) => {
            info!("User {} uploaded video {}", owner.username, created.id);
            Ok(respond(StatusCode::CREATED, created, "Video uploaded successfully"))
        }
        Err(err) => {
            error!("Video creation failed: {}", err);
            state.media.compensate(&[&video, &thumbnail]).await;
            Err(ApiError::internal(
                "Something went wrong while creating the video and deleted the uploads",
            ))
        }
    }
}

/// DELETE /videos/delete/{id}
///
/// The row goes first. Each remote asset then gets exactly one delete
/// attempt, and a failure on the thumbnail doesn't skip the video.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (deleted, row) = run_db(&state, move |db| {
        let row = db.get_video(&id)?;
        let deleted = match &row {
            Some(row) => db.delete_video(&row.id)?,
            None => 0,
        };
        Ok((deleted, row))
    })
    .await?;

    let Some(video) = row.filter(|_| deleted > 0) else {
        return Err(ApiError::not_found("Video not found"));
    };

    let thumbnail = asset_ref_from_url(&video.thumbnail);
    let file = asset_ref_from_url(&video.video_file);

    for (asset, fallback, url) in [
        (thumbnail, ResourceKind::Image, &video.thumbnail),
        (file, ResourceKind::Video, &video.video_file),
    ] {
        match asset {
            Some(asset) => {
                let kind = asset.kind.unwrap_or(fallback);
                if !state.media.delete(Some(&asset.public_id), kind).await {
                    warn!("Asset {} of deleted video {} may be orphaned", asset.public_id, video.id);
                }
            }
            None => warn!("Cannot derive public id from {}", url),
        }
    }

    info!("Deleted video {}", video.id);
    Ok(respond(StatusCode::OK, json!({}), "Video deleted successfully"))
}
