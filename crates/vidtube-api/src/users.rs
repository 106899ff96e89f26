use axum::{
    Extension,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use vidtube_db::models::{NewUser, UserDetailsUpdate, UserRow};
use vidtube_media::ResourceKind;
use vidtube_types::api::{ChangePasswordRequest, DeleteResponse, DeleteUserRequest, UpdateDetailsRequest};
use vidtube_types::models::PublicUser;

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::response::{non_blank, parse_json, respond};
use crate::session::{hash_password, verify_password};
use crate::state::{AppState, run_db};
use crate::uploads::MultipartForm;

/// POST /users/register: multipart with `fullname`, `email`, `username`,
/// `password`, an `avatar` file and an optional `coverImage` file.
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let mut form =
        MultipartForm::read(multipart, &state.settings.temp_dir, &["avatar", "coverImage"]).await?;

    let (Some(fullname), Some(email), Some(username), Some(password)) = (
        form.text("fullname"),
        form.text("email"),
        form.text("username"),
        form.raw_text("password"),
    ) else {
        return Err(ApiError::invalid("All fields are required"));
    };
    let fullname = fullname.to_string();
    let email = email.to_lowercase();
    let username = username.to_lowercase();
    let password = password.to_string();

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::invalid("Avatar file is required"))?;
    let cover_file = form.take_file("coverImage");

    let (u, e) = (username.clone(), email.clone());
    let existing = run_db(&state, move |db| db.find_user_by_username_or_email(Some(&u), Some(&e))).await?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with email or username already exists"));
    }

    let avatar = state
        .media
        .upload(Some(avatar_file.path()))
        .await
        .ok_or_else(|| ApiError::invalid("Avatar file upload failed"))?;

    let cover = match cover_file {
        Some(file) => match state.media.upload(Some(file.path())).await {
            Some(asset) => Some(asset),
            None => {
                state.media.compensate(&[&avatar]).await;
                return Err(ApiError::invalid("Cover image upload failed"));
            }
        },
        None => None,
    };

    let avatar_url = avatar.url.clone();
    let cover_url = cover.as_ref().map(|c| c.url.clone());
    let created = run_db(&state, move |db| {
        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(&password)?;
        db.create_user(&NewUser {
            id: &id,
            username: &username,
            email: &email,
            fullname: &fullname,
            password_hash: &password_hash,
            avatar: &avatar_url,
            cover_image: cover_url.as_deref(),
        })?;
        db.get_user_by_id(&id)?
            .ok_or_else(|| anyhow::anyhow!("User {} missing right after insert", id))
    })
    .await;

    match created {
        Ok(user) => {
            info!("Registered user {}", user.username);
            Ok(respond(
                StatusCode::CREATED,
                PublicUser::from(user),
                "User registered successfully",
            ))
        }
        Err(err) => {
            error!("User creation failed: {}", err);
            let uploaded: Vec<_> = std::iter::once(&avatar).chain(cover.as_ref()).collect();
            state.media.compensate(&uploaded).await;

            match err {
                ApiError::Conflict(_) => Err(err),
                _ => Err(ApiError::internal(
                    "Something went wrong while registering the user and deleted the images",
                )),
            }
        }
    }
}

/// DELETE /users/delete: JSON `{_id}`. Remote assets of the user and of
/// their videos are removed best-effort after the rows are gone.
pub async fn delete_user(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let req: DeleteUserRequest = parse_json(&body)?;
    let id = non_blank(req.id.as_deref())
        .ok_or_else(|| ApiError::invalid("Id is missing"))?
        .to_string();

    let (deleted, user, videos) = run_db(&state, move |db| {
        let user = db.get_user_by_id(&id)?;
        let videos = db.list_videos_by_owner(&id)?;
        let deleted = db.delete_user(&id)?;
        Ok((deleted, user, videos))
    })
    .await?;

    let Some(user) = user.filter(|_| deleted > 0) else {
        return Err(ApiError::not_found("User not found"));
    };

    for url in [user.avatar.as_deref(), user.cover_image.as_deref()] {
        state.media.delete_by_url(url, ResourceKind::Image).await;
    }
    for video in &videos {
        state.media.delete_by_url(Some(&video.thumbnail), ResourceKind::Image).await;
        state.media.delete_by_url(Some(&video.video_file), ResourceKind::Video).await;
    }

    info!("Deleted user {} and {} videos", user.username, videos.len());
    Ok(respond(
        StatusCode::OK,
        DeleteResponse { deleted_count: deleted },
        "User deleted successfully",
    ))
}

/// GET /users/getAll
pub async fn get_all_users(State(state): State<AppState>) -> ApiResult<Response> {
    let users: Vec<PublicUser> = run_db(&state, |db| db.list_users())
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    Ok(respond(StatusCode::OK, users, "All users fetched"))
}

/// POST /users/change-password: `{oldPassword, newPassword}`.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Response> {
    let req: ChangePasswordRequest = parse_json(&body)?;
    let (Some(old_password), Some(new_password)) = (
        req.old_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::invalid("Old and new password are required"));
    };

    let id = user.id.clone();
    let stored = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    if !verify_password(&old_password, &stored.password) {
        return Err(ApiError::invalid("Invalid Password"));
    }

    run_db(&state, move |db| {
        let hash = hash_password(&new_password)?;
        db.set_password(&stored.id, &hash)
    })
    .await?;

    Ok(respond(StatusCode::OK, json!({}), "Password changed successfully"))
}

/// GET /users/currentUser
pub async fn current_user(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Response {
    respond(StatusCode::OK, user, "User fetched successfully")
}

/// PATCH /users/update: any of `{username, fullname, email}`.
pub async fn update_details(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Bytes,
) -> ApiResult<Response> {
    let req: UpdateDetailsRequest = parse_json(&body)?;
    let username = non_blank(req.username.as_deref()).map(str::to_lowercase);
    let fullname = non_blank(req.fullname.as_deref()).map(str::to_string);
    let email = non_blank(req.email.as_deref()).map(str::to_lowercase);

    if username.is_none() && fullname.is_none() && email.is_none() {
        return Err(ApiError::invalid("At least one field is required"));
    }

    let updated = run_db(&state, move |db| {
        db.update_user_details(
            &user.id,
            &UserDetailsUpdate {
                username: username.as_deref(),
                fullname: fullname.as_deref(),
                email: email.as_deref(),
            },
        )
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(respond(StatusCode::OK, PublicUser::from(updated), "Account details updated successfully"))
}

#[derive(Debug, Clone, Copy)]
enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn field(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "coverImage",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "Avatar",
            ProfileImage::CoverImage => "Cover image",
        }
    }

    fn current(self, user: &PublicUser) -> Option<String> {
        match self {
            ProfileImage::Avatar => user.avatar.clone(),
            ProfileImage::CoverImage => user.cover_image.clone(),
        }
    }

    fn store(self, db: &vidtube_db::Database, id: &str, url: &str) -> anyhow::Result<Option<UserRow>> {
        match self {
            ProfileImage::Avatar => db.set_avatar(id, url),
            ProfileImage::CoverImage => db.set_cover_image(id, url),
        }
    }
}

/// Upload the replacement, point the user at it, then retire the old asset.
/// The old asset is only touched once the new URL is persisted.
async fn replace_profile_image(
    state: AppState,
    user: PublicUser,
    multipart: Result<Multipart, MultipartRejection>,
    slot: ProfileImage,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart, &state.settings.temp_dir, &[slot.field()]).await?;
    let file = form
        .take_file(slot.field())
        .ok_or_else(|| ApiError::invalid(format!("{} file is missing", slot.label())))?;

    let uploaded = state
        .media
        .upload(Some(file.path()))
        .await
        .ok_or_else(|| ApiError::internal(format!("Failed to upload {}", slot.label().to_lowercase())))?;

    let old_url = slot.current(&user);
    let (id, url) = (user.id.clone(), uploaded.url.clone());
    let updated = match run_db(&state, move |db| slot.store(db, &id, &url)).await {
        Ok(Some(row)) => row,
        outcome => {
            match outcome {
                Err(e) => error!("Persisting new {} failed: {:#}", slot.field(), e),
                _ => error!("User {} vanished before the {} update", user.id, slot.field()),
            }
            state.media.compensate(&[&uploaded]).await;
            return Err(ApiError::internal(format!(
                "Something went wrong while updating the {}",
                slot.label().to_lowercase()
            )));
        }
    };

    if old_url.as_deref().is_some_and(|old| old != uploaded.url) {
        state.media.delete_by_url(old_url.as_deref(), ResourceKind::Image).await;
    }

    Ok(respond(
        StatusCode::OK,
        PublicUser::from(updated),
        &format!("{} updated successfully", slot.label()),
    ))
}

/// PATCH /users/update-avatar: multipart single file `avatar`.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    replace_profile_image(state, user, multipart, ProfileImage::Avatar).await
}

/// PATCH /users/update-cover: multipart single file `coverImage`.
pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    replace_profile_image(state, user, multipart, ProfileImage::CoverImage).await
}

/// GET /users/channel/{username}
pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> ApiResult<Response> {
    let username = non_blank(Some(&username))
        .ok_or_else(|| ApiError::invalid("Username is missing"))?
        .to_lowercase();

    let channel = run_db(&state, move |db| db.get_channel_profile(&username, &viewer.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(respond(StatusCode::OK, channel, "User channel fetched successfully"))
}

/// GET /users/history
pub async fn watch_history(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let history = run_db(&state, move |db| db.get_watch_history(&user.id)).await?;
    Ok(respond(StatusCode::OK, history, "Watch history fetched successfully"))
}
