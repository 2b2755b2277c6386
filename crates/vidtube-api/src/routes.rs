use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header::X_CONTENT_TYPE_OPTIONS},
    middleware,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};

use crate::error::ApiError;
use crate::media::MEDIA_ROUTE;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{
    account, auth, comments, dashboard, healthcheck, likes, playlists, subscriptions, users, videos,
};

pub const API_PREFIX: &str = "/api/v1";

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// The full application: JSON API under `/api/v1`, uploaded media under `/media`.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthcheck", get(healthcheck::healthcheck))
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .route("/users/refresh-token", post(auth::refresh_token))
        .route("/users/verify-email/{token}", post(account::verify_email))
        .route("/users/resend-verification", post(account::resend_verification))
        .route("/users/forgot-password", post(account::forgot_password))
        .route("/users/reset-password/{token}", post(account::reset_password));

    let protected = Router::new()
        // Users
        .route("/users/logout", post(auth::logout))
        .route("/users/change-password", post(auth::change_password))
        .route("/users/current-user", get(users::current_user))
        .route("/users/update-account", patch(users::update_account))
        .route("/users/avatar", patch(users::update_avatar))
        .route("/users/cover-image", patch(users::update_cover_image))
        .route("/users/c/{username}", get(users::channel_profile))
        .route("/users/history", get(users::watch_history))
        // Videos
        .route("/videos", get(videos::list_videos).post(videos::publish_video))
        .route("/videos/search", get(videos::search_videos))
        .route(
            "/videos/{video_id}",
            get(videos::get_video)
                .patch(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/videos/toggle/publish/{video_id}", patch(videos::toggle_publish))
        .route("/videos/u/{user_id}", get(videos::channel_videos))
        // Playlists
        .route("/playlists", post(playlists::create_playlist))
        .route("/playlists/user/{user_id}", get(playlists::user_playlists))
        .route(
            "/playlists/contains-video/{video_id}",
            get(playlists::playlists_containing),
        )
        .route(
            "/playlists/{playlist_id}",
            get(playlists::get_playlist)
                .patch(playlists::update_playlist)
                .delete(playlists::delete_playlist),
        )
        .route(
            "/playlists/add/{video_id}/{playlist_id}",
            patch(playlists::add_video),
        )
        .route(
            "/playlists/remove/{video_id}/{playlist_id}",
            patch(playlists::remove_video),
        )
        // Subscriptions
        .route(
            "/subscriptions/c/{channel_id}",
            get(subscriptions::channel_subscribers).post(subscriptions::toggle_subscription),
        )
        .route(
            "/subscriptions/u/{subscriber_id}",
            get(subscriptions::subscribed_channels),
        )
        .route(
            "/subscriptions/u/{subscriber_id}/latest",
            get(subscriptions::latest_from_subscriptions),
        )
        // Likes
        .route("/likes/toggle/v/{video_id}", post(likes::toggle_video_like))
        .route("/likes/videos", get(likes::liked_videos))
        // Comments
        .route(
            "/comments/{video_id}",
            get(comments::video_comments).post(comments::add_comment),
        )
        .route(
            "/comments/c/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // Dashboard
        .route("/dashboard/stats", get(dashboard::channel_stats))
        .route("/dashboard/videos", get(dashboard::channel_videos))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let max_upload_bytes = state.max_upload_bytes;
    // Browsers must not sniff uploads into something executable.
    let media = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .service(ServeDir::new(state.media.root()));

    Router::new()
        .nest(API_PREFIX, public.merge(protected))
        .nest_service(MEDIA_ROUTE, media)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
