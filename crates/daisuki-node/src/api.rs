//! HTTP API for the Daisuki node.

use crate::error::Error;
use crate::models::{
    validate_comment, validate_post_content, validate_username, Comment, Post, Profile,
    ProfileUpdate,
};
use crate::node::NodeState;
use crate::storage::{LikeToggle, Storage};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use daisuki_gate::Verdict;
use daisuki_slots::{
    unix_now, Kanji, KanjiFilter, KanjiId, SelectionFlow, SelectionState, SlotAllocator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<NodeState>;

/// Newest posts shown on the timeline.
const TIMELINE_LIMIT: usize = 50;

/// Header carrying the auth provider's user id.
pub const USER_HEADER: &str = "x-user-id";

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/ready", get(ready))
        // Catalog
        .route("/api/v1/kanjis", get(list_kanjis))
        .route("/api/v1/kanjis/:id", get(get_kanji))
        // Selection wizard
        .route("/api/v1/selection", get(get_selection))
        .route("/api/v1/selection/begin", post(begin_selection))
        .route("/api/v1/selection/select", post(select_kanji))
        .route("/api/v1/selection/confirm", post(confirm_selection))
        .route("/api/v1/selection/reason", post(record_reason))
        .route("/api/v1/selection/finalize", post(finalize_selection))
        // Gate
        .route("/api/v1/gate/check", post(check_text))
        // Profiles
        .route("/api/v1/signup", post(signup))
        .route("/api/v1/profile", get(own_profile).put(update_profile))
        .route("/api/v1/profiles/:username", get(public_profile))
        // Posts
        .route("/api/v1/timeline", get(timeline))
        .route("/api/v1/posts", post(create_post))
        .route(
            "/api/v1/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/v1/posts/:id/like", post(toggle_like))
        .route(
            "/api/v1/posts/:id/comments",
            get(list_comments).post(add_comment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// --- Errors ---

/// Error body: `{ "error": kind, "message": ..., "invalid_characters"?: [...] }`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    invalid_characters: Option<Vec<char>>,
}

/// Node error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        use daisuki_slots::{Error as Slot, StoreError};
        match &self.0 {
            Error::Slot(e) => match e {
                Slot::CapacityExceeded { .. } => (StatusCode::CONFLICT, "capacity_exceeded"),
                Slot::AlreadyFinalized(_) => (StatusCode::CONFLICT, "already_finalized"),
                Slot::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
                Slot::UnknownKanji(_) => (StatusCode::NOT_FOUND, "unknown_kanji"),
                Slot::UnknownClaimant(_) => (StatusCode::NOT_FOUND, "profile_required"),
                Slot::Store(StoreError::Unavailable(_)) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
                }
                Slot::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
                Slot::Store(StoreError::Corrupt(_)) | Slot::InvariantViolation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
            },
            Error::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_rejected"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
            Error::Serialization(_) | Error::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let invalid_characters = match &self.0 {
            Error::Rejected(r) => Some(r.invalid_characters.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: kind,
            message: self.0.to_string(),
            invalid_characters,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// --- Auth ---

/// The signed-in user, from the [`USER_HEADER`] header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or(Error::Unauthorized)?
            .to_str()
            .map_err(|_| Error::Unauthorized)?
            .trim();
        let well_formed = !value.is_empty()
            && value.len() <= 128
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(Error::Unauthorized.into());
        }
        Ok(Self(value.to_string()))
    }
}

fn require_profile(state: &NodeState, user_id: &str) -> ApiResult<Profile> {
    state
        .storage
        .profile(user_id)?
        .ok_or_else(|| Error::NotFound("Profile not found. Sign up first".into()).into())
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

// --- Catalog endpoints ---

/// A kanji with its derived availability.
#[derive(Debug, Serialize)]
struct KanjiView {
    #[serde(flatten)]
    kanji: Kanji,
    remaining: u32,
    is_full: bool,
}

impl From<Kanji> for KanjiView {
    fn from(kanji: Kanji) -> Self {
        Self {
            remaining: kanji.remaining(),
            is_full: kanji.is_full(),
            kanji,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogQuery {
    q: Option<String>,
    jlpt: Option<u8>,
    #[serde(default)]
    available: bool,
}

async fn list_kanjis(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<Vec<KanjiView>>> {
    let filter = KanjiFilter {
        query: query.q,
        jlpt_level: query.jlpt,
        available_only: query.available,
    };
    let kanjis = state.allocator.catalog(&filter)?;
    Ok(Json(kanjis.into_iter().map(KanjiView::from).collect()))
}

async fn get_kanji(
    State(state): State<AppState>,
    Path(id): Path<KanjiId>,
) -> ApiResult<Json<KanjiView>> {
    match state.storage.kanji(id)? {
        Some(kanji) => Ok(Json(kanji.into())),
        None => Err(daisuki_slots::Error::UnknownKanji(id).into()),
    }
}

// --- Selection endpoints ---

/// Wizard position returned by every selection call.
#[derive(Debug, Serialize)]
struct FlowView {
    step: u8,
    #[serde(flatten)]
    state: SelectionState,
}

impl From<&SelectionFlow> for FlowView {
    fn from(flow: &SelectionFlow) -> Self {
        Self {
            step: flow.state().step(),
            state: flow.state().clone(),
        }
    }
}

/// Run one wizard step against the user's flow, starting one if needed.
///
/// The flow is saved whether or not the step succeeds, so a capacity
/// failure's reset to browsing sticks.
fn drive<T>(
    state: &NodeState,
    user_id: &str,
    step: impl FnOnce(&SlotAllocator<Storage>, &mut SelectionFlow) -> daisuki_slots::Result<T>,
) -> ApiResult<Json<FlowView>> {
    let mut flow = match state.flow(user_id)? {
        Some(flow) => flow,
        None => state.allocator.begin(user_id)?,
    };
    let outcome = step(&state.allocator, &mut flow);
    let view = FlowView::from(&flow);
    state.save_flow(flow)?;
    outcome?;
    Ok(Json(view))
}

async fn get_selection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<FlowView>> {
    drive(&state, &user_id, |_, _| Ok(()))
}

async fn begin_selection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<FlowView>> {
    let flow = state.allocator.begin(&user_id)?;
    let view = FlowView::from(&flow);
    state.save_flow(flow)?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    kanji_id: KanjiId,
}

async fn select_kanji(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Json<FlowView>> {
    drive(&state, &user_id, |allocator, flow| {
        allocator.select_tentative(flow, req.kanji_id)
    })
}

async fn confirm_selection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<FlowView>> {
    drive(&state, &user_id, |allocator, flow| {
        allocator.confirm_tentative(flow)
    })
}

#[derive(Debug, Default, Deserialize)]
struct ReasonRequest {
    reason: Option<String>,
}

async fn record_reason(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ReasonRequest>,
) -> ApiResult<Json<FlowView>> {
    drive(&state, &user_id, |allocator, flow| {
        allocator.record_reason(flow, req.reason)
    })
}

async fn finalize_selection(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<FlowView>> {
    drive(&state, &user_id, |allocator, flow| allocator.finalize(flow))
}

// --- Gate endpoint ---

#[derive(Debug, Deserialize)]
struct CheckRequest {
    text: String,
}

async fn check_text(Json(req): Json<CheckRequest>) -> Json<Verdict> {
    Json(daisuki_gate::inspect(&req.text))
}

// --- Profile endpoints ---

#[derive(Debug, Deserialize)]
struct SignupRequest {
    username: String,
}

async fn signup(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    let username = req.username.trim();
    validate_username(username)?;
    let profile = state.storage.create_profile(&user_id, username)?;
    tracing::info!(user = %user_id, username = %profile.username, "Profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn own_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Profile>> {
    Ok(Json(require_profile(&state, &user_id)?))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.storage.update_profile(&user_id, update)?))
}

/// What other users may see of a profile.
#[derive(Debug, Serialize)]
struct PublicProfile {
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    country: Option<String>,
    kanji: Option<Kanji>,
    has_finalized_claim: bool,
    created_at: u64,
    posts: Vec<TimelinePost>,
}

async fn public_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    viewer: Option<AuthUser>,
) -> ApiResult<Json<PublicProfile>> {
    let profile = state
        .storage
        .profile_by_username(&username)?
        .ok_or_else(|| Error::NotFound(format!("user {username}")))?;

    let kanji = match profile.claimant().held_kanji() {
        Some(id) => state.storage.kanji(id)?,
        None => None,
    };
    let posts = state.storage.posts_by_user(&profile.id)?;
    let posts = render_posts(&state, posts, viewer.as_ref())?;

    Ok(Json(PublicProfile {
        username: profile.username,
        display_name: profile.display_name,
        avatar_url: profile.avatar_url,
        bio: profile.bio,
        country: profile.country,
        kanji,
        has_finalized_claim: profile.has_finalized_claim,
        created_at: profile.created_at,
        posts,
    }))
}

// --- Post endpoints ---

#[derive(Debug, Clone, Serialize)]
struct Author {
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    kanji: Option<char>,
}

/// A post as the timeline shows it.
#[derive(Debug, Serialize)]
struct TimelinePost {
    #[serde(flatten)]
    post: Post,
    author: Option<Author>,
    user_has_liked: bool,
    posted_ago: String,
}

fn render_posts(
    state: &NodeState,
    posts: Vec<Post>,
    viewer: Option<&AuthUser>,
) -> ApiResult<Vec<TimelinePost>> {
    let now = unix_now();
    let mut authors: HashMap<String, Option<Author>> = HashMap::new();
    let mut rendered = Vec::with_capacity(posts.len());

    for post in posts {
        if !authors.contains_key(&post.user_id) {
            let author = match state.storage.profile(&post.user_id)? {
                Some(profile) => {
                    let kanji = match profile.claimant().held_kanji() {
                        Some(id) => state.storage.kanji(id)?.map(|k| k.glyph),
                        None => None,
                    };
                    Some(Author {
                        username: profile.username,
                        display_name: profile.display_name,
                        avatar_url: profile.avatar_url,
                        kanji,
                    })
                }
                None => None,
            };
            authors.insert(post.user_id.clone(), author);
        }
        let author = authors.get(&post.user_id).cloned().flatten();

        let user_has_liked = match viewer {
            Some(AuthUser(user_id)) => state.storage.has_liked(post.id, user_id)?,
            None => false,
        };
        rendered.push(TimelinePost {
            posted_ago: daisuki_gate::format_between(post.created_at, now),
            author,
            user_has_liked,
            post,
        });
    }

    Ok(rendered)
}

async fn timeline(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
) -> ApiResult<Json<Vec<TimelinePost>>> {
    let posts = state.storage.recent_posts(TIMELINE_LIMIT)?;
    Ok(Json(render_posts(&state, posts, viewer.as_ref())?))
}

#[derive(Debug, Deserialize)]
struct CreatePostRequest {
    content: String,
    image_url: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let profile = require_profile(&state, &user_id)?;
    if !profile.can_post() {
        return Err(Error::Forbidden("Claim a kanji before posting".into()).into());
    }
    let content = validate_post_content(&req.content)?;
    let image_url = req.image_url.filter(|url| !url.trim().is_empty());

    let post = state.storage.create_post(&user_id, content, image_url)?;
    tracing::debug!(user = %user_id, post = post.id, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    viewer: Option<AuthUser>,
) -> ApiResult<Json<TimelinePost>> {
    let post = state
        .storage
        .post(id)?
        .ok_or_else(|| Error::NotFound(format!("post {id}")))?;
    let mut rendered = render_posts(&state, vec![post], viewer.as_ref())?;
    rendered
        .pop()
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("post {id}")).into())
}

#[derive(Debug, Deserialize)]
struct UpdatePostRequest {
    content: String,
}

async fn update_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<u64>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let post = state
        .storage
        .post(id)?
        .ok_or_else(|| Error::NotFound(format!("post {id}")))?;
    if post.user_id != user_id {
        return Err(Error::Forbidden("Only the author can edit a post".into()).into());
    }
    let content = validate_post_content(&req.content)?;
    Ok(Json(state.storage.update_post(id, content)?))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    let post = state
        .storage
        .post(id)?
        .ok_or_else(|| Error::NotFound(format!("post {id}")))?;
    if post.user_id != user_id && !state.storage.is_admin(&user_id)? {
        return Err(Error::Forbidden("Only the author or an admin can delete a post".into()).into());
    }
    state.storage.delete_post(id)?;
    tracing::info!(user = %user_id, post = id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<u64>,
) -> ApiResult<Json<LikeToggle>> {
    require_profile(&state, &user_id)?;
    Ok(Json(state.storage.toggle_like(id, &user_id)?))
}

// --- Comment endpoints ---

#[derive(Debug, Serialize)]
struct CommentView {
    #[serde(flatten)]
    comment: Comment,
    username: Option<String>,
    posted_ago: String,
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Vec<CommentView>>> {
    if state.storage.post(id)?.is_none() {
        return Err(Error::NotFound(format!("post {id}")).into());
    }
    let now = unix_now();
    let mut views = Vec::new();
    for comment in state.storage.comments(id)? {
        let username = state.storage.profile(&comment.user_id)?.map(|p| p.username);
        views.push(CommentView {
            posted_ago: daisuki_gate::format_between(comment.created_at, now),
            username,
            comment,
        });
    }
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
struct AddCommentRequest {
    content: String,
}

async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<u64>,
    Json(req): Json<AddCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    require_profile(&state, &user_id)?;
    let content = validate_comment(&req.content)?;
    let comment = state.storage.add_comment(id, &user_id, content)?;
    Ok((StatusCode::CREATED, Json(comment)))
}
