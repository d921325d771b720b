use axum::{
    Router,
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::{
    error::Error,
    user::{self, NewUser, ProfileUpdate, User},
};

use super::{AppState, USER_ID_KEY, current_user};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/register",
    method(post),
    request_body = NewUser,
    responses(
        (status = 200, description = "User registered", body = User),
        (status = 400, description = "Invalid profile"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<Json<User>, Error> {
    let user = user::register_user(&state.database, req).await?;
    Ok(Json(user))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = User),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let LoginRequest { email, password } = req;
    match user::login(&state.database, &email, &password).await {
        Ok(user) => match session.insert(USER_ID_KEY, user.id).await {
            Ok(_) => Json(user).into_response(),
            Err(e) => Error::Fatal(e.into()).into_response(),
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/logout",
    method(post),
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.delete().await;
    "Logout successful".into_response()
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/me",
    method(get),
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(State(state): State<AppState>, session: Session) -> Result<Json<User>, Error> {
    let user_id = current_user(&session).await?;
    Ok(Json(user::get_user(&state.database, user_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/profile",
    method(post),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid profile"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<User>, Error> {
    let user_id = current_user(&session).await?;
    Ok(Json(user::update_profile(&state.database, user_id, req).await?))
}

pub fn get_user_scope() -> Router<AppState> {
    Router::new().nest(
        "/user",
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me))
            .route("/profile", post(update_profile)),
    )
}
