pub mod course;
pub mod enrollment;
pub mod instructor;
pub mod user;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tower_sessions::Session;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{Error, Result},
    stats::StatsSource,
};

/// Session key holding the signed-in user's id.
pub const USER_ID_KEY: &str = "user_id";

#[derive(Clone)]
pub struct AppState {
    pub database: SqlitePool,
    pub stats: Arc<dyn StatsSource>,
}

impl AppState {
    pub fn new(database: SqlitePool, stats: Arc<dyn StatsSource>) -> Self {
        Self { database, stats }
    }
}

/// The signed-in user's id, or `Unauthorized`.
pub(crate) async fn current_user(session: &Session) -> Result<i64> {
    match session.get::<i64>(USER_ID_KEY).await {
        Ok(Some(user_id)) => Ok(user_id),
        _ => Err(Error::Unauthorized),
    }
}

/// The signed-in user's id, provided they are an instructor.
pub(crate) async fn current_instructor(state: &AppState, session: &Session) -> Result<i64> {
    let user_id = current_user(session).await?;
    crate::user::require_instructor(&state.database, user_id).await?;
    Ok(user_id)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        user::register,
        user::login,
        user::logout,
        user::me,
        user::update_profile,
        course::list_courses,
        course::get_course,
        course::create_course,
        course::publish_course,
        course::add_section,
        course::add_lesson,
        enrollment::enroll,
        enrollment::update_progress,
        enrollment::list_enrollments,
        enrollment::add_review,
        instructor::get_stats,
        instructor::list_courses,
    ),
    info(title = "course server", version = "0.1.0")
)]
pub struct ApiDoc;

pub fn get_openapi_json() -> Result<String> {
    ApiDoc::openapi()
        .to_pretty_json()
        .map_err(|e| Error::Fatal(e.into()))
}

/// All routes under `/api` plus the Swagger UI. The caller adds the session layer.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(user::get_user_scope())
        .merge(course::get_course_scope())
        .merge(enrollment::get_enrollment_scope())
        .merge(instructor::get_instructor_scope());
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
