use axum::{
    Router,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tower_sessions::Session;
use tracing::error;

use crate::{
    course::{self, CourseSummary},
    db::{Page, Pagination},
    error::Error,
    stats::InstructorStats,
};

use super::{AppState, USER_ID_KEY, current_instructor};

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/stats",
    method(get),
    responses(
        (status = 200, description = "Statistics for the signed-in instructor", body = InstructorStats),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_stats(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let Ok(Some(user_id)) = session.get::<i64>(USER_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };
    match state.stats.get_instructor_stats(user_id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Error fetching instructor stats: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses",
    method(get),
    params(Pagination),
    responses(
        (status = 200, description = "The instructor's courses with student counts and ratings", body = Page<CourseSummary>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an instructor")
    )
)]
pub async fn list_courses(
    State(state): State<AppState>,
    session: Session,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<CourseSummary>>, Error> {
    let instructor_id = current_instructor(&state, &session).await?;
    let page = course::get_courses_by_instructor(&state.database, instructor_id, &pagination).await?;
    Ok(Json(page))
}

pub fn get_instructor_scope() -> Router<AppState> {
    Router::new().nest(
        "/instructor",
        Router::new()
            .route("/stats", get(get_stats))
            .route("/courses", get(list_courses)),
    )
}
