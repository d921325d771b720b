use axum::{
    Router,
    extract::{Json, Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::{
    enrollment::{self, Enrollment},
    error::Error,
    review::{self, Review},
};

use super::{AppState, current_user};

#[derive(Deserialize, ToSchema)]
pub struct ProgressRequest {
    pub lesson_id: i64,
    /// Lesson progress, 0 to 100
    pub progress: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}/enroll",
    method(post),
    params(
        ("course_id" = i64, Path, description = "ID of the course to enroll in")
    ),
    responses(
        (status = 200, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Course is not published"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn enroll(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<Enrollment>, Error> {
    let user_id = current_user(&session).await?;
    let enrollment = enrollment::enroll_student(&state.database, course_id, user_id).await?;
    Ok(Json(enrollment))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}/progress",
    method(post),
    request_body = ProgressRequest,
    params(
        ("course_id" = i64, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Updated enrollment", body = Enrollment),
        (status = 400, description = "Progress out of range or not enrolled"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lesson not in this course")
    )
)]
pub async fn update_progress(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<Enrollment>, Error> {
    let user_id = current_user(&session).await?;
    let enrollment = enrollment::update_progress(
        &state.database,
        course_id,
        user_id,
        req.lesson_id,
        req.progress,
    )
    .await?;
    Ok(Json(enrollment))
}

#[utoipa::path(
    context_path = "/api",
    path = "/enrollments",
    method(get),
    responses(
        (status = 200, description = "The signed-in user's enrollments", body = Vec<Enrollment>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Enrollment>>, Error> {
    let user_id = current_user(&session).await?;
    let enrollments = enrollment::list_student_enrollments(&state.database, user_id).await?;
    Ok(Json(enrollments))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}/reviews",
    method(post),
    request_body = ReviewRequest,
    params(
        ("course_id" = i64, Path, description = "ID of the reviewed course")
    ),
    responses(
        (status = 200, description = "Review stored", body = Review),
        (status = 400, description = "Rating out of range or not enrolled"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn add_review(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Review>, Error> {
    let user_id = current_user(&session).await?;
    let review =
        review::add_review(&state.database, course_id, user_id, req.rating, req.comment).await?;
    Ok(Json(review))
}

pub fn get_enrollment_scope() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/enroll", post(enroll))
        .route("/courses/{course_id}/progress", post(update_progress))
        .route("/courses/{course_id}/reviews", post(add_review))
        .route("/enrollments", get(list_enrollments))
}
