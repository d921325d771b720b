use axum::{
    Router,
    extract::{Json, Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    course::{
        self, Course, CourseFilter, CourseStatus, Lesson, NewCourse, PublishedCourse, Section,
        SectionOutline,
    },
    db::{Page, Pagination},
    error::Error,
};

use super::{AppState, USER_ID_KEY, current_instructor};

#[derive(Deserialize, Validate, ToSchema)]
pub struct TitleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// A course with its sections and lessons.
#[derive(Serialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub curriculum: Vec<SectionOutline>,
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses",
    method(get),
    params(Pagination, CourseFilter),
    responses(
        (status = 200, description = "Published courses", body = Page<PublishedCourse>)
    )
)]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<CourseFilter>,
) -> Result<Json<Page<PublishedCourse>>, Error> {
    let page = course::get_published_courses(&state.database, &pagination, &filter).await?;
    Ok(Json(page))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}",
    method(get),
    params(
        ("course_id" = i64, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Course with curriculum", body = CourseDetail),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseDetail>, Error> {
    let course = course::get_course(&state.database, course_id).await?;
    if course.status != CourseStatus::Published {
        // drafts are only visible to their instructor
        let viewer = session.get::<i64>(USER_ID_KEY).await.ok().flatten();
        if viewer != Some(course.instructor_id) {
            return Err(Error::CourseNotFound);
        }
    }
    let curriculum = course::get_curriculum(&state.database, course_id).await?;
    Ok(Json(CourseDetail { course, curriculum }))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses",
    method(post),
    request_body = NewCourse,
    responses(
        (status = 200, description = "Draft course created", body = Course),
        (status = 400, description = "Invalid course"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an instructor")
    )
)]
pub async fn create_course(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<NewCourse>,
) -> Result<Json<Course>, Error> {
    let instructor_id = current_instructor(&state, &session).await?;
    let course = course::create_course(&state.database, req, instructor_id).await?;
    Ok(Json(course))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}/publish",
    method(post),
    params(
        ("course_id" = i64, Path, description = "ID of the course to publish")
    ),
    responses(
        (status = 200, description = "Course published", body = Course),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an instructor"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn publish_course(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
) -> Result<Json<Course>, Error> {
    let instructor_id = current_instructor(&state, &session).await?;
    let course = course::publish_course(&state.database, course_id, instructor_id).await?;
    Ok(Json(course))
}

#[utoipa::path(
    context_path = "/api",
    path = "/courses/{course_id}/sections",
    method(post),
    request_body = TitleRequest,
    params(
        ("course_id" = i64, Path, description = "ID of the course")
    ),
    responses(
        (status = 200, description = "Section added", body = Section),
        (status = 400, description = "Empty title"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an instructor"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_section(
    State(state): State<AppState>,
    session: Session,
    Path(course_id): Path<i64>,
    Json(req): Json<TitleRequest>,
) -> Result<Json<Section>, Error> {
    let instructor_id = current_instructor(&state, &session).await?;
    req.validate()?;
    let section = course::add_section(&state.database, course_id, instructor_id, req.title).await?;
    Ok(Json(section))
}

#[utoipa::path(
    context_path = "/api",
    path = "/sections/{section_id}/lessons",
    method(post),
    request_body = TitleRequest,
    params(
        ("section_id" = i64, Path, description = "ID of the section")
    ),
    responses(
        (status = 200, description = "Lesson added", body = Lesson),
        (status = 400, description = "Empty title"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not an instructor"),
        (status = 404, description = "Section not found")
    )
)]
pub async fn add_lesson(
    State(state): State<AppState>,
    session: Session,
    Path(section_id): Path<i64>,
    Json(req): Json<TitleRequest>,
) -> Result<Json<Lesson>, Error> {
    let instructor_id = current_instructor(&state, &session).await?;
    req.validate()?;
    let lesson = course::add_lesson(&state.database, section_id, instructor_id, req.title).await?;
    Ok(Json(lesson))
}

pub fn get_course_scope() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{course_id}", get(get_course))
        .route("/courses/{course_id}/publish", post(publish_course))
        .route("/courses/{course_id}/sections", post(add_section))
        .route("/sections/{section_id}/lessons", post(add_lesson))
}
