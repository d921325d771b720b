use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Only instructors can perform this action")]
    Forbidden,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email is already registered")]
    EmailTaken,
    #[error("User not found")]
    UserNotFound,
    #[error("Course not found")]
    CourseNotFound,
    #[error("Course is not open for enrollment")]
    CourseNotPublished,
    #[error("Section not found")]
    SectionNotFound,
    #[error("Lesson not found in this course")]
    LessonNotFound,
    #[error("Student is already enrolled in this course")]
    AlreadyEnrolled,
    #[error("Student is not enrolled in this course")]
    NotEnrolled,
    #[error("Course has already been reviewed by this student")]
    AlreadyReviewed,
    #[error("Progress must be between 0 and 100, got {0}")]
    InvalidProgress(f64),
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::UserNotFound
            | Error::CourseNotFound
            | Error::SectionNotFound
            | Error::LessonNotFound => StatusCode::NOT_FOUND,
            Error::EmailTaken | Error::AlreadyEnrolled | Error::AlreadyReviewed => {
                StatusCode::CONFLICT
            }
            Error::CourseNotPublished
            | Error::NotEnrolled
            | Error::InvalidProgress(_)
            | Error::InvalidRating(_)
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::Migrate(_) | Error::Fatal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // details stay in the log, the client only sees the status line
            error!("request failed: {self:?}");
            return (status, "Internal Server Error").into_response();
        }
        (status, self.to_string()).into_response()
    }
}
