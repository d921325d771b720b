use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    course::CourseStatus,
    db::is_unique_violation,
    error::{Error, Result},
    utils::now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    /// Average lesson progress over the whole course, 0 to 100
    pub progress: f64,
    /// Ids of lessons whose progress reached 100
    #[sqlx(json)]
    pub completed_lessons: Vec<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn enroll_student(
    database: &SqlitePool,
    course_id: i64,
    user_id: i64,
) -> Result<Enrollment> {
    let mut tx = database.begin().await?;
    let status = sqlx::query_scalar::<_, CourseStatus>("SELECT status FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::CourseNotFound)?;
    if status != CourseStatus::Published {
        return Err(Error::CourseNotPublished);
    }

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE course_id = ? AND user_id = ?",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(Error::AlreadyEnrolled);
    }

    let enrollment = insert_enrollment(&mut *tx, course_id, user_id).await?;
    tx.commit().await?;
    info!("user {} enrolled in course {}", user_id, course_id);
    Ok(enrollment)
}

/// The unique index on (course_id, user_id) catches a concurrent enroll that
/// slipped past the existence check.
async fn insert_enrollment(
    conn: &mut SqliteConnection,
    course_id: i64,
    user_id: i64,
) -> Result<Enrollment> {
    let now = now();
    sqlx::query_as::<_, Enrollment>(
        "INSERT INTO enrollments (user_id, course_id, status, progress, completed_lessons, \
         last_accessed_at, created_at, updated_at) \
         VALUES (?, ?, ?, 0.0, '[]', ?, ?, ?) RETURNING *",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(EnrollmentStatus::Active)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyEnrolled
        } else {
            e.into()
        }
    })
}

/// Record `progress` for one lesson and recompute the enrollment's overall
/// progress as the mean over every lesson in the course, lessons without a
/// record counting as zero.
pub async fn update_progress(
    database: &SqlitePool,
    course_id: i64,
    user_id: i64,
    lesson_id: i64,
    progress: f64,
) -> Result<Enrollment> {
    if !progress.is_finite() || !(0.0..=100.0).contains(&progress) {
        return Err(Error::InvalidProgress(progress));
    }
    let now = now();
    let mut tx = database.begin().await?;

    let in_course = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lessons l JOIN sections s ON l.section_id = s.id \
         WHERE l.id = ? AND s.course_id = ?",
    )
    .bind(lesson_id)
    .bind(course_id)
    .fetch_one(&mut *tx)
    .await?;
    if in_course == 0 {
        return Err(Error::LessonNotFound);
    }

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE course_id = ? AND user_id = ?",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    if enrolled == 0 {
        return Err(Error::NotEnrolled);
    }

    sqlx::query(
        "INSERT INTO lesson_progress (user_id, lesson_id, progress, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT (user_id, lesson_id) DO UPDATE SET \
         progress = excluded.progress, updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(lesson_id)
    .bind(progress)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let completed_lessons = sqlx::query_scalar::<_, i64>(
        "SELECT lp.lesson_id FROM lesson_progress lp \
         JOIN lessons l ON lp.lesson_id = l.id \
         JOIN sections s ON l.section_id = s.id \
         WHERE lp.user_id = ? AND s.course_id = ? AND lp.progress >= 100 \
         ORDER BY lp.lesson_id",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(&mut *tx)
    .await?;

    // numbered parameters, $1 $2 and $6 are used twice
    let mut enrollment = sqlx::query_as::<_, Enrollment>(
        "UPDATE enrollments SET \
         progress = COALESCE(( \
             SELECT AVG(CASE WHEN l.id = $3 THEN $4 ELSE COALESCE(lp.progress, 0) END) \
             FROM lessons l \
             LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.user_id = $2 \
             WHERE l.section_id IN (SELECT id FROM sections WHERE course_id = $1) \
         ), 0), \
         completed_lessons = $5, \
         last_accessed_at = $6, \
         updated_at = $6 \
         WHERE course_id = $1 AND user_id = $2 \
         RETURNING *",
    )
    .bind(course_id)
    .bind(user_id)
    .bind(lesson_id)
    .bind(progress)
    .bind(Json(&completed_lessons))
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let status = status_for(enrollment.status, enrollment.progress);
    if status != enrollment.status {
        sqlx::query("UPDATE enrollments SET status = ? WHERE id = ?")
            .bind(status)
            .bind(enrollment.id)
            .execute(&mut *tx)
            .await?;
        enrollment.status = status;
        info!("user {} is now {:?} in course {}", user_id, status, course_id);
    }
    tx.commit().await?;
    debug!(
        "user {} lesson {} at {}, course {} at {}",
        user_id, lesson_id, progress, course_id, enrollment.progress
    );
    Ok(enrollment)
}

/// Status implied by the aggregate progress. Cancelled enrollments stay cancelled.
fn status_for(current: EnrollmentStatus, progress: f64) -> EnrollmentStatus {
    match current {
        EnrollmentStatus::Cancelled => EnrollmentStatus::Cancelled,
        _ if progress >= 100.0 => EnrollmentStatus::Completed,
        _ => EnrollmentStatus::Active,
    }
}

pub async fn get_enrollment(
    database: &SqlitePool,
    course_id: i64,
    user_id: i64,
) -> Result<Enrollment> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE course_id = ? AND user_id = ?",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(database)
    .await?
    .ok_or(Error::NotEnrolled)
}

pub async fn list_student_enrollments(database: &SqlitePool, user_id: i64) -> Result<Vec<Enrollment>> {
    let enrollments = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = ? ORDER BY last_accessed_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(database)
    .await?;
    Ok(enrollments)
}
