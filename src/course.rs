pub mod curriculum;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, types::Json};
use time::OffsetDateTime;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    db::{Page, Pagination, paginate},
    error::{Error, Result},
    utils::now,
};

pub use curriculum::{Lesson, Section, SectionOutline, add_lesson, add_section, get_curriculum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: CourseLevel,
    pub price: f64,
    pub instructor_id: i64,
    #[sqlx(json)]
    pub requirements: Vec<String>,
    #[sqlx(json)]
    pub outcomes: Vec<String>,
    pub status: CourseStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCourse {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub category: String,
    pub level: CourseLevel,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub outcomes: Vec<String>,
}

/// An instructor's course with its enrollment and rating aggregates.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CourseSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub student_count: i64,
    pub average_rating: f64,
}

/// A published course as shown in the public catalogue.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PublishedCourse {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub instructor_name: String,
    pub instructor_avatar: Option<String>,
    pub student_count: i64,
    pub rating: f64,
}

/// Optional catalogue filters. The price range is inclusive; a missing end is open.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl CourseFilter {
    fn price_range(&self) -> Option<(f64, f64)> {
        match (self.min_price, self.max_price) {
            (Some(min), Some(max)) => Some((min, max)),
            (Some(min), None) => Some((min, f64::MAX)),
            (None, Some(max)) => Some((0.0, max)),
            (None, None) => None,
        }
    }
}

pub async fn create_course(
    database: &SqlitePool,
    new: NewCourse,
    instructor_id: i64,
) -> Result<Course> {
    new.validate()?;
    let now = now();
    let mut tx = database.begin().await?;
    let course = sqlx::query_as::<_, Course>(
        "INSERT INTO courses (title, description, category, level, price, instructor_id, \
         requirements, outcomes, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.category)
    .bind(new.level)
    .bind(new.price)
    .bind(instructor_id)
    .bind(Json(&new.requirements))
    .bind(Json(&new.outcomes))
    .bind(CourseStatus::Draft)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    info!("instructor {} created course {}-{}", instructor_id, course.id, course.title);
    Ok(course)
}

pub async fn get_course(database: &SqlitePool, course_id: i64) -> Result<Course> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(database)
        .await?
        .ok_or(Error::CourseNotFound)
}

/// Move a draft course into the public catalogue. Only the owner may do this.
pub async fn publish_course(
    database: &SqlitePool,
    course_id: i64,
    instructor_id: i64,
) -> Result<Course> {
    let mut tx = database.begin().await?;
    let course = sqlx::query_as::<_, Course>(
        "UPDATE courses SET status = ?, updated_at = ? \
         WHERE id = ? AND instructor_id = ? RETURNING *",
    )
    .bind(CourseStatus::Published)
    .bind(now())
    .bind(course_id)
    .bind(instructor_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::CourseNotFound)?;
    tx.commit().await?;
    info!("course {} published", course_id);
    Ok(course)
}

pub async fn get_courses_by_instructor(
    database: &SqlitePool,
    instructor_id: i64,
    pagination: &Pagination,
) -> Result<Page<CourseSummary>> {
    paginate(database, pagination, |query| {
        query
            .push(
                "SELECT c.*, \
                 COUNT(DISTINCT e.user_id) AS student_count, \
                 CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS average_rating \
                 FROM courses c \
                 LEFT JOIN enrollments e ON c.id = e.course_id \
                 LEFT JOIN reviews r ON c.id = r.course_id \
                 WHERE c.instructor_id = ",
            )
            .push_bind(instructor_id)
            .push(" GROUP BY c.id ORDER BY c.created_at DESC, c.id DESC");
    })
    .await
}

pub async fn get_published_courses(
    database: &SqlitePool,
    pagination: &Pagination,
    filter: &CourseFilter,
) -> Result<Page<PublishedCourse>> {
    paginate(database, pagination, |query| {
        push_published_query(query, filter)
    })
    .await
}

fn push_published_query(query: &mut QueryBuilder<'_, Sqlite>, filter: &CourseFilter) {
    query.push(
        "SELECT c.*, \
         u.name AS instructor_name, \
         u.image AS instructor_avatar, \
         COUNT(DISTINCT e.user_id) AS student_count, \
         CAST(COALESCE(AVG(r.rating), 0) AS REAL) AS rating \
         FROM courses c \
         JOIN users u ON c.instructor_id = u.id \
         LEFT JOIN enrollments e ON c.id = e.course_id \
         LEFT JOIN reviews r ON c.id = r.course_id \
         WHERE c.status = ",
    );
    query.push_bind(CourseStatus::Published);
    if let Some(category) = &filter.category {
        query.push(" AND c.category = ").push_bind(category.clone());
    }
    if let Some(level) = filter.level {
        query.push(" AND c.level = ").push_bind(level);
    }
    if let Some((min, max)) = filter.price_range() {
        query
            .push(" AND c.price BETWEEN ")
            .push_bind(min)
            .push(" AND ")
            .push_bind(max);
    }
    query.push(" GROUP BY c.id, u.name, u.image ORDER BY c.created_at DESC, c.id DESC");
}
