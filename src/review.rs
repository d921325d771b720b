use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    db::is_unique_violation,
    error::{Error, Result},
    utils::now,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One review per enrolled student and course, rated 1 to 5.
pub async fn add_review(
    database: &SqlitePool,
    course_id: i64,
    user_id: i64,
    rating: i64,
    comment: Option<String>,
) -> Result<Review> {
    if !(1..=5).contains(&rating) {
        return Err(Error::InvalidRating(rating));
    }
    let mut tx = database.begin().await?;
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
    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (course_id, user_id, rating, comment, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(course_id)
    .bind(user_id)
    .bind(rating)
    .bind(comment)
    .bind(now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyReviewed
        } else {
            e.into()
        }
    })?;
    tx.commit().await?;
    Ok(review)
}
