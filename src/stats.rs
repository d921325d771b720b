use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;

use crate::{course::CourseStatus, error::Result};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CourseStats {
    pub course_id: i64,
    pub title: String,
    pub status: CourseStatus,
    pub student_count: i64,
    pub average_rating: f64,
    pub average_progress: f64,
}

/// Aggregates over every course owned by one instructor.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct InstructorStats {
    pub total_courses: i64,
    pub published_courses: i64,
    /// Distinct users enrolled in any of the courses
    pub total_students: i64,
    pub total_enrollments: i64,
    pub total_reviews: i64,
    pub average_rating: f64,
    pub average_progress: f64,
    /// Sum of the course price over all enrollments
    pub revenue: f64,
    pub courses: Vec<CourseStats>,
}

/// Where the stats endpoint gets its numbers from.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn get_instructor_stats(&self, instructor_id: i64) -> Result<InstructorStats>;
}

/// Computes [`InstructorStats`] straight from the course tables.
#[derive(Debug, Clone)]
pub struct SqlStats {
    database: SqlitePool,
}

impl SqlStats {
    pub fn new(database: SqlitePool) -> Self {
        Self { database }
    }
}

#[async_trait]
impl StatsSource for SqlStats {
    async fn get_instructor_stats(&self, instructor_id: i64) -> Result<InstructorStats> {
        // one read transaction so the numbers agree with each other
        let mut tx = self.database.begin().await?;

        let (total_courses, published_courses) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) \
             FROM courses WHERE instructor_id = ?",
        )
        .bind(CourseStatus::Published)
        .bind(instructor_id)
        .fetch_one(&mut *tx)
        .await?;

        let (total_students, total_enrollments, average_progress, revenue) =
            sqlx::query_as::<_, (i64, i64, f64, f64)>(
                "SELECT COUNT(DISTINCT e.user_id), COUNT(e.id), \
                 CAST(COALESCE(AVG(e.progress), 0) AS REAL), \
                 CAST(COALESCE(SUM(c.price), 0) AS REAL) \
                 FROM enrollments e JOIN courses c ON c.id = e.course_id \
                 WHERE c.instructor_id = ?",
            )
            .bind(instructor_id)
            .fetch_one(&mut *tx)
            .await?;

        let (total_reviews, average_rating) = sqlx::query_as::<_, (i64, f64)>(
            "SELECT COUNT(r.id), CAST(COALESCE(AVG(r.rating), 0) AS REAL) \
             FROM reviews r JOIN courses c ON c.id = r.course_id \
             WHERE c.instructor_id = ?",
        )
        .bind(instructor_id)
        .fetch_one(&mut *tx)
        .await?;

        let courses = sqlx::query_as::<_, CourseStats>(
            "SELECT c.id AS course_id, c.title, c.status, \
             (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS student_count, \
             (SELECT CAST(COALESCE(AVG(r.rating), 0) AS REAL) FROM reviews r \
              WHERE r.course_id = c.id) AS average_rating, \
             (SELECT CAST(COALESCE(AVG(e.progress), 0) AS REAL) FROM enrollments e \
              WHERE e.course_id = c.id) AS average_progress \
             FROM courses c WHERE c.instructor_id = ? \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(instructor_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(InstructorStats {
            total_courses,
            published_courses,
            total_students,
            total_enrollments,
            total_reviews,
            average_rating,
            average_progress,
            revenue,
            courses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        course::{CourseLevel, create_course, publish_course},
        db::testing::{add_lessons, create_user, memory_database, new_course},
        enrollment::{enroll_student, update_progress},
        review::add_review,
        user::Role,
    };

    #[tokio::test]
    async fn empty_instructor_has_zeroed_stats() {
        let database = memory_database().await;
        let instructor = create_user(&database, "Grace", Role::Instructor).await;
        let stats = SqlStats::new(database)
            .get_instructor_stats(instructor)
            .await
            .unwrap();
        assert_eq!(stats.total_courses, 0);
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert!(stats.courses.is_empty());
    }

    #[tokio::test]
    async fn aggregates_courses_enrollments_and_reviews() {
        let database = memory_database().await;
        let instructor = create_user(&database, "Grace", Role::Instructor).await;
        let other = create_user(&database, "Linus", Role::Instructor).await;
        let alice = create_user(&database, "Alice", Role::Student).await;
        let bob = create_user(&database, "Bob", Role::Student).await;

        let mut ids = Vec::new();
        for (title, price) in [("Rust", 30.0), ("Go", 20.0)] {
            let course = create_course(
                &database,
                new_course(title, "cs", CourseLevel::Beginner, price),
                instructor,
            )
            .await
            .unwrap();
            publish_course(&database, course.id, instructor).await.unwrap();
            ids.push(course.id);
        }
        create_course(
            &database,
            new_course("Draft", "cs", CourseLevel::Beginner, 5.0),
            instructor,
        )
        .await
        .unwrap();
        let foreign = create_course(
            &database,
            new_course("Kernel", "cs", CourseLevel::Advanced, 99.0),
            other,
        )
        .await
        .unwrap();
        publish_course(&database, foreign.id, other).await.unwrap();

        let (rust, go) = (ids[0], ids[1]);
        let lessons = add_lessons(&database, rust, instructor, 2).await;
        enroll_student(&database, rust, alice).await.unwrap();
        enroll_student(&database, rust, bob).await.unwrap();
        enroll_student(&database, go, alice).await.unwrap();
        enroll_student(&database, foreign.id, bob).await.unwrap();
        update_progress(&database, rust, alice, lessons[0], 100.0)
            .await
            .unwrap();
        add_review(&database, rust, alice, 5, None).await.unwrap();
        add_review(&database, go, alice, 2, None).await.unwrap();
        add_review(&database, foreign.id, bob, 1, None).await.unwrap();

        let stats = SqlStats::new(database)
            .get_instructor_stats(instructor)
            .await
            .unwrap();
        assert_eq!(stats.total_courses, 3);
        assert_eq!(stats.published_courses, 2);
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.total_enrollments, 3);
        assert_eq!(stats.total_reviews, 2);
        assert!((stats.average_rating - 3.5).abs() < 1e-9);
        // alice is half way through rust, the other two enrollments are at zero
        assert!((stats.average_progress - 50.0 / 3.0).abs() < 1e-9);
        assert!((stats.revenue - 80.0).abs() < 1e-9);

        assert_eq!(stats.courses.len(), 3);
        let rust_stats = stats.courses.iter().find(|c| c.course_id == rust).unwrap();
        assert_eq!(rust_stats.student_count, 2);
        assert_eq!(rust_stats.status, CourseStatus::Published);
        assert!((rust_stats.average_progress - 25.0).abs() < 1e-9);
        assert!((rust_stats.average_rating - 5.0).abs() < 1e-9);
    }
}
