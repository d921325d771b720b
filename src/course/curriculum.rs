use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;

use crate::{
    error::{Error, Result},
    utils::now,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Section {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lesson {
    pub id: i64,
    pub section_id: i64,
    pub title: String,
    pub position: i64,
}

/// A section together with its lessons, in display order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SectionOutline {
    #[serde(flatten)]
    pub section: Section,
    pub lessons: Vec<Lesson>,
}

/// Append a section to the end of a course owned by `instructor_id`.
pub async fn add_section(
    database: &SqlitePool,
    course_id: i64,
    instructor_id: i64,
    title: String,
) -> Result<Section> {
    let mut tx = database.begin().await?;
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM courses WHERE id = ? AND instructor_id = ?",
    )
    .bind(course_id)
    .bind(instructor_id)
    .fetch_one(&mut *tx)
    .await?;
    if owned == 0 {
        return Err(Error::CourseNotFound);
    }
    let section = sqlx::query_as::<_, Section>(
        "INSERT INTO sections (course_id, title, position, created_at) \
         VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM sections WHERE course_id = ?), ?) \
         RETURNING id, course_id, title, position",
    )
    .bind(course_id)
    .bind(title)
    .bind(course_id)
    .bind(now())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(section)
}

/// Append a lesson to a section whose course is owned by `instructor_id`.
pub async fn add_lesson(
    database: &SqlitePool,
    section_id: i64,
    instructor_id: i64,
    title: String,
) -> Result<Lesson> {
    let mut tx = database.begin().await?;
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sections s JOIN courses c ON s.course_id = c.id \
         WHERE s.id = ? AND c.instructor_id = ?",
    )
    .bind(section_id)
    .bind(instructor_id)
    .fetch_one(&mut *tx)
    .await?;
    if owned == 0 {
        return Err(Error::SectionNotFound);
    }
    let lesson = sqlx::query_as::<_, Lesson>(
        "INSERT INTO lessons (section_id, title, position, created_at) \
         VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE section_id = ?), ?) \
         RETURNING id, section_id, title, position",
    )
    .bind(section_id)
    .bind(title)
    .bind(section_id)
    .bind(now())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(lesson)
}

pub async fn get_curriculum(database: &SqlitePool, course_id: i64) -> Result<Vec<SectionOutline>> {
    let sections = sqlx::query_as::<_, Section>(
        "SELECT id, course_id, title, position FROM sections WHERE course_id = ? ORDER BY position",
    )
    .bind(course_id)
    .fetch_all(database)
    .await?;
    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT l.id, l.section_id, l.title, l.position FROM lessons l \
         JOIN sections s ON l.section_id = s.id WHERE s.course_id = ? ORDER BY l.position",
    )
    .bind(course_id)
    .fetch_all(database)
    .await?;
    let outline = sections
        .into_iter()
        .map(|section| {
            let lessons = lessons
                .iter()
                .filter(|l| l.section_id == section.id)
                .cloned()
                .collect();
            SectionOutline { section, lessons }
        })
        .collect();
    Ok(outline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::testing::{add_lessons, create_user, memory_database, published_course},
        user::Role,
    };

    #[tokio::test]
    async fn sections_and_lessons_are_appended_in_order() {
        let database = memory_database().await;
        let instructor = create_user(&database, "Grace", Role::Instructor).await;
        let course = published_course(&database, instructor, "Rust", "cs").await;

        let first = add_lessons(&database, course, instructor, 2).await;
        let second = add_section(&database, course, instructor, "Ownership".into())
            .await
            .unwrap();
        assert_eq!(second.position, 2);
        let lesson = add_lesson(&database, second.id, instructor, "Borrowing".into())
            .await
            .unwrap();
        assert_eq!(lesson.position, 1);

        let outline = get_curriculum(&database, course).await.unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(
            outline[0].lessons.iter().map(|l| l.id).collect::<Vec<_>>(),
            first
        );
        assert_eq!(outline[1].section.title, "Ownership");
        assert_eq!(outline[1].lessons[0].title, "Borrowing");
    }

    #[tokio::test]
    async fn other_instructors_cannot_edit_curriculum() {
        let database = memory_database().await;
        let owner = create_user(&database, "Grace", Role::Instructor).await;
        let intruder = create_user(&database, "Mallory", Role::Instructor).await;
        let course = published_course(&database, owner, "Rust", "cs").await;
        assert!(matches!(
            add_section(&database, course, intruder, "Mine".into()).await,
            Err(Error::CourseNotFound)
        ));
        let section = add_section(&database, course, owner, "Basics".into())
            .await
            .unwrap();
        assert!(matches!(
            add_lesson(&database, section.id, intruder, "Mine".into()).await,
            Err(Error::SectionNotFound)
        ));
    }
}
