use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, sqlite::SqliteRow};
use utoipa::{IntoParams, ToSchema};

use crate::error::Result;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// Page request, `page` is 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.per_page() as i64
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, total_count: i64, pagination: &Pagination) -> Self {
        let per_page = pagination.per_page();
        Self {
            items,
            total_count,
            page: pagination.page(),
            per_page,
            total_pages: (total_count + per_page as i64 - 1) / per_page as i64,
        }
    }
}

/// Run a listing query twice: once wrapped in `COUNT(*)` for the total, once
/// with `LIMIT`/`OFFSET` for the requested page.
///
/// `build` pushes the base query (including any bound filters) and is called
/// once per statement, so it must be deterministic.
pub async fn paginate<T, F>(
    database: &SqlitePool,
    pagination: &Pagination,
    build: F,
) -> Result<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    F: for<'a> Fn(&mut QueryBuilder<'a, Sqlite>),
{
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM (");
    build(&mut count);
    count.push(")");
    let total_count: i64 = count.build_query_scalar().fetch_one(database).await?;

    let mut query = QueryBuilder::<Sqlite>::new("");
    build(&mut query);
    query
        .push(" LIMIT ")
        .push_bind(pagination.per_page() as i64)
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let items = query.build_query_as::<T>().fetch_all(database).await?;

    Ok(Page::new(items, total_count, pagination))
}
