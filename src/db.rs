use sqlx::{FromRow, Pool, QueryBuilder, Sqlite, sqlite::SqliteRow};

use crate::filter::{PageRequest, Predicate, push_predicates};

mod user;
pub use user::UserExt;

mod book;
pub use book::BookExt;

mod movie;
pub use movie::MovieExt;

mod review;
pub use review::ReviewExt;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Sqlite>,
}

impl DBClient {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        DBClient { pool }
    }

    /// One page of `table`, narrowed by the list predicates, oldest first
    async fn fetch_page<T>(
        &self,
        table: &str,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE 1 = 1", table));
        push_predicates(&mut builder, predicates);
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        builder.build_query_as::<T>().fetch_all(&self.pool).await
    }

    /// Row count for the same predicates `fetch_page` uses
    async fn count_rows(&self, table: &str, predicates: &[Predicate]) -> Result<i64, sqlx::Error> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE 1 = 1", table));
        push_predicates(&mut builder, predicates);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
    }

    /// `SELECT * FROM table WHERE id IN (...)`; empty input skips the query
    async fn fetch_by_ids<T>(&self, table: &str, ids: &[i64]) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE id IN (", table));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        builder.build_query_as::<T>().fetch_all(&self.pool).await
    }
}
