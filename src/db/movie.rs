use super::DBClient;
use crate::filter::{PageRequest, Predicate};
use crate::forms::MovieData;
use crate::models::{Movie, User};
use crate::resource::MOVIES;
use chrono::Utc;

/// Movie database operations trait
pub trait MovieExt {
    async fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>, sqlx::Error>;

    async fn get_movies(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Movie>, sqlx::Error>;

    async fn get_movie_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error>;

    async fn get_movies_by_ids(&self, ids: &[i64]) -> Result<Vec<Movie>, sqlx::Error>;

    async fn save_movie(&self, data: &MovieData) -> Result<Movie, sqlx::Error>;

    async fn update_movie(&self, movie_id: i64, data: &MovieData) -> Result<Movie, sqlx::Error>;

    /// Reviews of the movie stay, detached (ON DELETE SET NULL)
    async fn delete_movie(&self, movie_id: i64) -> Result<(), sqlx::Error>;

    /// Users who list this movie among their movies
    async fn get_movie_audience(&self, movie_id: i64) -> Result<Vec<User>, sqlx::Error>;
}

impl MovieExt for DBClient {
    async fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = ?")
            .bind(movie_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_movies(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        self.fetch_page(MOVIES.filter.table, predicates, page).await
    }

    async fn get_movie_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error> {
        self.count_rows(MOVIES.filter.table, predicates).await
    }

    async fn get_movies_by_ids(&self, ids: &[i64]) -> Result<Vec<Movie>, sqlx::Error> {
        self.fetch_by_ids(MOVIES.filter.table, ids).await
    }

    async fn save_movie(&self, data: &MovieData) -> Result<Movie, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (duration, title, description, director, publication_date, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(data.duration)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.director)
        .bind(data.publication_date)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_movie(&self, movie_id: i64, data: &MovieData) -> Result<Movie, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
            SET duration = ?, title = ?, description = ?, director = ?, publication_date = ?, updated = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(data.duration)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.director)
        .bind(data.publication_date)
        .bind(Utc::now())
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_movie(&self, movie_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_movie_audience(&self, movie_id: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN user_movies um ON um.user_id = u.id
            WHERE um.movie_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await
    }
}
