use super::DBClient;
use crate::filter::{PageRequest, Predicate};
use crate::forms::ReviewData;
use crate::models::Review;
use crate::resource::REVIEWS;
use chrono::Utc;

/// Review database operations trait
pub trait ReviewExt {
    async fn get_review(&self, review_id: i64) -> Result<Option<Review>, sqlx::Error>;

    async fn get_reviews(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Review>, sqlx::Error>;

    async fn get_review_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error>;

    async fn save_review(&self, data: &ReviewData) -> Result<Review, sqlx::Error>;

    async fn update_review(&self, review_id: i64, data: &ReviewData)
    -> Result<Review, sqlx::Error>;

    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error>;

    // Inverse sides of the review relations
    async fn get_book_reviews(&self, book_id: i64) -> Result<Vec<Review>, sqlx::Error>;
    async fn get_movie_reviews(&self, movie_id: i64) -> Result<Vec<Review>, sqlx::Error>;
    async fn get_author_reviews(&self, user_id: i64) -> Result<Vec<Review>, sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_review(&self, review_id: i64) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_reviews(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Review>, sqlx::Error> {
        self.fetch_page(REVIEWS.filter.table, predicates, page).await
    }

    async fn get_review_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error> {
        self.count_rows(REVIEWS.filter.table, predicates).await
    }

    async fn save_review(&self, data: &ReviewData) -> Result<Review, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (body, rating, publication_date, author_id, book_id, movie_id, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.body)
        .bind(data.rating)
        .bind(data.publication_date)
        .bind(data.author_id)
        .bind(data.book_id)
        .bind(data.movie_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_review(
        &self,
        review_id: i64,
        data: &ReviewData,
    ) -> Result<Review, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET body = ?, rating = ?, publication_date = ?, author_id = ?, book_id = ?, movie_id = ?, updated = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&data.body)
        .bind(data.rating)
        .bind(data.publication_date)
        .bind(data.author_id)
        .bind(data.book_id)
        .bind(data.movie_id)
        .bind(Utc::now())
        .bind(review_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_review(&self, review_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_book_reviews(&self, book_id: i64) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE book_id = ? ORDER BY id")
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_movie_reviews(&self, movie_id: i64) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE movie_id = ? ORDER BY id")
            .bind(movie_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_author_reviews(&self, user_id: i64) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE author_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }
}
