use super::DBClient;
use crate::filter::{PageRequest, Predicate};
use crate::forms::BookData;
use crate::models::{Book, User};
use crate::resource::BOOKS;
use chrono::Utc;

/// Book database operations trait
pub trait BookExt {
    /// Returns None when no book has this id
    async fn get_book(&self, book_id: i64) -> Result<Option<Book>, sqlx::Error>;

    /// Filtered, paginated list ordered by id
    async fn get_books(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Book>, sqlx::Error>;

    async fn get_book_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error>;

    /// Books for a set of ids; unknown ids are simply absent from the result
    async fn get_books_by_ids(&self, ids: &[i64]) -> Result<Vec<Book>, sqlx::Error>;

    /// Is the ISBN used by a book other than `except`?
    async fn isbn_taken(&self, isbn: &str, except: Option<i64>) -> Result<bool, sqlx::Error>;

    async fn save_book(&self, data: &BookData) -> Result<Book, sqlx::Error>;

    async fn update_book(&self, book_id: i64, data: &BookData) -> Result<Book, sqlx::Error>;

    /// Reviews of the book go with it (ON DELETE CASCADE)
    async fn delete_book(&self, book_id: i64) -> Result<(), sqlx::Error>;

    /// Users who list this book among their books
    async fn get_book_readers(&self, book_id: i64) -> Result<Vec<User>, sqlx::Error>;
}

impl BookExt for DBClient {
    async fn get_book(&self, book_id: i64) -> Result<Option<Book>, sqlx::Error> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_books(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<Book>, sqlx::Error> {
        self.fetch_page(BOOKS.filter.table, predicates, page).await
    }

    async fn get_book_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error> {
        self.count_rows(BOOKS.filter.table, predicates).await
    }

    async fn get_books_by_ids(&self, ids: &[i64]) -> Result<Vec<Book>, sqlx::Error> {
        self.fetch_by_ids(BOOKS.filter.table, ids).await
    }

    async fn isbn_taken(&self, isbn: &str, except: Option<i64>) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM books WHERE isbn = ? AND (? IS NULL OR id != ?)",
        )
        .bind(isbn)
        .bind(except)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn save_book(&self, data: &BookData) -> Result<Book, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (isbn, title, description, author, publication_date, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.isbn)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.author)
        .bind(data.publication_date)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_book(&self, book_id: i64, data: &BookData) -> Result<Book, sqlx::Error> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET isbn = ?, title = ?, description = ?, author = ?, publication_date = ?, updated = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&data.isbn)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.author)
        .bind(data.publication_date)
        .bind(Utc::now())
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_book(&self, book_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_book_readers(&self, book_id: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN user_books ub ON ub.user_id = u.id
            WHERE ub.book_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
    }
}
