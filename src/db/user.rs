use super::DBClient;
use crate::filter::{PageRequest, Predicate};
use crate::forms::UserData;
use crate::models::{Book, Movie, Role, User};
use crate::resource::USERS;
use chrono::Utc;
use sqlx::{Sqlite, Transaction, types::Json};

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error>;

    /// Login lookup. The username always mirrors the email.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;

    async fn get_users(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error>;

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, sqlx::Error>;

    /// Is the email used by an account other than `except`?
    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, sqlx::Error>;

    /// Insert the user and its book/movie links in one transaction.
    /// `data.password` must hold the hash.
    async fn save_user(&self, data: &UserData, roles: Vec<Role>) -> Result<User, sqlx::Error>;

    /// Update scalar fields; the password only when a new hash is given and
    /// the book/movie sets only when the form carried them.
    async fn update_user(&self, user_id: i64, data: &UserData) -> Result<User, sqlx::Error>;

    /// Reviews and join rows go with the user (ON DELETE CASCADE)
    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error>;

    async fn get_user_books(&self, user_id: i64) -> Result<Vec<Book>, sqlx::Error>;

    async fn get_user_movies(&self, user_id: i64) -> Result<Vec<Movie>, sqlx::Error>;

    /// Create the bootstrap administrator unless the email is already taken.
    /// Returns whether an account was created.
    async fn ensure_admin(
        &self,
        full_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error>;
}

/// Replace every `user_id` row of a join table with `ids`
async fn replace_links(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    column: &str,
    user_id: i64,
    ids: &[i64],
) -> Result<(), sqlx::Error> {
    let delete_sql = format!("DELETE FROM {} WHERE user_id = ?", table);
    sqlx::query(&delete_sql)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let insert_sql = format!(
        "INSERT OR IGNORE INTO {} (user_id, {}) VALUES (?, ?)",
        table, column
    );
    for id in ids {
        sqlx::query(&insert_sql)
            .bind(user_id)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

impl UserExt for DBClient {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_users(
        &self,
        predicates: &[Predicate],
        page: PageRequest,
    ) -> Result<Vec<User>, sqlx::Error> {
        self.fetch_page(USERS.filter.table, predicates, page).await
    }

    async fn get_user_count(&self, predicates: &[Predicate]) -> Result<i64, sqlx::Error> {
        self.count_rows(USERS.filter.table, predicates).await
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, sqlx::Error> {
        self.fetch_by_ids(USERS.filter.table, ids).await
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, sqlx::Error> {
        // username is checked too: it is unique and mirrors the email
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE (email = ? OR username = ?) AND (? IS NULL OR id != ?)",
        )
        .bind(email)
        .bind(email)
        .bind(except)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn save_user(&self, data: &UserData, roles: Vec<Role>) -> Result<User, sqlx::Error> {
        let password = data
            .password
            .as_deref()
            .ok_or_else(|| sqlx::Error::Protocol("password hash required for a new user".into()))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, username, email, password, roles, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&data.email)
        .bind(password)
        .bind(Json(roles))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(books) = &data.books {
            replace_links(&mut tx, "user_books", "book_id", user.id, books).await?;
        }
        if let Some(movies) = &data.movies {
            replace_links(&mut tx, "user_movies", "movie_id", user.id, movies).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn update_user(&self, user_id: i64, data: &UserData) -> Result<User, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = ?, username = ?, email = ?, password = COALESCE(?, password), updated = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&data.full_name)
        .bind(&data.email)
        .bind(&data.email)
        .bind(data.password.as_deref())
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(books) = &data.books {
            replace_links(&mut tx, "user_books", "book_id", user_id, books).await?;
        }
        if let Some(movies) = &data.movies {
            replace_links(&mut tx, "user_movies", "movie_id", user_id, movies).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        // Check if user actually existed
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_user_books(&self, user_id: i64) -> Result<Vec<Book>, sqlx::Error> {
        sqlx::query_as::<_, Book>(
            r#"
            SELECT b.* FROM books b
            JOIN user_books ub ON ub.book_id = b.id
            WHERE ub.user_id = ?
            ORDER BY b.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_user_movies(&self, user_id: i64) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            r#"
            SELECT m.* FROM movies m
            JOIN user_movies um ON um.movie_id = m.id
            WHERE um.user_id = ?
            ORDER BY m.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn ensure_admin(
        &self,
        full_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        if self.email_taken(email, None).await? {
            return Ok(false);
        }

        let data = UserData {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: Some(password_hash.to_string()),
            books: None,
            movies: None,
        };
        self.save_user(&data, vec![Role::Admin]).await?;
        Ok(true)
    }
}
