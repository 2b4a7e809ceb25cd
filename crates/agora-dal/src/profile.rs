use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool};

use crate::{
    ChosenDB, Error,
    book::Book,
    error::Result,
    user::{User, get_user},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfile {
    pub id: i64,
    pub user: User,
    pub favorite_books: Vec<Book>,
}

pub type ProfileRepository = ProfileRepositoryImpl<Pool<ChosenDB>>;

pub struct ProfileRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ProfileRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    async fn profile_id(&self, user_id: i64) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO user_profile (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.executor)
            .await
            .map_err(|e| match Error::from(e) {
                Error::InvalidReference(_) => Error::RecordNotFound("User".to_string()),
                other => other,
            })?;
        let id: i64 = sqlx::query_scalar("SELECT id FROM user_profile WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.executor)
            .await?;
        Ok(id)
    }

    pub async fn get(&self, user_id: i64) -> Result<UserProfile> {
        let user = get_user(&self.executor, user_id).await?;
        let id = self.profile_id(user_id).await?;
        let favorite_books = sqlx::query_as::<_, Book>(
            r#"SELECT b.id, b.title, b.publication_year, b.author_id AS author
            FROM user_profile_favorite f JOIN book b ON b.id = f.book_id
            WHERE f.profile_id = ? ORDER BY b.title, b.id"#,
        )
        .bind(id)
        .fetch_all(&self.executor)
        .await?;
        Ok(UserProfile {
            id,
            user,
            favorite_books,
        })
    }

    pub async fn add_favorite(&self, user_id: i64, book_id: i64) -> Result<UserProfile> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM book WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&self.executor)
            .await?;
        if exists.is_none() {
            return Err(Error::RecordNotFound("Book".to_string()));
        }
        let profile_id = self.profile_id(user_id).await?;
        sqlx::query("INSERT OR IGNORE INTO user_profile_favorite (profile_id, book_id) VALUES (?, ?)")
            .bind(profile_id)
            .bind(book_id)
            .execute(&self.executor)
            .await?;
        self.get(user_id).await
    }

    pub async fn remove_favorite(&self, user_id: i64, book_id: i64) -> Result<UserProfile> {
        let profile_id = self.profile_id(user_id).await?;
        let res =
            sqlx::query("DELETE FROM user_profile_favorite WHERE profile_id = ? AND book_id = ?")
                .bind(profile_id)
                .bind(book_id)
                .execute(&self.executor)
                .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Favorite book".to_string()));
        }
        self.get(user_id).await
    }
}
