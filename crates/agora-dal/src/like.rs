use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{
    ChosenDB, Error,
    error::Result,
    notification::{Target, VERB_LIKED_POST, notify},
};

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Like {
    pub id: i64,
    pub user: i64,
    pub post: i64,
    pub created_at: PrimitiveDateTime,
}

pub type LikeRepository = LikeRepositoryImpl<Pool<ChosenDB>>;

pub struct LikeRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> LikeRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Records like and notifies post author, unless the author likes own post.
    /// Second like of the same post fails on unique index.
    pub async fn like(&self, user_id: i64, post_id: i64) -> Result<Like> {
        let mut tx = self.executor.begin().await?;
        // write first, so the transaction holds the write lock from its first statement
        let result = sqlx::query("INSERT INTO post_like (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match Error::from(e) {
                Error::InvalidReference(_) => Error::RecordNotFound("Post".to_string()),
                other => other.on_conflict("You already liked this post"),
            })?;
        let id = result.last_insert_rowid();
        let author: i64 = sqlx::query_scalar("SELECT author_id FROM post WHERE id = ?")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        if author != user_id {
            notify(&mut *tx, author, user_id, VERB_LIKED_POST, Target::Post(post_id)).await?;
        }
        tx.commit().await?;
        debug!("User {user_id} liked post {post_id}");

        let like = sqlx::query_as::<_, Like>(
            "SELECT id, user_id AS user, post_id AS post, created_at FROM post_like WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.executor)
        .await?;
        Ok(like)
    }

    pub async fn unlike(&self, user_id: i64, post_id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM post_like WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() > 0 {
            return Ok(());
        }
        let post: Option<i64> = sqlx::query_scalar("SELECT id FROM post WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.executor)
            .await?;
        match post {
            Some(_) => Err(Error::InvalidOperation(
                "You have not liked this post".to_string(),
            )),
            None => Err(Error::RecordNotFound("Post".to_string())),
        }
    }

    pub async fn count(&self, post_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT count(*) FROM post_like WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }
}
