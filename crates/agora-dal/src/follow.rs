use sqlx::{Acquire, Executor, Pool};
use tracing::debug;

use crate::{
    ChosenDB, Error,
    error::Result,
    notification::{Target, VERB_FOLLOWED, notify},
    user::UserShort,
};

pub type FollowRepository = FollowRepositoryImpl<Pool<ChosenDB>>;

pub struct FollowRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> FollowRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn follow(&self, follower: i64, followee: i64) -> Result<()> {
        if follower == followee {
            return Err(Error::InvalidOperation(
                "You cannot follow yourself".to_string(),
            ));
        }
        let mut tx = self.executor.begin().await?;
        sqlx::query("INSERT INTO follow (follower_id, followee_id) VALUES (?, ?)")
            .bind(follower)
            .bind(followee)
            .execute(&mut *tx)
            .await
            .map_err(|e| match Error::from(e) {
                Error::InvalidReference(_) => Error::RecordNotFound("User".to_string()),
                other => other.on_conflict("You already follow this user"),
            })?;
        notify(&mut *tx, followee, follower, VERB_FOLLOWED, Target::User(follower)).await?;
        tx.commit().await?;
        debug!("User {follower} follows {followee}");
        Ok(())
    }

    pub async fn unfollow(&self, follower: i64, followee: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM follow WHERE follower_id = ? AND followee_id = ?")
            .bind(follower)
            .bind(followee)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::InvalidOperation(
                "You are not following this user".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub async fn following(&self, user_id: i64) -> Result<Vec<UserShort>> {
        let users = sqlx::query_as::<_, UserShort>(
            "SELECT u.id, u.username FROM follow f JOIN users u ON u.id = f.followee_id WHERE f.follower_id = ? ORDER BY u.username",
        )
        .bind(user_id)
        .fetch_all(&self.executor)
        .await?;
        Ok(users)
    }

    pub async fn followers(&self, user_id: i64) -> Result<Vec<UserShort>> {
        let users = sqlx::query_as::<_, UserShort>(
            "SELECT u.id, u.username FROM follow f JOIN users u ON u.id = f.follower_id WHERE f.followee_id = ? ORDER BY u.username",
        )
        .bind(user_id)
        .fetch_all(&self.executor)
        .await?;
        Ok(users)
    }
}
