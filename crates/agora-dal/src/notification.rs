use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool};
use time::PrimitiveDateTime;

use crate::{Batch, ChosenDB, Error, ListingParams, error::Result};

pub const VERB_LIKED_POST: &str = "liked your post";
pub const VERB_FOLLOWED: &str = "started following you";

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient: i64,
    /// Actor's username
    pub actor: String,
    pub actor_id: i64,
    pub verb: String,
    pub target_content_type: Option<String>,
    pub target_object_id: Option<i64>,
    pub timestamp: PrimitiveDateTime,
    pub read: bool,
}

/// What the notification is about
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Post(i64),
    User(i64),
}

impl Target {
    fn content_type(&self) -> &'static str {
        match self {
            Target::Post(_) => "post",
            Target::User(_) => "user",
        }
    }

    fn object_id(&self) -> i64 {
        match self {
            Target::Post(id) | Target::User(id) => *id,
        }
    }
}

pub(crate) async fn notify<'c, E>(
    executor: E,
    recipient: i64,
    actor: i64,
    verb: &str,
    target: Target,
) -> Result<()>
where
    E: Executor<'c, Database = ChosenDB>,
{
    sqlx::query(
        "INSERT INTO notification (recipient_id, actor_id, verb, target_content_type, target_object_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(recipient)
    .bind(actor)
    .bind(verb)
    .bind(target.content_type())
    .bind(target.object_id())
    .execute(executor)
    .await?;
    Ok(())
}

const NOTIFICATION_SELECT: &str = r#"SELECT n.id, n.recipient_id AS recipient, u.username AS actor,
n.actor_id, n.verb, n.target_content_type, n.target_object_id, n.timestamp, n.is_read AS read
FROM notification n JOIN users u ON u.id = n.actor_id"#;

pub type NotificationRepository = NotificationRepositoryImpl<Pool<ChosenDB>>;

pub struct NotificationRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> NotificationRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Notifications of one recipient, newest first
    pub async fn list(&self, recipient: i64, params: ListingParams) -> Result<Batch<Notification>> {
        let sql = format!(
            "{NOTIFICATION_SELECT} WHERE n.recipient_id = ? ORDER BY n.timestamp DESC, n.id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(recipient)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.executor)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM notification WHERE recipient_id = ?")
            .bind(recipient)
            .fetch_one(&self.executor)
            .await?;
        Ok(Batch::new(&params, rows, total))
    }

    pub async fn unread_count(&self, recipient: i64) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT count(*) FROM notification WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient)
        .fetch_one(&self.executor)
        .await?;
        Ok(count)
    }

    /// Notification of other recipient is reported as missing
    pub async fn mark_read(&self, id: i64, recipient: i64) -> Result<Notification> {
        let res = sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ? AND recipient_id = ?")
            .bind(id)
            .bind(recipient)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Notification".to_string()));
        }
        let sql = format!("{NOTIFICATION_SELECT} WHERE n.id = ?");
        let notification = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .fetch_one(&self.executor)
            .await?;
        Ok(notification)
    }
}
