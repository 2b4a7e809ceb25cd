use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};
use time::PrimitiveDateTime;

use crate::{Batch, ChosenDB, Error, ListingParams, error::Result};

const MIN_COMMENT_LENGTH: usize = 3;

fn meaningful_content(content: &str, _ctx: &()) -> garde::Result {
    if content.trim().chars().count() < MIN_COMMENT_LENGTH {
        Err(garde::Error::new(format!(
            "Comment must be at least {MIN_COMMENT_LENGTH} characters long."
        )))
    } else {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateComment {
    #[garde(range(min = 1))]
    pub post: i64,
    #[garde(custom(meaningful_content), length(max = 5000))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdateComment {
    #[garde(custom(meaningful_content), length(max = 5000))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post: i64,
    /// Author's username
    pub author: String,
    pub author_id: i64,
    pub content: String,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct CommentFilter {
    #[garde(range(min = 1))]
    pub post: Option<i64>,
}

const COMMENT_SELECT: &str = r#"SELECT c.id, c.post_id AS post, u.username AS author, c.author_id,
c.content, c.created_at, c.updated_at
FROM comment c JOIN users u ON u.id = c.author_id"#;

pub(crate) async fn comments_for_posts<'c, E>(executor: E, post_ids: &[i64]) -> Result<Vec<Comment>>
where
    E: Executor<'c, Database = ChosenDB>,
{
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<ChosenDB>::new(COMMENT_SELECT);
    qb.push(" WHERE c.post_id IN (");
    let mut ids = qb.separated(", ");
    for id in post_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY c.created_at, c.id");
    let comments = qb.build_query_as::<Comment>().fetch_all(executor).await?;
    Ok(comments)
}

pub type CommentRepository = CommentRepositoryImpl<Pool<ChosenDB>>;

pub struct CommentRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> CommentRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, author_id: i64, payload: CreateComment) -> Result<Comment> {
        let result =
            sqlx::query("INSERT INTO comment (post_id, author_id, content) VALUES (?, ?, ?)")
                .bind(payload.post)
                .bind(author_id)
                .bind(payload.content.trim())
                .execute(&self.executor)
                .await
                .map_err(|e| match Error::from(e) {
                    Error::InvalidReference(_) => {
                        Error::InvalidReference(format!("Post {} does not exist", payload.post))
                    }
                    other => other,
                })?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Comment> {
        let sql = format!("{COMMENT_SELECT} WHERE c.id = ?");
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Comment".to_string()))
    }

    pub async fn update(&self, id: i64, payload: UpdateComment) -> Result<Comment> {
        let res = sqlx::query(
            "UPDATE comment SET content = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(payload.content.trim())
        .bind(id)
        .execute(&self.executor)
        .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Comment".to_string()))
        } else {
            self.get(id).await
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM comment WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Comment".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn list(
        &self,
        params: ListingParams,
        filter: &CommentFilter,
    ) -> Result<Batch<Comment>> {
        let order = params.ordering(
            &[("id", "c.id"), ("created_at", "c.created_at")],
            "c.created_at, c.id",
        )?;

        let mut qb = QueryBuilder::<ChosenDB>::new(COMMENT_SELECT);
        if let Some(post) = filter.post {
            qb.push(" WHERE c.post_id = ").push_bind(post);
        }
        qb.push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let rows = qb
            .build_query_as::<Comment>()
            .fetch_all(&self.executor)
            .await?;

        let mut qb = QueryBuilder::<ChosenDB>::new("SELECT count(*) FROM comment c");
        if let Some(post) = filter.post {
            qb.push(" WHERE c.post_id = ").push_bind(post);
        }
        let total: i64 = qb.build_query_scalar().fetch_one(&self.executor).await?;

        Ok(Batch::new(&params, rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_length() {
        let comment = CreateComment {
            post: 1,
            content: "  ok  ".to_string(),
        };
        let report = comment.validate().unwrap_err();
        assert!(
            report
                .to_string()
                .contains("Comment must be at least 3 characters long.")
        );

        let comment = CreateComment {
            post: 1,
            content: "Nice".to_string(),
        };
        assert!(comment.validate().is_ok());
    }
}
