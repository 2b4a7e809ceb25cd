use std::collections::HashMap;

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};
use time::PrimitiveDateTime;
use tracing::debug;

use crate::{
    Batch, ChosenDB, Error, LIKE_ESCAPE, ListingParams,
    comment::{Comment, comments_for_posts},
    error::Result,
};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreatePost {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(length(min = 1, max = 20000))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[garde(allow_unvalidated)]
pub struct PatchPost {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PatchPost {
    pub fn apply(self, post: Post) -> CreatePost {
        CreatePost {
            title: self.title.unwrap_or(post.title),
            content: self.content.unwrap_or(post.content),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    /// Author's username
    pub author: String,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
    #[sqlx(skip)]
    pub comments: Vec<Comment>,
    pub comments_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct PostFilter {
    #[garde(range(min = 1))]
    pub author: Option<i64>,
}

enum Scope<'a> {
    All(&'a PostFilter),
    FollowedBy(i64),
}

impl Scope<'_> {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, ChosenDB>, params: &ListingParams) {
        qb.push(" WHERE 1 = 1");
        match self {
            Scope::All(filter) => {
                if let Some(author) = filter.author {
                    qb.push(" AND p.author_id = ").push_bind(author);
                }
            }
            Scope::FollowedBy(user_id) => {
                qb.push(" AND p.author_id IN (SELECT followee_id FROM follow WHERE follower_id = ")
                    .push_bind(*user_id)
                    .push(")");
            }
        }
        if let Some(pattern) = params.search_pattern() {
            qb.push(" AND (p.title LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR p.content LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE)
                .push(")");
        }
    }
}

const POST_SELECT: &str = r#"SELECT p.id, u.username AS author, p.author_id, p.title, p.content,
p.created_at, p.updated_at,
(SELECT count(*) FROM comment c WHERE c.post_id = p.id) AS comments_count
FROM post p JOIN users u ON u.id = p.author_id"#;

const VALID_ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "p.id"),
    ("title", "p.title"),
    ("created_at", "p.created_at"),
    ("updated_at", "p.updated_at"),
];

const NEWEST_FIRST: &str = "p.created_at DESC, p.id DESC";

pub type PostRepository = PostRepositoryImpl<Pool<ChosenDB>>;

pub struct PostRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> PostRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, author_id: i64, payload: CreatePost) -> Result<Post> {
        let result = sqlx::query("INSERT INTO post (author_id, title, content) VALUES (?, ?, ?)")
            .bind(author_id)
            .bind(&payload.title)
            .bind(&payload.content)
            .execute(&self.executor)
            .await?;
        let id = result.last_insert_rowid();
        debug!("User {author_id} created post {id}");
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<Post> {
        let sql = format!("{POST_SELECT} WHERE p.id = ?");
        let mut post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Post".to_string()))?;
        post.comments = comments_for_posts(&self.executor, &[id]).await?;
        Ok(post)
    }

    pub async fn update(&self, id: i64, payload: CreatePost) -> Result<Post> {
        let result = sqlx::query(
            "UPDATE post SET title = ?, content = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.title)
        .bind(&payload.content)
        .bind(id)
        .execute(&self.executor)
        .await?;
        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Post".to_string()))
        } else {
            self.get(id).await
        }
    }

    /// Deletes post with its comments and likes
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Post".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn list(&self, params: ListingParams, filter: &PostFilter) -> Result<Batch<Post>> {
        self.list_scope(params, Scope::All(filter)).await
    }

    /// Posts of users followed by `user_id`, newest first
    pub async fn feed(&self, user_id: i64, params: ListingParams) -> Result<Batch<Post>> {
        let params = ListingParams {
            order: None,
            ..params
        };
        self.list_scope(params, Scope::FollowedBy(user_id)).await
    }

    async fn list_scope(&self, params: ListingParams, scope: Scope<'_>) -> Result<Batch<Post>> {
        let order = params.ordering(VALID_ORDER_FIELDS, NEWEST_FIRST)?;

        let mut qb = QueryBuilder::<ChosenDB>::new(POST_SELECT);
        scope.push_conditions(&mut qb, &params);
        qb.push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let mut posts = qb
            .build_query_as::<Post>()
            .fetch_all(&self.executor)
            .await?;

        let mut qb = QueryBuilder::<ChosenDB>::new("SELECT count(*) FROM post p");
        scope.push_conditions(&mut qb, &params);
        let total: i64 = qb.build_query_scalar().fetch_one(&self.executor).await?;

        let ids = posts.iter().map(|p| p.id).collect::<Vec<_>>();
        let mut comments: HashMap<i64, Vec<Comment>> = HashMap::new();
        for comment in comments_for_posts(&self.executor, &ids).await? {
            comments.entry(comment.post).or_default().push(comment);
        }
        for post in posts.iter_mut() {
            post.comments = comments.remove(&post.id).unwrap_or_default();
        }

        Ok(Batch::new(&params, posts, total))
    }
}
