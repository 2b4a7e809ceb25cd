use std::collections::HashMap;

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};

use crate::{
    Batch, ChosenDB, Error, LIKE_ESCAPE, ListingParams,
    book::{Book, books_for_authors},
    error::Result,
};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateAuthor {
    #[garde(length(min = 1, max = 200))]
    pub name: String,
    #[garde(length(max = 5000))]
    pub biography: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct AuthorShort {
    pub id: i64,
    pub name: String,
    pub biography: Option<String>,
}

/// Author with nested books
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub biography: Option<String>,
    pub books: Vec<Book>,
}

impl Author {
    fn new(author: AuthorShort, books: Vec<Book>) -> Self {
        Author {
            id: author.id,
            name: author.name,
            biography: author.biography,
            books,
        }
    }
}

pub type AuthorRepository = AuthorRepositoryImpl<Pool<ChosenDB>>;

pub struct AuthorRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> AuthorRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateAuthor) -> Result<Author> {
        let result = sqlx::query("INSERT INTO author (name, biography) VALUES (?, ?)")
            .bind(&payload.name)
            .bind(&payload.biography)
            .execute(&self.executor)
            .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Author> {
        let author = sqlx::query_as::<_, AuthorShort>(
            "SELECT id, name, biography FROM author WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Author".to_string()))?;
        let books = books_for_authors(&self.executor, &[id]).await?;
        Ok(Author::new(author, books))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<AuthorShort> {
        sqlx::query_as::<_, AuthorShort>(
            "SELECT id, name, biography FROM author WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound(format!("Author {name}")))
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Author>> {
        let order = params.ordering(&[("id", "id"), ("name", "name")], "name")?;
        let pattern = params.search_pattern();

        let mut qb = QueryBuilder::<ChosenDB>::new("SELECT id, name, biography FROM author");
        if let Some(pattern) = &pattern {
            qb.push(" WHERE name LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE);
        }
        qb.push(order)
            .push(", id LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let authors = qb
            .build_query_as::<AuthorShort>()
            .fetch_all(&self.executor)
            .await?;

        let mut qb = QueryBuilder::<ChosenDB>::new("SELECT count(*) FROM author");
        if let Some(pattern) = pattern {
            qb.push(" WHERE name LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE);
        }
        let total: i64 = qb.build_query_scalar().fetch_one(&self.executor).await?;

        let ids = authors.iter().map(|a| a.id).collect::<Vec<_>>();
        let mut books_by_author: HashMap<i64, Vec<Book>> = HashMap::new();
        for book in books_for_authors(&self.executor, &ids).await? {
            books_by_author.entry(book.author).or_default().push(book);
        }
        let rows = authors
            .into_iter()
            .map(|a| {
                let books = books_by_author.remove(&a.id).unwrap_or_default();
                Author::new(a, books)
            })
            .collect();

        Ok(Batch::new(&params, rows, total))
    }

    /// Deletes author together with the books
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM author WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Author".to_string()))
        } else {
            Ok(())
        }
    }
}
