use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder};
use time::OffsetDateTime;
use tracing::debug;

use crate::{Batch, ChosenDB, Error, LIKE_ESCAPE, ListingParams, error::Result};

pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}

fn not_in_future(year: &i32, _ctx: &()) -> garde::Result {
    let current = current_year();
    if *year > current {
        Err(garde::Error::new(format!(
            "Publication year cannot be in the future. Current year is {current}."
        )))
    } else {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateBook {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(range(min = 0), custom(not_in_future))]
    pub publication_year: i32,
    #[garde(range(min = 1))]
    pub author: i64,
}

/// Partial update, missing fields keep their current values
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[garde(allow_unvalidated)]
pub struct PatchBook {
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    pub author: Option<i64>,
}

impl PatchBook {
    /// Merged record has to be validated again before it's stored
    pub fn apply(self, book: Book) -> CreateBook {
        CreateBook {
            title: self.title.unwrap_or(book.title),
            publication_year: self.publication_year.unwrap_or(book.publication_year),
            author: self.author.unwrap_or(book.author),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub publication_year: i32,
    pub author: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct BookWithAuthor {
    pub id: i64,
    pub title: String,
    pub publication_year: i32,
    pub author: i64,
    pub author_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct BookFilter {
    #[garde(length(max = 200))]
    pub title: Option<String>,
    #[garde(range(min = 1))]
    pub author: Option<i64>,
    #[garde(skip)]
    pub publication_year: Option<i32>,
}

impl BookFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, ChosenDB>, params: &ListingParams) {
        qb.push(" WHERE 1 = 1");
        if let Some(title) = &self.title {
            qb.push(" AND b.title = ").push_bind(title.clone());
        }
        if let Some(author) = self.author {
            qb.push(" AND b.author_id = ").push_bind(author);
        }
        if let Some(year) = self.publication_year {
            qb.push(" AND b.publication_year = ").push_bind(year);
        }
        if let Some(pattern) = params.search_pattern() {
            qb.push(" AND (b.title LIKE ")
                .push_bind(pattern.clone())
                .push(LIKE_ESCAPE)
                .push(" OR a.name LIKE ")
                .push_bind(pattern)
                .push(LIKE_ESCAPE)
                .push(")");
        }
    }
}

const BOOK_SELECT: &str =
    "SELECT b.id, b.title, b.publication_year, b.author_id AS author, a.name AS author_name FROM book b JOIN author a ON a.id = b.author_id";
const BOOK_COUNT: &str = "SELECT count(*) FROM book b JOIN author a ON a.id = b.author_id";
const VALID_ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "b.id"),
    ("title", "b.title"),
    ("publication_year", "b.publication_year"),
    ("author_name", "a.name"),
];

pub(crate) async fn books_for_authors<'c, E>(executor: E, author_ids: &[i64]) -> Result<Vec<Book>>
where
    E: Executor<'c, Database = ChosenDB>,
{
    if author_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<ChosenDB>::new(
        "SELECT id, title, publication_year, author_id AS author FROM book WHERE author_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in author_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY title, id");
    let books = qb.build_query_as::<Book>().fetch_all(executor).await?;
    Ok(books)
}

pub type BookRepository = BookRepositoryImpl<Pool<ChosenDB>>;

pub struct BookRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BookRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateBook) -> Result<Book> {
        let result =
            sqlx::query("INSERT INTO book (title, publication_year, author_id) VALUES (?, ?, ?)")
                .bind(&payload.title)
                .bind(payload.publication_year)
                .bind(payload.author)
                .execute(&self.executor)
                .await
                .map_err(|e| unknown_author(e, payload.author))?;

        let id = result.last_insert_rowid();
        debug!("Created book {id}");
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: CreateBook) -> Result<Book> {
        let result = sqlx::query(
            "UPDATE book SET title = ?, publication_year = ?, author_id = ? WHERE id = ?",
        )
        .bind(&payload.title)
        .bind(payload.publication_year)
        .bind(payload.author)
        .bind(id)
        .execute(&self.executor)
        .await
        .map_err(|e| unknown_author(e, payload.author))?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book".to_string()))
        } else {
            self.get(id).await
        }
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT id, title, publication_year, author_id AS author FROM book WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("Book".to_string()))
    }

    pub async fn list(&self, params: ListingParams, filter: &BookFilter) -> Result<Batch<Book>> {
        self.list_with_authors(params, filter)
            .await
            .map(|batch| batch.map(Book::from))
    }

    pub async fn list_with_authors(
        &self,
        params: ListingParams,
        filter: &BookFilter,
    ) -> Result<Batch<BookWithAuthor>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "b.title")?;

        let mut qb = QueryBuilder::<ChosenDB>::new(BOOK_SELECT);
        filter.push_conditions(&mut qb, &params);
        qb.push(order)
            .push(", b.id LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let rows = qb
            .build_query_as::<BookWithAuthor>()
            .fetch_all(&self.executor)
            .await?;

        let mut qb = QueryBuilder::<ChosenDB>::new(BOOK_COUNT);
        filter.push_conditions(&mut qb, &params);
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.executor)
            .await?;

        Ok(Batch::new(&params, rows, total))
    }

    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<Book>> {
        books_for_authors(&self.executor, &[author_id]).await
    }

    /// All books by authors with given name
    pub async fn books_by_author_name(&self, name: &str) -> Result<Vec<BookWithAuthor>> {
        let sql = format!("{BOOK_SELECT} WHERE a.name = ? ORDER BY b.title, b.id");
        let books = sqlx::query_as::<_, BookWithAuthor>(&sql)
            .bind(name)
            .fetch_all(&self.executor)
            .await?;
        Ok(books)
    }
}

impl From<BookWithAuthor> for Book {
    fn from(value: BookWithAuthor) -> Self {
        Book {
            id: value.id,
            title: value.title,
            publication_year: value.publication_year,
            author: value.author,
        }
    }
}

fn unknown_author(e: sqlx::Error, author: i64) -> Error {
    match Error::from(e) {
        Error::InvalidReference(_) => {
            Error::InvalidReference(format!("Author {author} does not exist"))
        }
        other => other,
    }
}
