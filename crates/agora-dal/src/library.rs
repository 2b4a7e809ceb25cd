use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool, QueryBuilder};
use tracing::debug;

use crate::{Batch, ChosenDB, Error, ListingParams, book::BookWithAuthor, error::Result};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateLibrary {
    #[garde(length(min = 1, max = 200))]
    pub name: String,
    #[garde(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Librarian {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub library_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LibraryDetail {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub books: Vec<BookWithAuthor>,
    pub librarian: Option<Librarian>,
}

const LIBRARY_BOOKS: &str = r#"
SELECT b.id, b.title, b.publication_year, b.author_id AS author, a.name AS author_name
FROM library_book lb
JOIN book b ON b.id = lb.book_id
JOIN author a ON a.id = b.author_id
WHERE lb.library_id = ?
ORDER BY b.title, b.id
"#;

const LIBRARIAN: &str = r#"
SELECT l.id, l.user_id, u.username, l.library_id
FROM librarian l
JOIN users u ON u.id = l.user_id
WHERE l.library_id = ?
"#;

pub type LibraryRepository = LibraryRepositoryImpl<Pool<ChosenDB>>;

pub struct LibraryRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> LibraryRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateLibrary) -> Result<Library> {
        let result = sqlx::query("INSERT INTO library (name, address) VALUES (?, ?)")
            .bind(&payload.name)
            .bind(&payload.address)
            .execute(&self.executor)
            .await
            .map_err(|e| Error::from(e).on_conflict("Library with this name already exists"))?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Library> {
        sqlx::query_as::<_, Library>("SELECT id, name, address FROM library WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Library".to_string()))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Library> {
        sqlx::query_as::<_, Library>("SELECT id, name, address FROM library WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound(format!("Library {name}")))
    }

    pub async fn detail(&self, id: i64) -> Result<LibraryDetail> {
        let library = self.get(id).await?;
        let books = self.books(id).await?;
        let librarian = self.librarian(id).await?;
        Ok(LibraryDetail {
            id: library.id,
            name: library.name,
            address: library.address,
            books,
            librarian,
        })
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<Library>> {
        let order = params.ordering(&[("id", "id"), ("name", "name")], "name")?;
        let mut qb = QueryBuilder::<ChosenDB>::new("SELECT id, name, address FROM library");
        qb.push(order)
            .push(" LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(params.offset);
        let rows = qb
            .build_query_as::<Library>()
            .fetch_all(&self.executor)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM library")
            .fetch_one(&self.executor)
            .await?;
        Ok(Batch::new(&params, rows, total))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM library WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Library".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn books(&self, library_id: i64) -> Result<Vec<BookWithAuthor>> {
        let books = sqlx::query_as::<_, BookWithAuthor>(LIBRARY_BOOKS)
            .bind(library_id)
            .fetch_all(&self.executor)
            .await?;
        Ok(books)
    }

    /// Adding a book which is already in the library is a no-op
    pub async fn add_book(&self, library_id: i64, book_id: i64) -> Result<()> {
        self.get(library_id).await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM book WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&self.executor)
            .await?;
        if exists.is_none() {
            return Err(Error::RecordNotFound("Book".to_string()));
        }
        sqlx::query("INSERT OR IGNORE INTO library_book (library_id, book_id) VALUES (?, ?)")
            .bind(library_id)
            .bind(book_id)
            .execute(&self.executor)
            .await?;
        Ok(())
    }

    pub async fn remove_book(&self, library_id: i64, book_id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM library_book WHERE library_id = ? AND book_id = ?")
            .bind(library_id)
            .bind(book_id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book in library".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn librarian(&self, library_id: i64) -> Result<Option<Librarian>> {
        let librarian = sqlx::query_as::<_, Librarian>(LIBRARIAN)
            .bind(library_id)
            .fetch_optional(&self.executor)
            .await?;
        Ok(librarian)
    }

    /// Makes user the only librarian of the library, user leaves the previous library
    pub async fn assign_librarian(&self, library_id: i64, user_id: i64) -> Result<Librarian> {
        self.get(library_id).await?;
        let mut tx = self.executor.begin().await?;
        sqlx::query("DELETE FROM librarian WHERE library_id = ? OR user_id = ?")
            .bind(library_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO librarian (user_id, library_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(library_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match Error::from(e) {
                Error::InvalidReference(_) => Error::RecordNotFound("User".to_string()),
                other => other,
            })?;
        tx.commit().await?;
        debug!("User {user_id} is now librarian of library {library_id}");

        self.librarian(library_id)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Librarian".to_string()))
    }

    pub async fn books_in_library(&self, name: &str) -> Result<Vec<BookWithAuthor>> {
        let library = self.find_by_name(name).await?;
        self.books(library.id).await
    }

    pub async fn librarian_for_library(&self, name: &str) -> Result<Librarian> {
        let library = self.find_by_name(name).await?;
        self.librarian(library.id)
            .await?
            .ok_or_else(|| Error::RecordNotFound(format!("Librarian for library {name}")))
    }
}
