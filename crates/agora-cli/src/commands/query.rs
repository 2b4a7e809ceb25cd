use agora_dal::{book::BookRepository, library::LibraryRepository};
use agora_types::config::BackendConfig;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::commands::{open_database, Executor};

/// Sample relationship queries over catalog and libraries
#[derive(Args, Debug)]
pub struct QueryCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[command(subcommand)]
    query: Query,
}

#[derive(Subcommand, Debug)]
pub enum Query {
    /// All books written by the author
    BooksByAuthor { author: String },
    /// All books available in the library
    BooksInLibrary { library: String },
    /// Librarian managing the library
    LibrarianForLibrary { library: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Executor for QueryCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_database(&self.backend).await?;
        match self.query {
            Query::BooksByAuthor { author } => {
                let books = BookRepository::new(pool)
                    .books_by_author_name(&author)
                    .await?;
                print_json(&books)
            }
            Query::BooksInLibrary { library } => {
                let books = LibraryRepository::new(pool)
                    .books_in_library(&library)
                    .await?;
                print_json(&books)
            }
            Query::LibrarianForLibrary { library } => {
                let librarian = LibraryRepository::new(pool)
                    .librarian_for_library(&library)
                    .await?;
                print_json(&librarian)
            }
        }
    }
}
