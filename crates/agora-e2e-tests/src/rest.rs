use agora_app::rest_api::Page;
use agora_dal::{author::Author, book::Book, post::Post};
use anyhow::{Result, ensure};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

pub async fn create_author(client: &reqwest::Client, base_url: &Url, name: &str) -> Result<Author> {
    let payload = json!({"name": name, "biography": null});
    let api_url = base_url.join("api/authors/")?;

    let response = client.post(api_url).json(&payload).send().await?;
    ensure!(
        response.status() == StatusCode::CREATED,
        "Unexpected status {}",
        response.status()
    );

    let new_author: Author = response.json().await?;
    Ok(new_author)
}

pub async fn create_book(
    client: &reqwest::Client,
    base_url: &Url,
    title: &str,
    publication_year: i32,
    author: i64,
) -> Result<Book> {
    let payload = json!({"title": title, "publication_year": publication_year, "author": author});
    let api_url = base_url.join("api/books/create/")?;

    let response = client.post(api_url).json(&payload).send().await?;
    info!("Create book response: {:#?}", response);
    ensure!(
        response.status() == StatusCode::CREATED,
        "Unexpected status {}",
        response.status()
    );

    let new_book: Book = response.json().await?;
    Ok(new_book)
}

pub async fn create_post(
    client: &reqwest::Client,
    base_url: &Url,
    title: &str,
    content: &str,
) -> Result<Post> {
    let payload = json!({"title": title, "content": content});
    let api_url = base_url.join("api/posts/")?;

    let response = client.post(api_url).json(&payload).send().await?;
    ensure!(
        response.status() == StatusCode::CREATED,
        "Unexpected status {}",
        response.status()
    );

    let new_post: Post = response.json().await?;
    Ok(new_post)
}

/// GETs paginated listing, expecting success
pub async fn get_page<T: DeserializeOwned>(client: &reqwest::Client, url: Url) -> Result<Page<T>> {
    let response = client.get(url).send().await?;
    ensure!(
        response.status().is_success(),
        "Unexpected status {}",
        response.status()
    );
    let page: Page<T> = response.json().await?;
    Ok(page)
}
