use anyhow::{Result, bail};
use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use tracing::info;

pub async fn create_movie(
    client: &reqwest::Client,
    api_url: &Url,
    title: &str,
    year: i32,
    runtime: i32,
    genres: &[&str],
) -> Result<Value> {
    let payload = json!({"title": title, "year": year, "runtime": runtime, "genres": genres});
    let response = client.post(api_url.clone()).json(&payload).send().await?;
    if response.status() != StatusCode::CREATED {
        info!("Create response: {:#?}", response);
        bail!("Movie not created, status {}", response.status());
    }
    let movie: Value = response.json().await?;
    Ok(movie)
}

/// Titles of movies in a listing response, in order.
pub fn titles(listing: &Value) -> Vec<String> {
    listing["movies"]
        .as_array()
        .map(|movies| {
            movies
                .iter()
                .filter_map(|m| m["title"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
