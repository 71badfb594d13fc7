//! Registry search, through the registry's v1 search endpoint

use crate::{
    errors::ImageError,
    registry::{AuthConfig, DefaultRegistry},
};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

/// One repository found by a registry search
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SearchResultItem {
    pub name: String,
    pub description: String,
    pub is_official: bool,
    pub is_automated: bool,
    pub star_count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    num_results: i64,
    query: String,
    results: Vec<SearchResultItem>,
}

/// Build the search URL for a term
///
/// `registry` is the base URL of a v1 API, with or without a trailing
/// slash. An empty or missing `registry` means the default registry.
pub fn search_url(
    default_registry: &DefaultRegistry,
    term: &str,
    registry: Option<&str>,
) -> Result<Url, ImageError> {
    let mut base = match registry {
        Some(registry) if !registry.is_empty() => registry.to_owned(),
        _ => format!("https://{}/v1/", default_registry.network_name),
    };
    // Without a trailing slash, join would replace the last path segment
    if !base.ends_with('/') {
        base.push('/');
    }
    let mut url = Url::parse(&base)?.join("search")?;
    url.query_pairs_mut().append_pair("q", term);
    Ok(url)
}

/// Search a registry for repositories matching a term
pub async fn search_images(
    req: &reqwest::Client,
    default_registry: &DefaultRegistry,
    term: &str,
    registry: Option<&str>,
    auth: Option<&AuthConfig>,
) -> Result<Vec<SearchResultItem>, ImageError> {
    let url = search_url(default_registry, term, registry)?;
    log::info!("searching {} for {:?}", url, term);
    let mut request = req.get(url);
    if let Some(auth) = auth {
        request = auth.include_basic_auth(request);
    }
    let response = request.send().await?;
    if response.status() != StatusCode::OK {
        return Err(ImageError::UnexpectedStatus(response.status().as_u16()));
    }
    let body: SearchResponse = response.json().await?;
    log::debug!(
        "search for {:?} returned {} of {} results",
        body.query,
        body.results.len(),
        body.num_results
    );
    Ok(body.results)
}
