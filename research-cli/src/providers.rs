//! ABOUTME: Tavily-backed SearchProvider adapter for the composition root
//! ABOUTME: A thin REST client; page-text extraction is a best-effort tag strip

use async_trait::async_trait;
use regex::Regex;
use research_core::{RawSearchHit, ResearchError, SearchProvider};
use std::collections::HashMap;
use tracing::warn;

pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearchProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: u32,
        search_type: Option<&str>,
    ) -> Result<Vec<RawSearchHit>, ResearchError> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": search_type.unwrap_or("basic"),
        });

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ResearchError::network(format!("tavily {status}: {text}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResearchError::network(e.to_string()))?;

        let hits = value["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|r| RawSearchHit {
                        url: r["url"].as_str().unwrap_or_default().to_string(),
                        title: r["title"].as_str().unwrap_or_default().to_string(),
                        snippet: r["content"].as_str().unwrap_or_default().to_string(),
                        score: r["score"].as_f64(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }

    async fn fetch_multiple(
        &self,
        urls: &[String],
    ) -> Result<HashMap<String, String>, ResearchError> {
        let mut content = HashMap::new();
        for url in urls {
            match self.client.get(url).send().await {
                Ok(response) => match response.text().await {
                    Ok(html) => {
                        content.insert(url.clone(), strip_html(&html));
                    }
                    Err(err) => warn!(%err, url, "failed to read page body"),
                },
                Err(err) => warn!(%err, url, "failed to fetch page"),
            }
        }
        Ok(content)
    }
}

/// Crude tag-stripping text extraction. Good enough to give the analyzer
/// more signal than the search snippet alone; not an HTML5 parser.
fn strip_html(raw: &str) -> String {
    let script_style = Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").expect("static regex");
    let tags = Regex::new(r"(?s)<[^>]+>").expect("static regex");
    let whitespace = Regex::new(r"\s+").expect("static regex");

    let without_scripts = script_style.replace_all(raw, " ");
    let without_tags = tags.replace_all(&without_scripts, " ");
    let collapsed = whitespace.replace_all(&without_tags, " ");
    collapsed.trim().chars().take(20_000).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_drops_tags_and_scripts() {
        let html = "<html><head><script>evil()</script></head><body><p>Hello <b>world</b></p></body></html>";
        let text = strip_html(html);
        assert_eq!(text, "Hello world");
    }
}
