use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::FetchError;
use crate::model::{Container, ContainerRef, Photo, SortOrder};

/// Blocking client for the gallery REST backend.
#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    endpoint: String,
    api_token: Option<String>,
}

/// Body the backend sends alongside error statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiClient {
    pub fn new(endpoint: &str, api_token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.endpoint,
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the date range and photo count of a container.
    pub fn container(&self, target: &ContainerRef) -> Result<Container, FetchError> {
        let query: Vec<(&str, String)> = target
            .query()
            .map(|(k, v)| vec![(k, v.to_string())])
            .unwrap_or_default();

        self.get_json(&target.resource_path(), &query)
    }

    /// Fetch the photos of a container captured within `[start, end]`.
    pub fn photos(
        &self,
        target: &ContainerRef,
        order: SortOrder,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Photo>, FetchError> {
        let path = format!("{}/photos", target.resource_path());
        self.get_json(&path, &photos_query(target, order, start, end))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let mut req = self.agent.get(&url).set("Accept", "application/json");

        for (key, value) in query {
            req = req.query(key, value);
        }

        if let Some(ref token) = self.api_token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }

        match req.call() {
            Ok(response) => response
                .into_json()
                .map_err(|e| FetchError::Decode(format!("{}: {}", url, e))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                debug!("GET {} failed with status {}", url, status);
                Err(FetchError::Rejected {
                    status: Some(status),
                    message: error_message(&body),
                })
            }
            Err(ureq::Error::Transport(e)) => Err(FetchError::Transport(e.to_string())),
        }
    }
}

fn photos_query(
    target: &ContainerRef,
    order: SortOrder,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("sortOrder", order.as_str().to_string()),
        ("startDate", wire_date(start)),
        ("endDate", wire_date(end)),
    ];

    if let Some((key, value)) = target.query() {
        query.push((key, value.to_string()));
    }

    query
}

/// `YYYY-MM-DD`, with open-ended bounds pinned to four-digit years.
fn wire_date(date: NaiveDate) -> String {
    match date.year() {
        y if y < 1 => "0001-01-01".to_string(),
        y if y > 9999 => "9999-12-31".to_string(),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

/// Pull a human-readable message out of an error response body.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.filter(|m| !m.trim().is_empty()),
        Err(_) => Some(body.to_string()),
    }
}
