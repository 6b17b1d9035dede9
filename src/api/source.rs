use chrono::NaiveDate;
use std::sync::Arc;

use super::client::ApiClient;
use crate::error::FetchError;
use crate::model::{ContainerRef, Photo, SortOrder};

/// Anything that can return the photos of one container for a date window.
///
/// Calls are blocking; the loader runs them off the async runtime.
pub trait PhotoSource: Send + Sync {
    /// Photos captured within `[start, end]`, both dates inclusive.
    fn load_photos(&self, order: SortOrder, start: NaiveDate, end: NaiveDate) -> Result<Vec<Photo>, FetchError>;

    /// Short name for log output
    fn describe(&self) -> String {
        "photo source".to_string()
    }
}

/// Photos of a container on the remote backend.
pub struct RemoteSource {
    client: Arc<ApiClient>,
    target: ContainerRef,
}

impl RemoteSource {
    pub fn new(client: Arc<ApiClient>, target: ContainerRef) -> Self {
        Self { client, target }
    }
}

impl PhotoSource for RemoteSource {
    fn load_photos(&self, order: SortOrder, start: NaiveDate, end: NaiveDate) -> Result<Vec<Photo>, FetchError> {
        self.client.photos(&self.target, order, start, end)
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.target, self.client.endpoint())
    }
}
