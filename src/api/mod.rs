pub mod client;
pub mod source;

pub use client::ApiClient;
pub use source::{PhotoSource, RemoteSource};
