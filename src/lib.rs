//! Client library for browsing a remote photo gallery.
//!
//! Containers (directories, galleries, places, face groups, search results and
//! favorites) are paged through by date window with [`loader::PhotoLoader`].

pub mod api;
pub mod chunk;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod model;
pub mod session;

pub use chunk::{ChunkMode, ChunkStrategy};
pub use config::Config;
pub use error::{FetchError, ParseRefError};
pub use loader::{LoaderState, PhotoLoader};
pub use model::{Container, ContainerRef, Photo, SortOrder};
pub use session::Session;
