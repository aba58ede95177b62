//! Async client SDK for Nextcloud/ownCloud-style cloud-storage servers.
//!
//! The crate wraps the server's WebDAV endpoints (listing, favorites,
//! search, trash, comments, file operations) and the OCS sharing API behind
//! typed async methods. Response bodies are parsed by pure, synchronous
//! converters: the WebDAV multistatus parser builds [`models::FileEntry`]
//! records, reconciles hidden-file visibility, classifies types, and pairs
//! adjacent image/video entries into live photos.
//!
//! ```no_run
//! use nimbusdav::config::{ListingOptions, SessionConfig};
//! use nimbusdav::webdav_service::WebDAVService;
//!
//! # async fn run() -> Result<(), nimbusdav::errors::ClientError> {
//! let session = SessionConfig::new(
//!     "https://cloud.example.com",
//!     "alice",
//!     "alice",
//!     "app-password",
//! )?;
//! let service = WebDAVService::new(session)?;
//! let entries = service.read_folder("Photos", &ListingOptions::default()).await?;
//! for entry in &entries {
//!     println!("{} ({})", entry.file_name, entry.class_file);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod ocs_service;
pub mod ocs_xml_parser;
pub mod type_classifier;
pub mod webdav_service;
pub mod webdav_xml_parser;

pub use config::{ListingOptions, RetryConfig, SessionConfig};
pub use errors::ClientError;
pub use models::{
    ClassFile, CommentEntry, ConnectionResult, Depth, FileEntry, FileLock, ShareEntry, ShareType,
    TrashEntry,
};
pub use ocs_service::OcsService;
pub use webdav_service::WebDAVService;
