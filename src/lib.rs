//! Client for the XML lottery results feed.
//!
//! [`FeedClient::load`] fetches one snapshot of every game in the feed and
//! [`FeedClient::stream_updates`] polls the feed and reports games that
//! changed between snapshots.

pub mod api;
pub mod charset;
pub mod config;
pub mod error;
pub mod feed;
pub mod stream;
pub mod types;
pub mod utils;

pub use api::*;
pub use charset::Charsets;
pub use config::{FeedConfig, OutputFormat};
pub use error::{ErrorKind, FeedError, Result};
pub use feed::{FeedParser, parse_reader, parse_xml};
pub use stream::{ChangeDetector, SnapshotSource, spawn_change_loop};
pub use types::*;
pub use utils::*;
