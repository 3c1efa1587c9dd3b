//! Record storage for crawled posts.
//!
//! Posts are kept in a single JSON Lines file, one record per line:
//!
//! ```text
//! {"id":"N1a2B3","content":"...","create_at":"2025-01-10T12:34:56"}
//! {"id":"N1a2B2","content":"...","create_at":"2025-01-09T08:00:00"}
//! ```
//!
//! The file is written append-only during a crawl and read back as a whole
//! for corpus building and queries.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Post;
use crate::services::TimeWindow;

// Re-export for convenience
pub use local::{JsonlStore, parse_records, read_records};

/// Destination for posts as the crawl yields them.
#[async_trait]
pub trait PostSink: Send {
    /// Persist one post. Once this returns, the post is durable.
    async fn write_post(&mut self, post: &Post) -> Result<()>;
}

#[async_trait]
impl PostSink for Vec<Post> {
    async fn write_post(&mut self, post: &Post) -> Result<()> {
        self.push(post.clone());
        Ok(())
    }
}

/// Records created inside `window`, in file order.
pub fn query_records(records: &[Post], window: TimeWindow) -> Vec<&Post> {
    records
        .iter()
        .filter(|post| window.contains(&post.created_at))
        .collect()
}
