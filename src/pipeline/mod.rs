//! Pipeline entry points.
//!
//! - `run_crawl`: Fetch a profile's posts into the record file
//! - `run_generate`: Build the pruned corpus export from the record file
//! - `run_query`: Read stored posts within a time range

pub mod crawl;
pub mod generate;
pub mod query;

pub use crawl::{run_crawl, run_crawl_with};
pub use generate::{CorpusExport, run_generate, run_generate_with};
pub use query::run_query;
