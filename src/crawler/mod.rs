//! Crawler module: the full fetch pipeline, from frontier dispatch through
//! fetching, HTML parsing and persistence.
//!
//! - [`dispatcher`] reads dispatchable frontier rows and feeds the fetch queue
//! - [`fetcher`] owns HTTP client construction and response classification
//! - [`parser`] extracts indexable fields and compresses raw HTML for storage
//! - [`writer`] is the single task allowed to mutate the crawl/storage stores
//! - [`coordinator`] wires all of the above into one running crawl

mod coordinator;
mod dispatcher;
mod fetcher;
mod parser;
mod writer;

pub use coordinator::Coordinator;
pub use dispatcher::Dispatcher;
pub use fetcher::{build_client, build_client_pair, fetch, FetchOutcome, FetchSuccess};
pub use parser::{compress_html, decompress_html, parse_html, ParsedPage};
pub use writer::{PageOutcome, WriteMessage, Writer};
