//! transync content layer
//!
//! Everything that talks to a document host lives here:
//! - **Response cache**: TTL-bounded payloads plus a per-key origin throttle
//! - **Resolver**: reference URL → plain text through ranked strategies
//! - **Decoding**: gzip, binary and HTML-shell predicates, HTML stripping
//! - **Ports**: [`HttpClient`], [`SheetsBackend`] and [`Clock`]
//!
//! # Architecture
//!
//! ```text
//! ContentResolver ──► ResponseCache ──► Strategy chain ──► FetchChannel ──► HttpClient
//!                                            │                  └─ relays (unprivileged)
//!                                            └─► SheetsBackend (tab enumeration)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use transync_content::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(ReqwestClient::new(Duration::from_secs(20))?);
//! let resolver = ContentResolver::new(
//!     http,
//!     ResponseCache::new(CacheConfig::default()),
//!     ResolverConfig::default(),
//! );
//!
//! let text = resolver.resolve_cached("https://docs.google.com/document/d/…/edit", false).await?;
//! println!("{} chars", text.chars().count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod clock;
pub mod decode;
pub mod error;
pub mod hash;
pub mod html;
pub mod markdown;
pub mod origin;
pub mod relay;
pub mod resolver;
pub mod sheets;

// Re-exports for convenience
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decode::{decode_body, looks_binary};
pub use error::{ContentError, ContentResult, OriginError};
pub use hash::ContentHash;
pub use html::{looks_like_html_shell, is_plausible};
pub use origin::{HttpClient, HttpResponse, ReqwestClient};
pub use relay::{default_relays, RelayEndpoint, RelayEnvelope};
pub use resolver::{classify, ContentResolver, RefClass, ResolverConfig};
pub use sheets::{Grid, SheetsApiClient, SheetsBackend};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for resolving content
    pub use crate::cache::{CacheConfig, ResponseCache};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::error::{ContentError, ContentResult};
    pub use crate::origin::{HttpClient, ReqwestClient};
    pub use crate::resolver::{ContentResolver, ResolverConfig};
    pub use crate::sheets::{SheetsApiClient, SheetsBackend};
}
