//! Self-describing protocol metadata
//!
//! - [`descriptor`]: parameter and method value objects
//! - [`builder`]: assembles the server info document from the registry
//! - [`cache`]: per-address memoization of the built document

pub mod builder;
pub mod cache;
pub mod descriptor;

pub use builder::{build_info, ServerInfoDocument, VariablesListing, POST_PATH, SSE_PATH};
pub use cache::{InfoCache, InfoCacheStats, RenderedInfo, DEFAULT_MAX_ENTRIES};
pub use descriptor::{HttpVerb, MethodDescriptor, ParamElement, ParamLocation, Parameter};
