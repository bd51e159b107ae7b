//! Remote backends: HTTP clients for the address splitter, the
//! gazetteer/POI search store, and speech-to-text.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpSearchStore, HttpSplitter, HttpTranscriber, RemoteError};
