//! Shared model for pickup-location resolution: address types, gazetteer,
//! rule configuration, and the boundaries to external services.

pub mod address;
pub mod backend;
pub mod config;
pub mod error;
pub mod gazetteer;
pub mod geo;
pub mod number;

pub use address::{
    CandidateAddress, DecomposedAddress, RawUtterance, ResolutionKind, ResolutionResult, field,
};
pub use backend::{AudioSource, SearchRequest, SearchStore, Splitter, Transcriber, Transcription};
pub use config::{AliasAction, AliasGroup, AliasRule, GroupMode, RulesConfig};
pub use error::{BackendError, ConfigError};
pub use gazetteer::Gazetteer;
pub use geo::Point;
pub use number::HouseNumber;
