//! Text stages: normaliser, landmark alias resolver, cross-road detector,
//! and the address decomposer adapter with its local rule-based splitter.

mod patterns;

pub mod alias;
pub mod crossroad;
pub mod decompose;
pub mod normalize;
pub mod split;

pub use alias::{AliasOutcome, AliasResolver, LandmarkQuery};
pub use crossroad::{CrossRoad, CrossRoadDetector, Junction};
pub use decompose::{AddressDecomposer, Decomposition};
pub use normalize::Normalizer;
pub use patterns::has_address_unit;
pub use split::RuleSplitter;
