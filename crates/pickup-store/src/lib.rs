//! Search layer: the `FORMSOF(THESAURUS, …)` boolean query builder and
//! parser, and a JSON-backed in-memory store implementing `SearchStore`.

mod error;
pub use error::StoreError;

pub mod expr;
pub mod memory;
pub mod query;

pub use expr::Expr;
pub use memory::MemoryStore;
pub use query::BooleanQuery;
