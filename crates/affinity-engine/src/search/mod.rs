//! Web search and search-based claim validation

pub mod client;
pub mod validator;

pub use client::{ExaSearch, SearchBackend, SearchClient, SearchError, SearchResult};
pub use validator::{
    is_generic_phrase, ClaimValidationConfig, ClaimValidator, DestinationKnowledgeBase,
};
