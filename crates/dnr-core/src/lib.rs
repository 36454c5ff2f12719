//! dnr-forge Core Library
//!
//! Rule model shared by the filter list compiler, the CLI and the wasm
//! bindings.
//!
//! # Modules
//!
//! - `types`: rules, pattern descriptors, option sets and resource types
//! - `fingerprint`: xxHash64 fingerprints for compiled output

pub mod fingerprint;
pub mod types;

// Re-export commonly used types
pub use fingerprint::fingerprint;
pub use types::{
    is_hostname, OptionSet, PatternDescriptor, ResourceType, ResourceTypeMask, Rule, RuleAction,
    RuleBody, RuleKey, RuleKind, SelectorTarget,
};
