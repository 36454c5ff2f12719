//! DNR Forge Filter List Compiler
//!
//! This crate compiles ABP/uBO filter lists into declarative network rules,
//! batched for registration, plus a cosmetic bundle for element hiding.

pub mod config;
pub mod emitter;
pub mod optimizer;
pub mod options;
pub mod parser;
pub mod pattern;
pub mod pipeline;
pub mod priority;
pub mod validate;
pub mod whitelist;

pub use config::{CompilerConfig, ConfigError};
pub use emitter::{emit, emit_with_defaults, Batch, DeclarativeAction, DeclarativeRule, DomainType, RuleCondition};
pub use optimizer::{optimize, optimize_with_defaults, optimize_with_stats, OptimizeStats};
pub use parser::{compile_filter_list, parse_line, LineParseError, ParseStats};
pub use pattern::{compile_pattern, match_expression, MatchExpression};
pub use pipeline::{compile_lists, CompiledRuleset, CosmeticBundle, CosmeticEntry, FilterList, Pipeline, Stats};
pub use priority::calculate_priority;
pub use validate::looks_like_filter_list;
pub use whitelist::{strip_whitelisted, whitelist_rules};
