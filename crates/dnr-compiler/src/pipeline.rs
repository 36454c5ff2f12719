//! End-to-end compilation
//!
//! Parses every list, prepends whitelist rules, optimizes the union and emits
//! the network rules in registration batches. Cosmetic and procedural rules
//! are collected separately for the content-script side.

use serde::Serialize;

use dnr_core::fingerprint;
use dnr_core::types::{Rule, RuleAction, RuleBody, RuleKind, SelectorTarget};

use crate::config::CompilerConfig;
use crate::emitter::{emit_with_defaults, Batch};
use crate::optimizer::optimize_with_defaults;
use crate::parser::compile_filter_list;
use crate::whitelist::{strip_whitelisted, whitelist_rules};

/// One named filter list to compile.
#[derive(Debug, Clone, Copy)]
pub struct FilterList<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

impl<'a> FilterList<'a> {
    pub fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CosmeticEntry {
    pub selector: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_domains: Vec<String>,
}

impl From<&SelectorTarget> for CosmeticEntry {
    fn from(target: &SelectorTarget) -> Self {
        Self {
            selector: target.selector.clone(),
            domains: target.domains.iter().cloned().collect(),
            excluded_domains: target.excluded_domains.iter().cloned().collect(),
        }
    }
}

/// Element-hiding rules, kept in optimized order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CosmeticBundle {
    pub hide: Vec<CosmeticEntry>,
    pub unhide: Vec<CosmeticEntry>,
    pub procedural: Vec<CosmeticEntry>,
}

impl CosmeticBundle {
    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut bundle = Self::default();
        for rule in rules {
            match (&rule.body, rule.action) {
                (RuleBody::Cosmetic(target), RuleAction::Unhide) => bundle.unhide.push(target.into()),
                (RuleBody::Cosmetic(target), _) => bundle.hide.push(target.into()),
                (RuleBody::Procedural(target), _) => bundle.procedural.push(target.into()),
                (RuleBody::Network { .. }, _) => {}
            }
        }
        bundle
    }

    pub fn len(&self) -> usize {
        self.hide.len() + self.unhide.len() + self.procedural.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Rules successfully parsed across all lists
    pub parsed: usize,
    /// Lines rejected as malformed
    pub invalid: usize,
    /// Block rules dropped because they target a whitelisted domain
    pub whitelisted: usize,
    pub deduplicated: usize,
    pub merged: usize,
    pub redundant: usize,
    /// Network rules cut by `max_rules`
    pub truncated: usize,
    /// Emitted network rules plus cosmetic entries
    pub final_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledRuleset {
    pub batches: Vec<Batch>,
    pub cosmetic: CosmeticBundle,
    pub stats: Stats,
    /// Hex xxHash64 of batches and cosmetic bundle; changes iff the output does
    pub fingerprint: String,
}

impl CompiledRuleset {
    pub fn network_rule_count(&self) -> usize {
        self.batches.iter().map(|b| b.rules.len()).sum()
    }
}

pub struct Pipeline {
    config: CompilerConfig,
}

impl Pipeline {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self, lists: &[FilterList<'_>]) -> CompiledRuleset {
        let mut stats = Stats::default();

        let mut rules = whitelist_rules(&self.config.whitelist, self.config.whitelist_type_mask());
        for list in lists {
            let (list_rules, parse_stats) = compile_filter_list(list.text, list.name);
            stats.parsed += parse_stats.parsed;
            stats.invalid += parse_stats.invalid;
            rules.extend(list_rules);
        }

        let (rules, whitelisted) = strip_whitelisted(rules, &self.config.whitelist);
        stats.whitelisted = whitelisted;

        let (rules, optimize_stats) = optimize_with_defaults(rules, self.config.default_type_mask());
        stats.deduplicated = optimize_stats.deduplicated;
        stats.merged = optimize_stats.merged;
        stats.redundant = optimize_stats.redundant;

        let (rules, truncated) = self.enforce_ceiling(rules);
        stats.truncated = truncated;

        let batches = emit_with_defaults(&rules, self.config.batch_size, self.config.default_type_mask());
        let cosmetic = CosmeticBundle::from_rules(&rules);

        let network: usize = batches.iter().map(|b| b.rules.len()).sum();
        stats.final_count = network + cosmetic.len();

        let fingerprint = format!("{:016x}", fingerprint(&(&batches, &cosmetic)));

        log::info!(
            "compiled {} lists: {} network rules, {} cosmetic entries, fingerprint {}",
            lists.len(),
            network,
            cosmetic.len(),
            fingerprint
        );

        CompiledRuleset {
            batches,
            cosmetic,
            stats,
            fingerprint,
        }
    }

    /// Keep at most `max_rules` network rules. Input is priority-sorted, so the
    /// dropped tail is the lowest-priority rules.
    fn enforce_ceiling(&self, rules: Vec<Rule>) -> (Vec<Rule>, usize) {
        let Some(max) = self.config.max_rules else {
            return (rules, 0);
        };

        let mut network = 0usize;
        let mut dropped = 0usize;
        let kept: Vec<Rule> = rules
            .into_iter()
            .filter(|rule| {
                if rule.kind() != RuleKind::Network {
                    return true;
                }
                network += 1;
                if network > max {
                    dropped += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        if dropped > 0 {
            log::warn!("rule ceiling {max} reached, dropped {dropped} lowest-priority network rules");
        }
        (kept, dropped)
    }
}

/// Compile `lists` with `config` in one call.
pub fn compile_lists(lists: &[FilterList<'_>], config: &CompilerConfig) -> CompiledRuleset {
    Pipeline::new(config.clone()).compile(lists)
}
