use dnr_core::types::{OptionSet, RuleAction};

pub const BASE_PRIORITY: u32 = 1;
/// Exceptions outrank blocks of equal specificity.
pub const ALLOW_BOOST: u32 = 10_000;
pub const IMPORTANT_BOOST: u32 = 1_000;
pub const DOMAIN_BOOST: u32 = 100;
pub const SINGLE_TYPE_BOOST: u32 = 10;
/// Fixed priority band of whitelist-generated allow rules.
pub const WHITELIST_PRIORITY: u32 = 10_000;

/// Priority of a network rule. Higher wins.
pub fn calculate_priority(action: RuleAction, options: &OptionSet) -> u32 {
    let mut priority = BASE_PRIORITY;

    if action == RuleAction::Allow {
        priority += ALLOW_BOOST;
    }

    if options.important {
        priority += IMPORTANT_BOOST;
    }

    if !options.domains.is_empty() {
        priority += DOMAIN_BOOST;
    }

    if options.resource_types.count() == 1 {
        priority += SINGLE_TYPE_BOOST;
    }

    priority
}
