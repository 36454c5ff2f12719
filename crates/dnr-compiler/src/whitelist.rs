use std::collections::HashSet;

use dnr_core::types::{
    is_hostname, OptionSet, PatternDescriptor, ResourceTypeMask, Rule, RuleAction, RuleBody,
};

use crate::priority::WHITELIST_PRIORITY;

/// Source name given to whitelist-generated rules.
pub const WHITELIST_SOURCE: &str = "whitelist";

/// Lowercase a user-supplied domain and strip surrounding dots. `None` if it
/// is not a hostname.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('.').to_ascii_lowercase();
    is_hostname(&trimmed).then_some(trimmed)
}

/// One high-priority allow rule per distinct whitelisted domain.
pub fn whitelist_rules<S: AsRef<str>>(domains: &[S], resource_types: ResourceTypeMask) -> Vec<Rule> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for (index, raw) in domains.iter().enumerate() {
        let Some(domain) = normalize_domain(raw.as_ref()) else {
            log::warn!("ignoring invalid whitelist entry '{}'", raw.as_ref());
            continue;
        };
        if !seen.insert(domain.clone()) {
            continue;
        }

        rules.push(Rule {
            action: RuleAction::Allow,
            body: RuleBody::Network {
                pattern: PatternDescriptor::DomainAnchor(domain),
                options: OptionSet {
                    resource_types,
                    ..OptionSet::default()
                },
            },
            priority: WHITELIST_PRIORITY,
            source: WHITELIST_SOURCE.to_string(),
            line: index + 1,
        });
    }

    rules
}

/// Drop block rules that target a whitelisted domain or one of its subdomains.
pub fn strip_whitelisted<S: AsRef<str>>(rules: Vec<Rule>, whitelist: &[S]) -> (Vec<Rule>, usize) {
    let domains: HashSet<String> = whitelist
        .iter()
        .filter_map(|d| normalize_domain(d.as_ref()))
        .collect();
    if domains.is_empty() {
        return (rules, 0);
    }

    let before = rules.len();
    let kept: Vec<Rule> = rules
        .into_iter()
        .filter(|rule| {
            if rule.action != RuleAction::Block {
                return true;
            }
            match rule.pattern().and_then(|p| p.anchored_host()) {
                Some(host) => !is_whitelisted(host, &domains),
                None => true,
            }
        })
        .collect();

    let stripped = before - kept.len();
    if stripped > 0 {
        log::info!("dropped {stripped} block rules targeting whitelisted domains");
    }
    (kept, stripped)
}

/// True if `host` or any parent domain of it is whitelisted.
fn is_whitelisted(host: &str, domains: &HashSet<String>) -> bool {
    let mut current = host;
    loop {
        if domains.contains(current) {
            return true;
        }
        match current.find('.') {
            Some(pos) => current = &current[pos + 1..],
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile_filter_list;

    #[test]
    fn builds_allow_rules_in_fixed_band() {
        let mask = ResourceTypeMask::MAIN_FRAME | ResourceTypeMask::SUB_FRAME;
        let rules = whitelist_rules(&["Shop.Example.com", "news.org.", "shop.example.com"], mask);
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.action == RuleAction::Allow));
        assert!(rules.iter().all(|r| r.priority == WHITELIST_PRIORITY));
        assert_eq!(
            rules[0].pattern(),
            Some(&PatternDescriptor::DomainAnchor("shop.example.com".to_string()))
        );
        assert_eq!(rules[1].line, 2);
        assert_eq!(rules[0].options().unwrap().resource_types, mask);
        assert_eq!(rules[0].source, WHITELIST_SOURCE);
    }

    #[test]
    fn skips_invalid_entries() {
        let rules = whitelist_rules(&["", "  ", "not a domain", "ok.com"], ResourceTypeMask::MAIN_FRAME);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].line, 4);
    }

    #[test]
    fn strips_blocks_on_whitelisted_hosts() {
        let (rules, _) = compile_filter_list(
            "||shop.com^\n||cdn.shop.com^\n@@||shop.com^$script\n||ads.com^\n/shop.com/ad.\nshop.com##.ad",
            "list",
        );
        let (kept, stripped) = strip_whitelisted(rules, &["shop.com"]);
        assert_eq!(stripped, 2);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().any(|r| r.action == RuleAction::Allow));
        assert!(kept
            .iter()
            .any(|r| r.pattern() == Some(&PatternDescriptor::DomainAnchor("ads.com".to_string()))));
    }

    #[test]
    fn parent_match_only() {
        let domains: HashSet<String> = ["example.com".to_string()].into_iter().collect();
        assert!(is_whitelisted("example.com", &domains));
        assert!(is_whitelisted("a.b.example.com", &domains));
        assert!(!is_whitelisted("badexample.com", &domains));
        assert!(!is_whitelisted("com", &domains));
    }
}
