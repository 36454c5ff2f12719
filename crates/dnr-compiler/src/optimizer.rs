use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use dnr_core::types::{OptionSet, PatternDescriptor, ResourceTypeMask, Rule, RuleAction, RuleBody, RuleKey};

use crate::emitter::default_resource_types;
use crate::pattern::wildcard_regex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduplicated: usize,
    /// Rules folded away by domain-merge (a group of n contributes n - 1)
    pub merged: usize,
    pub redundant: usize,
}

/// Dedup, priority-sort, merge domain anchors and drop covered rules.
///
/// Idempotent: running it on its own output changes nothing.
pub fn optimize(rules: Vec<Rule>) -> Vec<Rule> {
    optimize_with_stats(rules).0
}

pub fn optimize_with_stats(rules: Vec<Rule>) -> (Vec<Rule>, OptimizeStats) {
    optimize_with_defaults(rules, default_resource_types())
}

/// Like [`optimize_with_stats`], with the type set that untyped rules will be
/// emitted with. Coverage is only established against that set.
pub fn optimize_with_defaults(rules: Vec<Rule>, default_types: ResourceTypeMask) -> (Vec<Rule>, OptimizeStats) {
    let before = rules.len();

    let (mut rules, deduplicated) = dedup(rules);
    sort_by_priority(&mut rules);
    let (rules, merged) = merge_domain_anchors(rules);
    let (rules, redundant) = eliminate_redundant(rules, default_types);

    let stats = OptimizeStats {
        before,
        after: rules.len(),
        deduplicated,
        merged,
        redundant,
    };

    log::info!(
        "optimized {} -> {} rules (deduplicated {}, merged {}, redundant {})",
        stats.before,
        stats.after,
        stats.deduplicated,
        stats.merged,
        stats.redundant
    );

    (rules, stats)
}

/// Keep the first occurrence of every canonical key. A dropped duplicate
/// with a higher priority lends it to the survivor.
fn dedup(rules: Vec<Rule>) -> (Vec<Rule>, usize) {
    let mut seen: HashMap<RuleKey, usize> = HashMap::with_capacity(rules.len());
    let mut unique: Vec<Rule> = Vec::with_capacity(rules.len());
    let mut deduped = 0usize;

    for rule in rules {
        let key = rule.key();
        match seen.get(&key).copied() {
            Some(index) => {
                deduped += 1;
                let kept = &mut unique[index];
                kept.priority = kept.priority.max(rule.priority);
            }
            None => {
                seen.insert(key, unique.len());
                unique.push(rule);
            }
        }
    }

    (unique, deduped)
}

/// Stable: equal priorities keep input order.
fn sort_by_priority(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MergeKey {
    action: RuleAction,
    options: OptionSet,
    priority: u32,
}

/// Bare-host `DomainAnchor` of a network rule, if it can take part in a merge.
fn mergeable_domain(rule: &Rule) -> Option<(&str, &OptionSet)> {
    match &rule.body {
        RuleBody::Network {
            pattern: pattern @ PatternDescriptor::DomainAnchor(_),
            options,
        } => pattern.anchored_host().map(|host| (host, options)),
        _ => None,
    }
}

/// Replace each group of two or more `DomainAnchor` rules sharing action and
/// options with one `DomainSet` rule, placed where the group's first member was.
fn merge_domain_anchors(rules: Vec<Rule>) -> (Vec<Rule>, usize) {
    let mut groups: HashMap<MergeKey, Vec<usize>> = HashMap::new();
    for (index, rule) in rules.iter().enumerate() {
        if let Some((_, options)) = mergeable_domain(rule) {
            let key = MergeKey {
                action: rule.action,
                options: options.clone(),
                priority: rule.priority,
            };
            groups.entry(key).or_default().push(index);
        }
    }

    // index of a group's first member -> every member index
    let mut leaders: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut absorbed: HashSet<usize> = HashSet::new();
    for members in groups.into_values() {
        if members.len() < 2 {
            continue;
        }
        absorbed.extend(members[1..].iter().copied());
        leaders.insert(members[0], members);
    }

    if leaders.is_empty() {
        return (rules, 0);
    }

    let mut merged_count = 0usize;
    let mut output = Vec::with_capacity(rules.len() - absorbed.len());
    for (index, rule) in rules.iter().enumerate() {
        if absorbed.contains(&index) {
            continue;
        }
        match leaders.get(&index) {
            Some(members) => {
                let domains: Vec<String> = members
                    .iter()
                    .filter_map(|&i| mergeable_domain(&rules[i]).map(|(host, _)| host.to_string()))
                    .collect();
                merged_count += members.len() - 1;
                output.push(Rule {
                    action: rule.action,
                    body: RuleBody::Network {
                        pattern: PatternDescriptor::DomainSet(domains),
                        options: rule.options().cloned().unwrap_or_default(),
                    },
                    priority: rule.priority,
                    source: rule.source.clone(),
                    line: rule.line,
                });
            }
            None => output.push(rule.clone()),
        }
    }

    (output, merged_count)
}

/// Characters that make a regex pattern more than a literal with `.` wildcards.
const REGEX_OPERATORS: &[char] = &['[', ']', '{', '}', '(', ')', '*', '+', '?', '^', '$', '|', '\\'];

/// Stand-in for a regex `.` when testing coverage. Never appears in filter text,
/// so a cover that matches it matches every character in its place.
const ANY_CHAR: char = '\u{1}';

/// Texts to test for coverage, or `None` when the pattern can never be
/// proven covered.
fn coverage_texts(pattern: &PatternDescriptor) -> Option<Vec<String>> {
    match pattern {
        PatternDescriptor::Wildcard(_) => None,
        PatternDescriptor::Regex(text) if text.contains(REGEX_OPERATORS) => None,
        PatternDescriptor::Regex(text) => Some(vec![text.replace('.', &ANY_CHAR.to_string())]),
        other => Some(other.filter_texts()),
    }
}

/// An accepted wildcard rule other rules may be checked against.
struct Cover {
    action: RuleAction,
    options: OptionSet,
    regex: Regex,
    default_types: ResourceTypeMask,
}

impl Cover {
    fn from_rule(rule: &Rule, default_types: ResourceTypeMask) -> Option<Self> {
        let RuleBody::Network {
            pattern: PatternDescriptor::Wildcard(text),
            options,
        } = &rule.body
        else {
            return None;
        };
        let regex = Regex::new(&wildcard_regex(text)).ok()?;
        Some(Self {
            action: rule.action,
            options: options.clone(),
            regex,
            default_types,
        })
    }

    fn covers(&self, rule: &Rule) -> bool {
        let RuleBody::Network { pattern, options } = &rule.body else {
            return false;
        };
        if rule.action != self.action || !self.options.subsumes(options, self.default_types) {
            return false;
        }
        match coverage_texts(pattern) {
            Some(texts) => texts
                .iter()
                .all(|text| !text.contains('*') && self.regex.is_match(text)),
            None => false,
        }
    }
}

/// Drop non-wildcard rules whose filter text and resource types an earlier,
/// same-action wildcard rule already matches.
fn eliminate_redundant(rules: Vec<Rule>, default_types: ResourceTypeMask) -> (Vec<Rule>, usize) {
    let mut covers: Vec<Cover> = Vec::new();
    let mut accepted = Vec::with_capacity(rules.len());
    let mut redundant = 0usize;

    for rule in rules {
        if covers.iter().any(|cover| cover.covers(&rule)) {
            log::trace!("{}:{}: rule is covered by a broader wildcard", rule.source, rule.line);
            redundant += 1;
            continue;
        }
        if let Some(cover) = Cover::from_rule(&rule, default_types) {
            covers.push(cover);
        }
        accepted.push(rule);
    }

    (accepted, redundant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile_filter_list;
    use dnr_core::types::RuleKind;

    fn rules(text: &str) -> Vec<Rule> {
        compile_filter_list(text, "test").0
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let input = rules("||ads.com^$script,third-party\n||ads.com^$3p, script\n||ads.com^$image");
        let (output, stats) = optimize_with_stats(input);
        assert_eq!(stats.deduplicated, 1);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].line, 1);
    }

    #[test]
    fn dedup_keeps_highest_priority() {
        let mut input = crate::whitelist::whitelist_rules(
            &["shop.com"],
            ResourceTypeMask::MAIN_FRAME | ResourceTypeMask::SUB_FRAME,
        );
        input.extend(rules("@@||shop.com^$document,subdocument"));
        assert_eq!(input[0].priority, 10_000);
        assert_eq!(input[1].priority, 10_001);

        let (output, stats) = optimize_with_stats(input);
        assert_eq!(stats.deduplicated, 1);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].priority, 10_001);
        assert_eq!(output[0].source, "whitelist");
    }

    #[test]
    fn dedup_ignores_provenance() {
        let mut input = compile_filter_list("example.com##.ad", "easylist").0;
        input.extend(compile_filter_list("\n\nexample.com##.ad", "custom").0);
        let output = optimize(input);
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].source, "easylist");
    }

    #[test]
    fn allow_sorts_before_block() {
        let output = optimize(rules("||example.com^\n@@||example.com^"));
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].action, RuleAction::Allow);
        assert!(output[0].priority >= 10_001);
        assert_eq!(output[1].action, RuleAction::Block);
        assert_eq!(output[1].priority, 1);
    }

    #[test]
    fn sort_is_stable_for_equal_priority() {
        let output = optimize(rules("/a/x.\n/b/x.\n/c/x."));
        let lines: Vec<_> = output.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn merges_fifty_domain_anchors() {
        let text: String = (0..50).map(|i| format!("||ads{i}.example.com^\n")).collect();
        let (output, stats) = optimize_with_stats(rules(&text));
        assert_eq!(output.len(), 1);
        assert_eq!(stats.merged, 49);
        let Some(PatternDescriptor::DomainSet(domains)) = output[0].pattern() else {
            panic!("expected a merged domain set, got {:?}", output[0].pattern());
        };
        assert_eq!(domains.len(), 50);
        for i in 0..50 {
            assert!(domains.contains(&format!("ads{i}.example.com")));
        }
        assert_eq!(output[0].action, RuleAction::Block);
        assert_eq!(output[0].priority, 1);
    }

    #[test]
    fn merge_respects_action_and_options() {
        let output = optimize(rules(
            "||a.com^\n||b.com^\n@@||c.com^\n@@||d.com^\n||e.com^$script\n||f.com/path^",
        ));
        assert_eq!(output.len(), 4);
        assert_eq!(
            output[0].pattern(),
            Some(&PatternDescriptor::DomainSet(vec!["c.com".into(), "d.com".into()]))
        );
        assert_eq!(output[1].priority, 11);
        assert_eq!(
            output[2].pattern(),
            Some(&PatternDescriptor::DomainSet(vec!["a.com".into(), "b.com".into()]))
        );
        assert_eq!(
            output[3].pattern(),
            Some(&PatternDescriptor::DomainAnchor("f.com/path".into()))
        );
    }

    #[test]
    fn wildcard_covers_literal_of_same_action() {
        let output = optimize(rules("*ads*\nadsbygoogle.js"));
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].pattern(), Some(&PatternDescriptor::Wildcard("*ads*".into())));
    }

    #[test]
    fn allow_wildcard_never_covers_block() {
        let output = optimize(rules("@@*ads*\nadsbygoogle.js"));
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].action, RuleAction::Allow);
        assert_eq!(output[1].action, RuleAction::Block);
    }

    #[test]
    fn narrower_wildcard_does_not_cover_unrestricted_rule() {
        let output = optimize(rules("*ads*$domain=site.com\nadsbygoogle.js"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn untyped_wildcard_does_not_cover_types_outside_defaults() {
        let output = optimize(rules("*ads*\nads.js$font,ping"));
        assert_eq!(output.len(), 2);
        assert_eq!(
            output[1].options().unwrap().resource_types,
            ResourceTypeMask::FONT | ResourceTypeMask::PING
        );

        let output = optimize(rules("*ads*\nadsbygoogle.js$~script"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn untyped_wildcard_covers_types_inside_defaults() {
        let (output, stats) = optimize_with_stats(rules("*ads*\nadsbygoogle.js$script,image"));
        assert_eq!(output.len(), 1);
        assert_eq!(stats.redundant, 1);
    }

    #[test]
    fn typed_wildcard_covers_only_its_types() {
        let output = optimize(rules("*ads*$script\nads.js$script"));
        assert_eq!(output.len(), 1);

        let output = optimize(rules("*ads*$script\n*ads*$image\nads.js$image,script"));
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn coverage_uses_configured_defaults() {
        let input = rules("*ads*\nads.js$font,media");
        let (output, _) = optimize_with_defaults(input.clone(), default_resource_types());
        assert_eq!(output.len(), 2);

        let (output, _) = optimize_with_defaults(input, default_resource_types() | ResourceTypeMask::FONT);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn regex_with_operators_is_never_covered() {
        let output = optimize(rules("*ads*\nads|tracker"));
        assert_eq!(output.len(), 2);
        assert_eq!(output[1].pattern(), Some(&PatternDescriptor::Regex("ads|tracker".into())));

        let output = optimize(rules("*ads*\n/ads[0-9]+/"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn regex_dot_matches_any_character() {
        // `ads.js` also matches `adsXjs`, which `*ads.js*` does not
        let output = optimize(rules("*ads.js*\nads.js"));
        assert_eq!(output.len(), 2);

        let output = optimize(rules("*ads*\nads.js"));
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn wildcards_never_cover_wildcards() {
        let output = optimize(rules("*ads*\n*ads*.js"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn merged_set_is_covered_only_when_every_domain_is() {
        let output = optimize(rules("*tracker*\n||tracker.a.com^\n||tracker.b.com^"));
        assert_eq!(output.len(), 1);

        let output = optimize(rules("*tracker*\n||tracker.a.com^\n||ads.b.com^"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn cosmetic_rules_pass_through() {
        let output = optimize(rules("example.org##.ad-banner\n*ad*"));
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].kind(), RuleKind::Cosmetic);
    }

    #[test]
    fn end_to_end_ordering() {
        let output = optimize(rules(
            "||track.example.com^\n@@||shop.example.com^\nexample.org##.ad-banner\n",
        ));
        assert_eq!(output.len(), 3);
        assert_eq!(output[0].action, RuleAction::Allow);
        assert_eq!(output[0].priority, 10_001);
        assert_eq!(output[1].action, RuleAction::Block);
        assert_eq!(output[1].priority, 1);
        assert_eq!(output[2].kind(), RuleKind::Cosmetic);
    }

    #[test]
    fn idempotent() {
        let input = rules(
            "||a.com^\n||b.com^\n*ads*\n/ads/banner.\n@@||c.com^\n||a.com^\nexample.com##.ad\n||d.com^$important",
        );
        let once = optimize(input);
        let twice = optimize(once.clone());
        assert_eq!(once, twice);
        let priorities: Vec<_> = once.iter().map(|r| r.priority).collect();
        let twice_priorities: Vec<_> = twice.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, twice_priorities);
    }
}
