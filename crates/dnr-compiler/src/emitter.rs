//! Declarative rule emission
//!
//! Turns optimized network rules into the condition/action records the host
//! engine registers, numbering them and slicing them into registration batches.

use serde::Serialize;

use dnr_core::types::{ResourceType, ResourceTypeMask, Rule, RuleAction, RuleBody};

use crate::pattern::{match_expression, MatchExpression};

/// Largest number of rules the host engine accepts per registration call.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Types a rule applies to when its filter names none.
pub fn default_resource_types() -> ResourceTypeMask {
    ResourceTypeMask::SCRIPT
        | ResourceTypeMask::IMAGE
        | ResourceTypeMask::STYLESHEET
        | ResourceTypeMask::SUB_FRAME
        | ResourceTypeMask::XMLHTTPREQUEST
        | ResourceTypeMask::MEDIA
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarativeAction {
    Block,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainType {
    FirstParty,
    ThirdParty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_initiator_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<ResourceType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<DomainType>,
}

/// One record in the host engine's format. `id` is assigned at emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeclarativeRule {
    pub id: u32,
    pub priority: u32,
    pub action: DeclarativeAction,
    pub condition: RuleCondition,
}

/// Contiguous slice of the emitted rules, registered in one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Batch {
    pub index: usize,
    pub rules: Vec<DeclarativeRule>,
}

/// Emit network rules in order with the default type set.
pub fn emit(rules: &[Rule], batch_size: usize) -> Vec<Batch> {
    emit_with_defaults(rules, batch_size, default_resource_types())
}

/// Emit network rules in order, ids from 1, at most `batch_size` per batch.
///
/// Cosmetic and procedural rules are skipped and consume no id. A zero
/// `batch_size` is treated as 1.
pub fn emit_with_defaults(rules: &[Rule], batch_size: usize, default_types: ResourceTypeMask) -> Vec<Batch> {
    let mut emitted = Vec::with_capacity(rules.len());
    let mut next_id = 1u32;

    for rule in rules {
        if let Some(declarative) = to_declarative(rule, next_id, default_types) {
            emitted.push(declarative);
            next_id += 1;
        }
    }

    let batches: Vec<Batch> = emitted
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            rules: chunk.to_vec(),
        })
        .collect();

    log::info!("emitted {} rules in {} batches", emitted.len(), batches.len());

    batches
}

/// Convert one network rule. `None` for non-network rules and for rules
/// whose type exclusions leave nothing to match.
pub fn to_declarative(rule: &Rule, id: u32, default_types: ResourceTypeMask) -> Option<DeclarativeRule> {
    let RuleBody::Network { pattern, options } = &rule.body else {
        return None;
    };

    let action = match rule.action {
        RuleAction::Block => DeclarativeAction::Block,
        RuleAction::Allow => DeclarativeAction::Allow,
        RuleAction::Hide | RuleAction::Unhide => return None,
    };

    let mut condition = RuleCondition::default();
    match match_expression(pattern) {
        MatchExpression::UrlFilter(filter) => condition.url_filter = Some(filter),
        MatchExpression::RegexFilter(filter) => condition.regex_filter = Some(filter),
        MatchExpression::RequestDomains(domains) => condition.request_domains = Some(domains),
    }

    let types = options.effective_resource_types(default_types);
    if types.is_empty() {
        log::debug!("{}:{}: rule excludes every resource type", rule.source, rule.line);
        return None;
    }
    condition.resource_types = Some(types.types().collect());

    if !options.domains.is_empty() {
        condition.initiator_domains = Some(options.domains.iter().cloned().collect());
    }
    if !options.excluded_domains.is_empty() {
        condition.excluded_initiator_domains = Some(options.excluded_domains.iter().cloned().collect());
    }

    condition.domain_type = options.third_party.map(|third_party| {
        if third_party {
            DomainType::ThirdParty
        } else {
            DomainType::FirstParty
        }
    });

    Some(DeclarativeRule {
        id,
        priority: rule.priority,
        action,
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::optimize;
    use crate::parser::compile_filter_list;

    fn compile(text: &str) -> Vec<Rule> {
        optimize(compile_filter_list(text, "test").0)
    }

    fn all_rules(batches: &[Batch]) -> Vec<&DeclarativeRule> {
        batches.iter().flat_map(|b| b.rules.iter()).collect()
    }

    #[test]
    fn assigns_sequential_ids_skipping_cosmetics() {
        let rules = compile("||a.com^$script\nexample.com##.ad\n@@||b.com^\n/banner/*.png");
        let batches = emit(&rules, DEFAULT_BATCH_SIZE);
        let emitted = all_rules(&batches);
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(emitted[0].action, DeclarativeAction::Allow);
        assert_eq!(emitted[0].priority, 10_001);
    }

    #[test]
    fn condition_per_pattern_variant() {
        let rules = compile("||ads.com^\n|https://track.\n/ads[0-9]+/");
        let batches = emit(&rules, 10);
        let emitted = all_rules(&batches);

        assert_eq!(emitted[0].condition.request_domains, Some(vec!["ads.com".to_string()]));
        assert!(emitted[0].condition.url_filter.is_none());
        assert_eq!(emitted[1].condition.url_filter.as_deref(), Some("|https://track."));
        assert_eq!(emitted[2].condition.regex_filter.as_deref(), Some("/ads[0-9]+/"));
        assert!(emitted[2].condition.url_filter.is_none());
    }

    #[test]
    fn options_become_condition_fields() {
        let rules = compile("||cdn.com^$script,third-party,domain=a.com|~b.a.com");
        let batches = emit(&rules, 10);
        let condition = &batches[0].rules[0].condition;
        assert_eq!(condition.resource_types, Some(vec![ResourceType::Script]));
        assert_eq!(condition.domain_type, Some(DomainType::ThirdParty));
        assert_eq!(condition.initiator_domains, Some(vec!["a.com".to_string()]));
        assert_eq!(condition.excluded_initiator_domains, Some(vec!["b.a.com".to_string()]));
    }

    #[test]
    fn default_and_excluded_resource_types() {
        let rules = compile(
            "||a.com^\n||b.com^$~script,~image,~stylesheet,~object,~xmlhttprequest,~subdocument,~document,~media,~font,~websocket,~ping",
        );
        let batches = emit(&rules, 10);
        let emitted = all_rules(&batches);
        assert_eq!(
            emitted[0].condition.resource_types,
            Some(vec![
                ResourceType::SubFrame,
                ResourceType::Stylesheet,
                ResourceType::Script,
                ResourceType::Image,
                ResourceType::XmlHttpRequest,
                ResourceType::Media,
            ])
        );
        assert_eq!(emitted[1].condition.resource_types, Some(vec![ResourceType::Other]));
    }

    #[test]
    fn merged_domains_emit_one_request_domains_rule() {
        let rules = compile("||a.com^\n||b.com^\n||c.com^");
        let batches = emit(&rules, 10);
        let emitted = all_rules(&batches);
        assert_eq!(emitted.len(), 1);
        assert_eq!(
            emitted[0].condition.request_domains,
            Some(vec!["a.com".to_string(), "b.com".to_string(), "c.com".to_string()])
        );
    }

    #[test]
    fn batches_are_contiguous_and_bounded() {
        let text: String = (0..12).map(|i| format!("/path{i}/ad.\n")).collect();
        let rules = compile(&text);
        let batches = emit(&rules, 5);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.iter().map(|b| b.rules.len()).collect::<Vec<_>>(), vec![5, 5, 2]);
        assert_eq!(batches[1].index, 1);
        let ids: Vec<u32> = all_rules(&batches).iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let rules = compile("/a/x.\n/b/x.");
        let batches = emit(&rules, 0);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn empty_input_emits_no_batches() {
        assert!(emit(&[], DEFAULT_BATCH_SIZE).is_empty());
    }

    #[test]
    fn serializes_in_engine_shape() {
        let rules = compile("@@||shop.example.com^$~third-party");
        let batches = emit(&rules, 10);
        let json = serde_json::to_value(&batches[0].rules[0]).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["priority"], 10_001);
        assert_eq!(json["action"], "allow");
        assert_eq!(json["condition"]["requestDomains"][0], "shop.example.com");
        assert_eq!(json["condition"]["domainType"], "firstParty");
        assert_eq!(json["condition"]["resourceTypes"][0], "sub_frame");
        assert!(json["condition"].get("urlFilter").is_none());
    }
}
