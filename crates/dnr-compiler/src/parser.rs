use std::collections::BTreeSet;

use serde::Serialize;

use dnr_core::types::{OptionSet, PatternDescriptor, Rule, RuleAction, RuleBody, SelectorTarget};

use crate::options::{parse_options, split_domain_list};
use crate::pattern::compile_pattern;
use crate::priority::{calculate_priority, BASE_PRIORITY};

/// Why a single line was rejected. Never aborts compilation of a list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineParseError {
    #[error("empty network pattern")]
    EmptyPattern,
    #[error("'$' is not followed by any options")]
    UnterminatedOptions,
    #[error("empty selector after '{marker}'")]
    EmptySelector { marker: &'static str },
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// Per-list parse counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub parsed: usize,
    pub invalid: usize,
}

/// Parse a whole filter list, keeping rules in input order.
pub fn compile_filter_list(text: &str, source: &str) -> (Vec<Rule>, ParseStats) {
    let mut rules = Vec::new();
    let mut stats = ParseStats::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        match parse_line(raw_line, source, line_no) {
            Ok(Some(rule)) => {
                stats.parsed += 1;
                rules.push(rule);
            }
            Ok(None) => {}
            Err(err) => {
                stats.invalid += 1;
                log::debug!("{source}:{line_no}: skipping '{}': {err}", raw_line.trim());
            }
        }
    }

    log::info!(
        "compiled list '{source}': {} rules, {} invalid lines",
        stats.parsed,
        stats.invalid
    );

    (rules, stats)
}

/// Parse one line. `Ok(None)` for blank, comment and metadata lines.
pub fn parse_line(line: &str, source: &str, line_no: usize) -> Result<Option<Rule>, LineParseError> {
    let line = line.trim();
    if line.is_empty() || is_comment_line(line) {
        return Ok(None);
    }

    let (action, body) = if let Some((domains, selector)) = line.split_once("##") {
        (
            RuleAction::Hide,
            RuleBody::Cosmetic(parse_selector_target(domains, selector, "##")?),
        )
    } else if let Some((domains, selector)) = line.split_once("#@#") {
        (
            RuleAction::Unhide,
            RuleBody::Cosmetic(parse_selector_target(domains, selector, "#@#")?),
        )
    } else if let Some((domains, selector)) = line.split_once("#?#") {
        (
            RuleAction::Hide,
            RuleBody::Procedural(parse_selector_target(domains, selector, "#?#")?),
        )
    } else {
        return parse_network_rule(line, source, line_no).map(Some);
    };

    Ok(Some(Rule {
        action,
        body,
        priority: BASE_PRIORITY,
        source: source.to_string(),
        line: line_no,
    }))
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

fn parse_network_rule(line: &str, source: &str, line_no: usize) -> Result<Rule, LineParseError> {
    let (action, rest) = match line.strip_prefix("@@") {
        Some(rest) => (RuleAction::Allow, rest),
        None => (RuleAction::Block, line),
    };

    let (pattern_part, options_text) = split_rule_options(rest);
    let options = match options_text {
        Some(text) if text.trim().is_empty() => return Err(LineParseError::UnterminatedOptions),
        Some(text) => parse_options(text),
        None => OptionSet::default(),
    };

    let pattern_str = pattern_part.trim();
    if pattern_str.is_empty() {
        return Err(LineParseError::EmptyPattern);
    }

    let pattern = compile_pattern(pattern_str);
    check_pattern(&pattern)?;

    Ok(Rule {
        action,
        priority: calculate_priority(action, &options),
        body: RuleBody::Network { pattern, options },
        source: source.to_string(),
        line: line_no,
    })
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Reject descriptors the declarative engine could not use.
fn check_pattern(pattern: &PatternDescriptor) -> Result<(), LineParseError> {
    match pattern {
        PatternDescriptor::DomainAnchor(text)
        | PatternDescriptor::DomainPrefix(text)
        | PatternDescriptor::StartAnchor(text)
        | PatternDescriptor::EndAnchor(text)
            if text.is_empty() =>
        {
            Err(LineParseError::EmptyPattern)
        }
        PatternDescriptor::Regex(text) => match regex::Regex::new(text) {
            Ok(_) => Ok(()),
            Err(err) => Err(LineParseError::InvalidRegex {
                pattern: text.clone(),
                reason: err.to_string(),
            }),
        },
        _ => Ok(()),
    }
}

fn parse_selector_target(
    domains: &str,
    selector: &str,
    marker: &'static str,
) -> Result<SelectorTarget, LineParseError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(LineParseError::EmptySelector { marker });
    }

    let mut included = BTreeSet::new();
    let mut excluded = BTreeSet::new();
    for entry in split_domain_list(domains, &['|', ',']) {
        let entry = entry.to_ascii_lowercase();
        match entry.strip_prefix('~') {
            Some(rest) if !rest.is_empty() => {
                excluded.insert(rest.to_string());
            }
            Some(_) => {}
            None => {
                included.insert(entry);
            }
        }
    }

    Ok(SelectorTarget {
        selector: selector.to_string(),
        domains: included,
        excluded_domains: excluded,
    })
}
