use dnr_core::types::{is_hostname, PatternDescriptor};

/// Engine-native form of a pattern. Exactly one is emitted per rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchExpression {
    UrlFilter(String),
    RegexFilter(String),
    RequestDomains(Vec<String>),
}

/// Compile a raw filter pattern. Never fails; anything unrecognized is a substring.
///
/// The checks run in a fixed order and the first match wins. Domain-anchored
/// text is lowercased since hosts are case-insensitive.
pub fn compile_pattern(raw: &str) -> PatternDescriptor {
    if let Some(rest) = raw.strip_prefix("||") {
        return match rest.strip_suffix('^') {
            Some(domain) => PatternDescriptor::DomainAnchor(domain.to_ascii_lowercase()),
            None => PatternDescriptor::DomainPrefix(rest.to_ascii_lowercase()),
        };
    }

    if let Some(rest) = raw.strip_prefix('|') {
        return PatternDescriptor::StartAnchor(rest.to_string());
    }

    if let Some(rest) = raw.strip_suffix('|') {
        return PatternDescriptor::EndAnchor(rest.to_string());
    }

    if raw.contains('*') {
        return PatternDescriptor::Wildcard(raw.to_string());
    }

    if looks_like_regex(raw) {
        return PatternDescriptor::Regex(raw.to_string());
    }

    PatternDescriptor::Substring(raw.to_string())
}

/// Heuristic: any regex metacharacter, and no `*`.
pub fn looks_like_regex(pattern: &str) -> bool {
    const META: &[char] = &['[', ']', '{', '}', '(', ')', '.', '*', '+', '?', '^', '$', '|'];
    pattern.contains(META) && !pattern.contains('*')
}

/// Escape the characters that are special in a regular expression.
pub fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if matches!(
            ch,
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Regex form of a wildcard pattern: literal segments joined by `.*`.
pub fn wildcard_regex(pattern: &str) -> String {
    pattern
        .split('*')
        .map(escape_regex)
        .collect::<Vec<_>>()
        .join(".*")
}

/// Derive the engine-native match expression for a descriptor.
///
/// Domain-anchored patterns whose anchored text is not a bare hostname keep
/// the engine's own `||` syntax in a URL filter instead.
pub fn match_expression(pattern: &PatternDescriptor) -> MatchExpression {
    match pattern {
        PatternDescriptor::DomainAnchor(domain) => {
            if is_hostname(domain) {
                MatchExpression::RequestDomains(vec![domain.clone()])
            } else {
                MatchExpression::UrlFilter(format!("||{domain}^"))
            }
        }
        PatternDescriptor::DomainPrefix(domain) => {
            if is_hostname(domain) {
                MatchExpression::RequestDomains(vec![domain.clone()])
            } else {
                MatchExpression::UrlFilter(format!("||{domain}"))
            }
        }
        PatternDescriptor::DomainSet(domains) => MatchExpression::RequestDomains(domains.clone()),
        PatternDescriptor::StartAnchor(text) => MatchExpression::UrlFilter(format!("|{text}")),
        PatternDescriptor::EndAnchor(text) => MatchExpression::UrlFilter(format!("{text}|")),
        PatternDescriptor::Wildcard(text) => MatchExpression::UrlFilter(text.clone()),
        PatternDescriptor::Substring(text) => MatchExpression::UrlFilter(format!("*{text}*")),
        PatternDescriptor::Regex(text) => MatchExpression::RegexFilter(text.clone()),
    }
}
