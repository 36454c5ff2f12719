//! Core type definitions for dnr-forge
//!
//! These types describe a parsed filter rule independently of the
//! declarative output format; the compiler crate turns them into
//! engine-native conditions.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// =============================================================================
// Rule Kinds and Actions
// =============================================================================

/// Which grammar family a rule was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Network,
    Cosmetic,
    Procedural,
}

/// Action to take for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Network rule - cancels the request
    Block,
    /// Exception rule (@@...) - allows the request
    Allow,
    /// Cosmetic/procedural rule (##, #?#) - hides matching elements
    Hide,
    /// Cosmetic exception (#@#) - undoes a hide rule
    Unhide,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
            Self::Hide => "hide",
            Self::Unhide => "unhide",
        }
    }
}

// =============================================================================
// Resource Types
// =============================================================================

/// Category of a network request, named the way the declarative engine names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "main_frame")]
    MainFrame,
    #[serde(rename = "sub_frame")]
    SubFrame,
    #[serde(rename = "stylesheet")]
    Stylesheet,
    #[serde(rename = "script")]
    Script,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "font")]
    Font,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "media")]
    Media,
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "other")]
    Other,
}

impl ResourceType {
    /// Every type, in emission order.
    pub const ALL: [ResourceType; 12] = [
        Self::MainFrame,
        Self::SubFrame,
        Self::Stylesheet,
        Self::Script,
        Self::Image,
        Self::Font,
        Self::Object,
        Self::XmlHttpRequest,
        Self::Ping,
        Self::Media,
        Self::WebSocket,
        Self::Other,
    ];

    /// Name used by the declarative engine.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainFrame => "main_frame",
            Self::SubFrame => "sub_frame",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Object => "object",
            Self::XmlHttpRequest => "xmlhttprequest",
            Self::Ping => "ping",
            Self::Media => "media",
            Self::WebSocket => "websocket",
            Self::Other => "other",
        }
    }

    pub fn mask(self) -> ResourceTypeMask {
        match self {
            Self::MainFrame => ResourceTypeMask::MAIN_FRAME,
            Self::SubFrame => ResourceTypeMask::SUB_FRAME,
            Self::Stylesheet => ResourceTypeMask::STYLESHEET,
            Self::Script => ResourceTypeMask::SCRIPT,
            Self::Image => ResourceTypeMask::IMAGE,
            Self::Font => ResourceTypeMask::FONT,
            Self::Object => ResourceTypeMask::OBJECT,
            Self::XmlHttpRequest => ResourceTypeMask::XMLHTTPREQUEST,
            Self::Ping => ResourceTypeMask::PING,
            Self::Media => ResourceTypeMask::MEDIA,
            Self::WebSocket => ResourceTypeMask::WEBSOCKET,
            Self::Other => ResourceTypeMask::OTHER,
        }
    }
}

bitflags::bitflags! {
    /// Set of resource types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypeMask: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const MEDIA = 1 << 9;
        const WEBSOCKET = 1 << 10;
        const OTHER = 1 << 11;
    }
}

impl Default for ResourceTypeMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl ResourceTypeMask {
    /// Members of the set in `ResourceType::ALL` order.
    pub fn types(self) -> impl Iterator<Item = ResourceType> {
        ResourceType::ALL
            .into_iter()
            .filter(move |t| self.contains(t.mask()))
    }

    pub fn count(self) -> u32 {
        self.bits().count_ones()
    }
}

impl FromIterator<ResourceType> for ResourceTypeMask {
    fn from_iter<I: IntoIterator<Item = ResourceType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |mask, t| mask | t.mask())
    }
}

// =============================================================================
// Options
// =============================================================================

/// Structured form of a network filter's `$...` modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OptionSet {
    /// Initiator domains the rule is restricted to (empty = unrestricted)
    pub domains: BTreeSet<String>,
    /// Initiator domains excluded with `domain=~...`
    pub excluded_domains: BTreeSet<String>,
    /// `Some(true)` = third-party only, `Some(false)` = first-party only
    pub third_party: Option<bool>,
    pub resource_types: ResourceTypeMask,
    pub excluded_resource_types: ResourceTypeMask,
    /// `$important`
    pub important: bool,
}

impl OptionSet {
    /// True when no initiator modifier (`domain=`, party) narrows the rule.
    pub fn is_initiator_unrestricted(&self) -> bool {
        self.domains.is_empty() && self.excluded_domains.is_empty() && self.third_party.is_none()
    }

    /// Resource types the rule applies to once emitted.
    ///
    /// Named types minus exclusions; all types minus exclusions when only
    /// exclusions are given; `default_types` when neither is.
    pub fn effective_resource_types(&self, default_types: ResourceTypeMask) -> ResourceTypeMask {
        if !self.resource_types.is_empty() {
            self.resource_types.difference(self.excluded_resource_types)
        } else if !self.excluded_resource_types.is_empty() {
            ResourceTypeMask::all().difference(self.excluded_resource_types)
        } else {
            default_types
        }
    }

    /// True when every request matched under `other` is also matched under `self`.
    ///
    /// Initiator scope must be absent or identical, and the effective type set
    /// must be a superset of `other`'s.
    pub fn subsumes(&self, other: &OptionSet, default_types: ResourceTypeMask) -> bool {
        let same_scope = self.domains == other.domains
            && self.excluded_domains == other.excluded_domains
            && self.third_party == other.third_party;
        (self.is_initiator_unrestricted() || same_scope)
            && self
                .effective_resource_types(default_types)
                .contains(other.effective_resource_types(default_types))
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Canonical match descriptor produced from a raw network filter pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternDescriptor {
    /// `||domain^`
    DomainAnchor(String),
    /// `||domain` without a trailing separator
    DomainPrefix(String),
    /// `|text`
    StartAnchor(String),
    /// `text|`
    EndAnchor(String),
    /// Contains `*`
    Wildcard(String),
    /// Looks like a regular expression
    Regex(String),
    /// Plain substring
    Substring(String),
    /// Several bare-host `DomainAnchor`s folded into one rule by the optimizer
    DomainSet(Vec<String>),
}

impl PatternDescriptor {
    /// Filter text this descriptor was compiled from, one entry per matched domain
    /// for `DomainSet`.
    pub fn filter_texts(&self) -> Vec<String> {
        match self {
            Self::DomainAnchor(domain) => vec![format!("||{domain}^")],
            Self::DomainPrefix(domain) => vec![format!("||{domain}")],
            Self::StartAnchor(text) => vec![format!("|{text}")],
            Self::EndAnchor(text) => vec![format!("{text}|")],
            Self::Wildcard(text) | Self::Regex(text) | Self::Substring(text) => vec![text.clone()],
            Self::DomainSet(domains) => domains.iter().map(|d| format!("||{d}^")).collect(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard(_))
    }

    /// Hostname matched by a domain-anchored pattern, if the anchored text is a bare host.
    pub fn anchored_host(&self) -> Option<&str> {
        match self {
            Self::DomainAnchor(value) | Self::DomainPrefix(value) if is_hostname(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// ASCII hostname check: labels of letters, digits and `-` separated by single dots.
pub fn is_hostname(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && !value.ends_with('.')
        && !value.contains("..")
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

// =============================================================================
// Rules
// =============================================================================

/// Selector plus the page domains it applies to (empty = every domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorTarget {
    pub selector: String,
    pub domains: BTreeSet<String>,
    pub excluded_domains: BTreeSet<String>,
}

/// Kind-specific payload of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleBody {
    Network {
        pattern: PatternDescriptor,
        options: OptionSet,
    },
    Cosmetic(SelectorTarget),
    Procedural(SelectorTarget),
}

/// A parsed filter rule.
///
/// Equality and hashing use the canonical key only; `source` and `line` are
/// provenance and never make two rules distinct.
#[derive(Debug, Clone)]
pub struct Rule {
    pub action: RuleAction,
    pub body: RuleBody,
    pub priority: u32,
    /// Originating list name
    pub source: String,
    /// 1-based line number in `source`
    pub line: usize,
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self.body {
            RuleBody::Network { .. } => RuleKind::Network,
            RuleBody::Cosmetic(_) => RuleKind::Cosmetic,
            RuleBody::Procedural(_) => RuleKind::Procedural,
        }
    }

    pub fn pattern(&self) -> Option<&PatternDescriptor> {
        match &self.body {
            RuleBody::Network { pattern, .. } => Some(pattern),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&OptionSet> {
        match &self.body {
            RuleBody::Network { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn selector(&self) -> Option<&SelectorTarget> {
        match &self.body {
            RuleBody::Cosmetic(target) | RuleBody::Procedural(target) => Some(target),
            RuleBody::Network { .. } => None,
        }
    }

    /// Canonical identity used for deduplication.
    pub fn key(&self) -> RuleKey {
        RuleKey::from(self)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action && self.body == other.body
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.action.hash(state);
        self.body.hash(state);
    }
}

/// Owned dedup key: `(kind, action, pattern-or-selector, domains, options)`.
///
/// The kind is carried by the `RuleBody` variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub action: RuleAction,
    pub body: RuleBody,
}

impl From<&Rule> for RuleKey {
    fn from(rule: &Rule) -> Self {
        Self {
            action: rule.action,
            body: rule.body.clone(),
        }
    }
}
