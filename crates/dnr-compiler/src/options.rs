use dnr_core::types::{OptionSet, ResourceType};

/// Parse a filter's `$...` modifier string. Unknown modifiers are ignored.
pub fn parse_options(text: &str) -> OptionSet {
    let mut options = OptionSet::default();

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            for entry in split_domain_list(domain_value, &['|']) {
                match entry.strip_prefix('~') {
                    Some(excluded) if !excluded.is_empty() => {
                        options.excluded_domains.insert(excluded.to_string());
                    }
                    Some(_) => {}
                    None => {
                        options.domains.insert(entry.to_string());
                    }
                }
            }
            continue;
        }

        match raw_lower {
            "third-party" | "3p" => {
                options.third_party = Some(true);
                continue;
            }
            "~third-party" | "~3p" => {
                options.third_party = Some(false);
                continue;
            }
            "important" => {
                options.important = true;
                continue;
            }
            _ => {}
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        if let Some(resource_type) = resource_type_keyword(name) {
            let mask = resource_type.mask();
            // Last mention wins, so a type never ends up both included and excluded.
            if negated {
                options.resource_types.remove(mask);
                options.excluded_resource_types.insert(mask);
            } else {
                options.excluded_resource_types.remove(mask);
                options.resource_types.insert(mask);
            }
            continue;
        }

        log::trace!("ignoring unknown filter option '{raw}'");
    }

    options
}

/// Map a filter-list resource type keyword to the engine's type.
pub fn resource_type_keyword(name: &str) -> Option<ResourceType> {
    match name {
        "script" => Some(ResourceType::Script),
        "image" => Some(ResourceType::Image),
        "stylesheet" => Some(ResourceType::Stylesheet),
        "object" => Some(ResourceType::Object),
        "xmlhttprequest" => Some(ResourceType::XmlHttpRequest),
        "subdocument" | "sub_frame" => Some(ResourceType::SubFrame),
        "document" | "main_frame" => Some(ResourceType::MainFrame),
        "media" => Some(ResourceType::Media),
        "font" => Some(ResourceType::Font),
        "websocket" => Some(ResourceType::WebSocket),
        "ping" => Some(ResourceType::Ping),
        "other" => Some(ResourceType::Other),
        _ => None,
    }
}

/// Split a domain list on `separators`, trimming and dropping empty entries.
pub(crate) fn split_domain_list<'a>(
    value: &'a str,
    separators: &'a [char],
) -> impl Iterator<Item = &'a str> + 'a {
    value
        .split(separators)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnr_core::types::ResourceTypeMask;

    #[test]
    fn empty_input_is_default() {
        assert_eq!(parse_options(""), OptionSet::default());
        assert_eq!(parse_options("  "), OptionSet::default());
    }

    #[test]
    fn parses_domains() {
        let options = parse_options("domain=a.com| b.com ||~c.com");
        assert_eq!(options.domains.iter().collect::<Vec<_>>(), vec!["a.com", "b.com"]);
        assert_eq!(options.excluded_domains.iter().collect::<Vec<_>>(), vec!["c.com"]);
    }

    #[test]
    fn parses_party() {
        assert_eq!(parse_options("third-party").third_party, Some(true));
        assert_eq!(parse_options("3p").third_party, Some(true));
        assert_eq!(parse_options("~third-party").third_party, Some(false));
        assert_eq!(parse_options("~3p").third_party, Some(false));
        assert_eq!(parse_options("script").third_party, None);
    }

    #[test]
    fn parses_important() {
        assert!(parse_options("important").important);
        assert!(!parse_options("script").important);
    }

    #[test]
    fn parses_resource_types() {
        let options = parse_options("script, subdocument,~image,document");
        assert_eq!(
            options.resource_types,
            ResourceTypeMask::SCRIPT | ResourceTypeMask::SUB_FRAME | ResourceTypeMask::MAIN_FRAME
        );
        assert_eq!(options.excluded_resource_types, ResourceTypeMask::IMAGE);
    }

    #[test]
    fn type_never_both_included_and_excluded() {
        let options = parse_options("script,~script");
        assert!(options.resource_types.is_empty());
        assert_eq!(options.excluded_resource_types, ResourceTypeMask::SCRIPT);

        let options = parse_options("~script,script");
        assert_eq!(options.resource_types, ResourceTypeMask::SCRIPT);
        assert!(options.excluded_resource_types.is_empty());
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let options = parse_options("popup,redirect=noop.js,script,badfilter");
        assert_eq!(options.resource_types, ResourceTypeMask::SCRIPT);
        assert!(options.domains.is_empty());
    }

    #[test]
    fn keyword_table() {
        assert_eq!(resource_type_keyword("xmlhttprequest"), Some(ResourceType::XmlHttpRequest));
        assert_eq!(resource_type_keyword("websocket"), Some(ResourceType::WebSocket));
        assert_eq!(resource_type_keyword("ping"), Some(ResourceType::Ping));
        assert_eq!(resource_type_keyword("popup"), None);
    }
}
