// IBM Cloud MCP Server - Safe Mode Filter
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Gates execute_command. In safe mode a command passes only if it contains
// one of the read-only keywords below as a plain substring.
// Case-sensitive, no word boundaries: "xlistx" matches "list".

// ============================================================================
// READ-ONLY ALLOWLIST (compiled in, not configurable at runtime)
// ============================================================================

/// Keywords that mark a command as read-only. Order is the match order.
pub const READ_ONLY_KEYWORDS: &[&str] = &[
    "list",
    "show",
    "get",
    "target",
    "regions",
    "zones",
    "service-instances",
    "groups",
    "instances",
    "vpcs",
    "subnets",
    "apps",
    "plugins",
    "catalog",
    "help",
    "version",
];

/// First allowlist keyword contained in `raw`, if any
pub fn matching_keyword(raw: &str) -> Option<&'static str> {
    READ_ONLY_KEYWORDS.iter().copied().find(|kw| raw.contains(kw))
}

/// Decide whether `raw` may run. With safe mode off everything is allowed.
pub fn is_allowed(raw: &str, safe_mode: bool) -> bool {
    if !safe_mode {
        return true;
    }
    matching_keyword(raw).is_some()
}

/// Split a composed command line into discrete arguments.
/// Whitespace separates arguments; single and double quotes group.
/// A leading `ibmcloud` token is dropped since the backend supplies it.
pub fn split_command(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }

    if args.first().map(|a| a == "ibmcloud").unwrap_or(false) {
        args.remove(0);
    }
    args
}

// ============================================================================
// TESTS
// ============================================================================
