//! Role pattern resolution and the authorization decision.
//!
//! A required role is either a literal (`"manager"`) or a template carrying
//! one request-scoped placeholder: `manager-at-{{:business_id}}` binds from
//! path parameters, `manager-at-{{?business_id}}` from the query string.

use std::collections::HashMap;

const OPEN_TAG: &str = "{{";
const CLOSE_TAG: &str = "}}";
const TYPE_PATH: char = ':';
const TYPE_QUERY: char = '?';

/// Request-scoped parameters a role template can bind against.
#[derive(Debug, Default, Clone)]
pub struct RoleParams {
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

impl RoleParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// Expand one role pattern against the request's parameters.
///
/// Only the first `{{...}}` is substituted; text around it is preserved
/// verbatim. Malformed templates (no `}}`, or `}}` before `{{`) are
/// tolerated as literals. A placeholder whose backing parameter is absent
/// substitutes the empty string, matching the legacy-permissive behavior.
pub fn resolve(pattern: &str, params: &RoleParams) -> String {
    let Some(open) = pattern.find(OPEN_TAG) else {
        return pattern.to_string();
    };
    // The close tag is searched from the start of the pattern: a pattern
    // whose first `}}` precedes the `{{` is malformed and stays literal,
    // even when another `}}` follows later.
    let Some(close) = pattern.find(CLOSE_TAG) else {
        return pattern.to_string();
    };
    if close < open {
        return pattern.to_string();
    }

    let inner = &pattern[open + OPEN_TAG.len()..close];
    let mut chars = inner.chars();
    let source = chars.next();
    let name = chars.as_str();

    let bound = match source {
        Some(TYPE_PATH) => params.path.get(name),
        Some(TYPE_QUERY) => params.query.get(name),
        _ => return pattern.to_string(),
    };
    let value = bound.map(String::as_str).unwrap_or("");

    let mut resolved = String::with_capacity(pattern.len() + value.len());
    resolved.push_str(&pattern[..open]);
    resolved.push_str(value);
    resolved.push_str(&pattern[close + CLOSE_TAG.len()..]);
    resolved
}

/// Existential role check: ANY resolved required pattern present among the
/// granted roles authorizes the request. No weighting, no partial credit.
pub fn is_authorized<G, R>(granted: &[G], required_patterns: &[R], params: &RoleParams) -> bool
where
    G: AsRef<str>,
    R: AsRef<str>,
{
    required_patterns.iter().any(|pattern| {
        let resolved = resolve(pattern.as_ref(), params);
        granted.iter().any(|role| role.as_ref() == resolved)
    })
}
