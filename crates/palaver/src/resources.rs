//! Resource Templates and Routing
//!
//! URI templates carry `{name}` placeholders that compile once, at
//! registration time, into anchored regexes with named capture groups.
//! The router scans entries in registration order and the first
//! template whose method set and pattern both match wins. A URI that
//! matches nothing is a normal outcome, not a fault.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Verbs a resource can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// A compiled URI template.
///
/// Placeholders look like `{voice}` and match one or more non-slash
/// characters unless a constraint regex is supplied for that name.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
}

impl UriTemplate {
    /// Compile a template with no per-parameter constraints.
    pub fn new(pattern: &str) -> Result<Self, GatewayError> {
        Self::with_constraints(pattern, &HashMap::new())
    }

    /// Compile a template, substituting `constraints[name]` for each
    /// `{name}` placeholder. Malformed patterns fail here, not at
    /// match time.
    pub fn with_constraints(
        pattern: &str,
        constraints: &HashMap<String, String>,
    ) -> Result<Self, GatewayError> {
        let mut regex_src = String::from("^");
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            regex_src.push_str(&regex::escape(literal));

            let close = tail.find('}').ok_or_else(|| {
                GatewayError::Configuration(format!(
                    "unterminated placeholder in template {}",
                    pattern
                ))
            })?;
            let name = &tail[1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(GatewayError::Configuration(format!(
                    "invalid placeholder name {:?} in template {}",
                    name, pattern
                )));
            }

            let constraint = constraints.get(name).map(String::as_str).unwrap_or("[^/]+");
            regex_src.push_str(&format!("(?P<{}>{})", name, constraint));
            rest = &tail[close + 1..];
        }
        regex_src.push_str(&regex::escape(rest));
        regex_src.push('$');

        let regex = Regex::new(&regex_src).map_err(|e| {
            GatewayError::Configuration(format!("template {} does not compile: {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Match a URI, extracting the parameter mapping. Deterministic and
    /// side-effect free.
    pub fn matches(&self, uri: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(params)
    }

    /// The original template pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Provider of an addressable resource.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn fetch(
        &self,
        method: Method,
        params: BTreeMap<String, String>,
        body: Option<Value>,
    ) -> Result<Value, GatewayError>;
}

struct RouteEntry {
    template: UriTemplate,
    methods: HashSet<Method>,
    provider: Arc<dyn ResourceProvider>,
}

/// Ordered, first-match-wins resource router.
#[derive(Default)]
pub struct ResourceRouter {
    entries: RwLock<Vec<RouteEntry>>,
}

impl ResourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Order of registration is match order.
    pub fn register(
        &self,
        template: UriTemplate,
        methods: impl IntoIterator<Item = Method>,
        provider: Arc<dyn ResourceProvider>,
    ) {
        let entry = RouteEntry {
            template,
            methods: methods.into_iter().collect(),
            provider,
        };
        tracing::info!(pattern = %entry.template.pattern(), "Registered resource template");
        self.write().push(entry);
    }

    /// Find the first registered entry matching the method and URI.
    pub fn resolve(
        &self,
        method: Method,
        uri: &str,
    ) -> Option<(Arc<dyn ResourceProvider>, BTreeMap<String, String>)> {
        let entries = self.read();
        for entry in entries.iter() {
            if !entry.methods.contains(&method) {
                continue;
            }
            if let Some(params) = entry.template.matches(uri) {
                return Some((entry.provider.clone(), params));
            }
        }
        None
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<RouteEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<RouteEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
