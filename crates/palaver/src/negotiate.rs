//! Protocol Version Negotiation
//!
//! Pure selection of a mutually supported protocol version. Clients
//! advertise the versions they speak as a comma-separated header; the
//! negotiator picks the greatest version both sides support, falling
//! back to the configured default when there is no overlap or no
//! advertisement at all.

use std::collections::BTreeSet;

use crate::error::GatewayError;

/// Header a client sends to advertise the versions it speaks.
pub const VERSIONS_HEADER: &str = "palaver-versions";

/// Header carrying the version the server selected for this exchange.
pub const NEGOTIATED_HEADER: &str = "palaver-version";

/// Immutable version negotiator, safe to share across sessions.
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    supported: BTreeSet<String>,
    default_version: String,
}

impl VersionNegotiator {
    /// Create a negotiator for the given supported versions.
    ///
    /// When `default_version` is `None` the greatest supported version
    /// becomes the default. An explicit default outside the supported
    /// set is a configuration error.
    pub fn new(
        supported: impl IntoIterator<Item = String>,
        default_version: Option<String>,
    ) -> Result<Self, GatewayError> {
        let supported: BTreeSet<String> = supported.into_iter().collect();

        let default_version = match default_version {
            Some(v) => {
                if !supported.contains(&v) {
                    return Err(GatewayError::Configuration(format!(
                        "default version {} is not in the supported set",
                        v
                    )));
                }
                v
            }
            None => supported
                .iter()
                .next_back()
                .cloned()
                .ok_or_else(|| {
                    GatewayError::Configuration(
                        "at least one supported protocol version is required".into(),
                    )
                })?,
        };

        Ok(Self {
            supported,
            default_version,
        })
    }

    /// Select the best version for a client advertisement.
    ///
    /// `advertised` is the raw comma-separated header value, or `None`
    /// when the client sent nothing. The result is always a member of
    /// the supported set.
    pub fn detect_version(&self, advertised: Option<&str>) -> &str {
        let Some(raw) = advertised else {
            return &self.default_version;
        };

        let client: BTreeSet<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();

        if client.is_empty() {
            return &self.default_version;
        }

        self.supported
            .iter()
            .filter(|v| client.contains(v.as_str()))
            .next_back()
            .map(String::as_str)
            .unwrap_or(&self.default_version)
    }

    /// Supported versions joined descending, for the advertisement header.
    pub fn advertisement(&self) -> String {
        self.supported
            .iter()
            .rev()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The version used when negotiation yields no common ground.
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Whether a version is in the supported set.
    pub fn supports(&self, version: &str) -> bool {
        self.supported.contains(version)
    }
}
