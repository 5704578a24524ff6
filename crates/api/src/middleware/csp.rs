//! Content-Security-Policy builder.

use std::collections::BTreeMap;

use vitrine_core::error::CoreError;

/// Directives in emission order.
const DIRECTIVES: [&str; 10] = [
    "default-src",
    "script-src",
    "object-src",
    "style-src",
    "img-src",
    "media-src",
    "child-src",
    "font-src",
    "connect-src",
    "manifest-src",
];

/// Directives a site may override; the rest stay locked down.
pub const SETTABLE_DIRECTIVES: [&str; 7] = [
    "script-src",
    "style-src",
    "img-src",
    "child-src",
    "font-src",
    "connect-src",
    "manifest-src",
];

/// Header names the policy is sent under (standard plus legacy browsers).
pub const CSP_HEADERS: [&str; 3] = [
    "content-security-policy",
    "x-content-security-policy",
    "x-webkit-csp",
];

/// A Content-Security-Policy, one source list per directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    sources: Vec<(&'static str, Vec<String>)>,
}

impl Default for ContentSecurityPolicy {
    fn default() -> Self {
        let defaults: [&[&str]; 10] = [
            &["'none'"],
            &["'self'", "*.entrecode.de"],
            &["'none'"],
            &["'self'"],
            &["*"],
            &["*"],
            &["'none'"],
            &["'self'", "*.entrecode.de"],
            &["'self'", "*.entrecode.de"],
            &["'self'"],
        ];
        Self {
            sources: DIRECTIVES
                .iter()
                .zip(defaults)
                .map(|(name, values)| (*name, values.iter().map(|v| v.to_string()).collect()))
                .collect(),
        }
    }
}

impl ContentSecurityPolicy {
    /// The default policy with `overrides` (directive -> sources) applied.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self, CoreError> {
        let mut csp = Self::default();
        for (directive, sources) in overrides {
            csp.set(directive, sources.clone())?;
        }
        Ok(csp)
    }

    /// Replace the sources of a settable directive.
    pub fn set(&mut self, directive: &str, sources: Vec<String>) -> Result<(), CoreError> {
        if !SETTABLE_DIRECTIVES.contains(&directive) {
            return Err(CoreError::Validation(format!(
                "CSP directive '{directive}' cannot be set"
            )));
        }
        if let Some((_, current)) = self.sources.iter_mut().find(|(name, _)| *name == directive) {
            *current = sources;
        }
        Ok(())
    }

    /// The serialized policy, e.g. `default-src 'none'; script-src 'self'`.
    pub fn header_value(&self) -> String {
        self.sources
            .iter()
            .map(|(name, sources)| format!("{name} {}", sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
