//! Pattern registry: classifies request URLs into routing classes.
//!
//! Rules form one ordered table of `(pattern, class)` pairs. The table is
//! sorted by class precedence when the registry is built:
//!
//! 1. `no_cache`      - bypass every namespace
//! 2. `network_first` - live data preferred, cache as fallback
//! 3. `cache_first`   - stored bytes preferred
//!
//! A URL matching no rule is network-first.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Caching strategy assigned to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    NoCache,
    NetworkFirst,
    CacheFirst,
}

impl RouteClass {
    fn precedence(self) -> u8 {
        match self {
            RouteClass::NoCache => 0,
            RouteClass::NetworkFirst => 1,
            RouteClass::CacheFirst => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::NoCache => "no_cache",
            RouteClass::NetworkFirst => "network_first",
            RouteClass::CacheFirst => "cache_first",
        }
    }
}

impl std::fmt::Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration form of a URL predicate.
///
/// In TOML: `{ kind = "path_suffix", value = "/sitemap.xml" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PatternSpec {
    PathSuffix(String),
    HostPrefix(String),
    Extension(String),
    Regex(String),
}

/// Compiled URL predicate.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Path ends with the value.
    PathSuffix(String),
    /// Host starts with the value, lowercase.
    HostPrefix(String),
    /// Extension of the last path segment, lowercase, no dot.
    Extension(String),
    /// Whole URL matches.
    Regex(Regex),
}

impl UrlPattern {
    /// Compile a configured predicate.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty value or a regex that fails to compile.
    pub fn compile(spec: &PatternSpec) -> Result<Self, Error> {
        let pattern = match spec {
            PatternSpec::PathSuffix(s) => UrlPattern::PathSuffix(non_empty(s, "path_suffix")?.to_string()),
            PatternSpec::HostPrefix(s) => UrlPattern::HostPrefix(non_empty(s, "host_prefix")?.to_lowercase()),
            PatternSpec::Extension(s) => {
                let ext = non_empty(s, "extension")?.trim_start_matches('.').to_lowercase();
                UrlPattern::Extension(ext)
            }
            PatternSpec::Regex(s) => {
                let re = Regex::new(non_empty(s, "regex")?)
                    .map_err(|e| Error::InvalidInput(format!("invalid route regex {s:?}: {e}")))?;
                UrlPattern::Regex(re)
            }
        };
        Ok(pattern)
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            UrlPattern::PathSuffix(suffix) => url.path().ends_with(suffix.as_str()),
            UrlPattern::HostPrefix(prefix) => url
                .host_str()
                .is_some_and(|host| host.to_ascii_lowercase().starts_with(prefix.as_str())),
            UrlPattern::Extension(ext) => path_extension(url).is_some_and(|e| e.eq_ignore_ascii_case(ext)),
            UrlPattern::Regex(re) => re.is_match(url.as_str()),
        }
    }
}

fn non_empty<'a>(value: &'a str, kind: &str) -> Result<&'a str, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{kind} pattern must not be empty")));
    }
    Ok(trimmed)
}

fn path_extension(url: &Url) -> Option<&str> {
    let segment = url.path().rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() { None } else { Some(ext) }
}

/// A single entry of the routing table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: UrlPattern,
    pub class: RouteClass,
}

/// Rule sets as they appear in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub no_cache: Vec<PatternSpec>,
    #[serde(default)]
    pub network_first: Vec<PatternSpec>,
    #[serde(default)]
    pub cache_first: Vec<PatternSpec>,
}

/// Immutable routing table.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    rules: Vec<RouteRule>,
}

impl PatternRegistry {
    /// Build a registry from rules in any order.
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by_key(|rule| rule.class.precedence());
        Self { rules }
    }

    /// Compile the configured rule sets.
    ///
    /// # Errors
    ///
    /// Returns the first pattern compilation error.
    pub fn from_config(config: &RouteConfig) -> Result<Self, Error> {
        let sets = [
            (RouteClass::NoCache, &config.no_cache),
            (RouteClass::NetworkFirst, &config.network_first),
            (RouteClass::CacheFirst, &config.cache_first),
        ];

        let mut rules = Vec::new();
        for (class, specs) in sets {
            for spec in specs {
                rules.push(RouteRule { pattern: UrlPattern::compile(spec)?, class });
            }
        }

        Ok(Self::new(rules))
    }

    /// Classify a URL. Unmatched URLs are network-first.
    pub fn classify(&self, url: &Url) -> RouteClass {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(url))
            .map(|rule| rule.class)
            .unwrap_or(RouteClass::NetworkFirst)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}
