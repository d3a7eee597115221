//! Request classification.
//!
//! Maps a request to one of a fixed set of caching strategies using an
//! ordered table of pattern rules. The first matching rule wins; no match
//! means [`Strategy::Passthrough`].
//!
//! Some requests bypass the table entirely:
//! - cross-origin requests (outside the engine's trust boundary)
//! - requests with a `range` header (partial bodies must not be cached as complete)
//! - non-GET requests (only GET responses are cacheable)

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::request::Request;

/// A fixed policy governing how a request is satisfied from cache vs. network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    Passthrough,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::CacheFirst => "CACHE_FIRST",
            Strategy::NetworkFirst => "NETWORK_FIRST",
            Strategy::StaleWhileRevalidate => "STALE_WHILE_REVALIDATE",
            Strategy::Passthrough => "PASSTHROUGH",
        };
        f.write_str(name)
    }
}

/// Which part of the URL a rule pattern is tested against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTarget {
    #[default]
    Path,
    Url,
}

/// A pattern rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regular expression.
    pub pattern: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub target: MatchTarget,
}

impl RuleConfig {
    pub fn new(pattern: &str, strategy: Strategy) -> Self {
        Self { pattern: pattern.to_string(), strategy, target: MatchTarget::Path }
    }
}

/// Rule table of the original deployment: static media first, then API
/// calls, then content documents.
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::new(r"\.(?:png|jpg|jpeg|svg|gif|webp|ico)$", Strategy::CacheFirst),
        RuleConfig::new(r"\.(?:woff|woff2|ttf|otf|eot)$", Strategy::CacheFirst),
        RuleConfig::new(r"\.(?:css|js)$", Strategy::CacheFirst),
        RuleConfig::new(r"/api/", Strategy::NetworkFirst),
        RuleConfig::new(r"/supabase/", Strategy::NetworkFirst),
        RuleConfig::new(r"\.json$", Strategy::StaleWhileRevalidate),
        RuleConfig::new(r"/assets/corpus/", Strategy::StaleWhileRevalidate),
    ]
}

#[derive(Debug, Clone)]
struct PatternRule {
    regex: Regex,
    strategy: Strategy,
    target: MatchTarget,
}

impl PatternRule {
    fn matches(&self, url: &Url) -> bool {
        match self.target {
            MatchTarget::Path => self.regex.is_match(url.path()),
            MatchTarget::Url => self.regex.is_match(url.as_str()),
        }
    }
}

/// Compiled, immutable rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    rules: Vec<PatternRule>,
}

impl Classifier {
    /// Compile the rule table.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` for the first pattern that does not
    /// compile. This is a deployment defect and should abort startup.
    pub fn new(origin: Url, rules: &[RuleConfig]) -> Result<Self, Error> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern)
                    .map_err(|e| Error::InvalidPattern { pattern: rule.pattern.clone(), reason: e.to_string() })?;
                Ok(PatternRule { regex, strategy: rule.strategy, target: rule.target })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { origin, rules })
    }

    /// Pick the strategy for a request. Total and deterministic.
    pub fn classify(&self, request: &Request) -> Strategy {
        if !request.is_same_origin(&self.origin) || request.has_range() || !request.is_get() {
            return Strategy::Passthrough;
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(&request.url))
            .map_or(Strategy::Passthrough, |rule| rule.strategy)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
