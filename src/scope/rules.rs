use crate::config::ScopeConfig;
use crate::page::Page;
use crate::scope::Scope;
use crate::url::host_matches;
use crate::ConfigError;
use parking_lot::RwLock;
use regex::Regex;
use url::Url;

/// A URL pattern that may only be followed a limited number of times
#[derive(Debug, Clone)]
pub struct RedundantRule {
    pub pattern: Regex,
    /// Matches still allowed through
    pub remaining: u32,
}

/// Mutable scope rules
#[derive(Debug, Clone, Default)]
pub struct ScopeRules {
    /// Domain patterns (`example.com`, `*.example.com`); empty allows any host
    pub domains: Vec<String>,
    /// When non-empty, a URL must match at least one of these
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
    /// Patterns applied to response bodies
    pub exclude_content: Vec<Regex>,
    pub redundant: Vec<RedundantRule>,
}

/// Scope backed by regex and domain rules that can be changed mid-scan
#[derive(Debug, Default)]
pub struct RuleScope {
    rules: RwLock<ScopeRules>,
}

impl RuleScope {
    pub fn new(rules: ScopeRules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Scope limited to the host of `target`
    pub fn for_target(target: &Url) -> Self {
        Self::new(ScopeRules {
            domains: target.host_str().map(str::to_lowercase).into_iter().collect(),
            ..ScopeRules::default()
        })
    }

    /// Builds the scope from configuration
    ///
    /// Without configured domains the scan is restricted to the target host.
    pub fn from_config(config: &ScopeConfig, target: &Url) -> Result<Self, ConfigError> {
        let domains = if config.domains.is_empty() {
            target.host_str().map(str::to_lowercase).into_iter().collect()
        } else {
            config.domains.clone()
        };

        let redundant = config
            .redundant
            .iter()
            .map(|rule| {
                Ok(RedundantRule {
                    pattern: compile(&rule.pattern)?,
                    remaining: rule.count,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self::new(ScopeRules {
            domains,
            include: compile_all(&config.include)?,
            exclude: compile_all(&config.exclude)?,
            exclude_content: compile_all(&config.exclude_content)?,
            redundant,
        }))
    }

    /// Adds an exclusion pattern to a running scope
    pub fn exclude(&self, pattern: &str) -> Result<(), ConfigError> {
        let regex = compile(pattern)?;
        self.rules.write().exclude.push(regex);
        Ok(())
    }

    /// Applies an arbitrary change to the rules
    pub fn update(&self, change: impl FnOnce(&mut ScopeRules)) {
        change(&mut self.rules.write());
    }
}

impl Scope for RuleScope {
    fn url_out(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return true;
        }

        let rules = self.rules.read();
        let target = url.as_str();

        if !rules.domains.is_empty() && !rules.domains.iter().any(|d| host_matches(d, url)) {
            return true;
        }

        if rules.exclude.iter().any(|re| re.is_match(target)) {
            return true;
        }

        !rules.include.is_empty() && !rules.include.iter().any(|re| re.is_match(target))
    }

    fn page_out(&self, page: &Page) -> bool {
        if self.url_out(&page.url) {
            return true;
        }

        self.rules
            .read()
            .exclude_content
            .iter()
            .any(|re| re.is_match(&page.body))
    }

    fn redundant(&self, url: &Url, strict: bool) -> bool {
        let mut rules = self.rules.write();

        for rule in rules.redundant.iter_mut() {
            if !rule.pattern.is_match(url.as_str()) {
                continue;
            }

            if rule.remaining == 0 {
                tracing::debug!("Discarding redundant path: {}", url);
                return true;
            }

            if strict {
                rule.remaining -= 1;
            }
        }

        false
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile(p)).collect()
}
