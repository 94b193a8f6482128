use std::collections::HashMap;
use std::sync::Mutex;

use desk_logging::{desk_info, desk_warn};
use url::Url;

use crate::fetch::{map_reqwest_error, FetchSettings};
use crate::types::{FailureKind, FetchError};

pub const POLICY_FILE_PATH: &str = "/robots.txt";

/// Verdict for one URL under the site's crawl policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A disallow rule in the policy file matched the path.
    RuleMatch,
    /// The policy file could not be fetched; access fails closed.
    Unreachable,
    /// The policy file request returned a non-success status.
    BadStatus(u16),
}

/// Parsed permission rules from a policy file.
///
/// Grammar: `User-agent` headers open a group (consecutive headers share
/// one group), followed by `Allow`/`Disallow` path rules. `#` starts a
/// comment, unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    path: String,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        let mut in_agent_header = false;

        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !in_agent_header {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(Group {
                            agents: Vec::new(),
                            rules: Vec::new(),
                        });
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                    in_agent_header = true;
                }
                "allow" | "disallow" => {
                    in_agent_header = false;
                    // An empty rule path never matches anything; in
                    // particular `Disallow:` with no value permits all.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = current.as_mut() {
                        group.rules.push(Rule {
                            allow: field == "allow",
                            path: value.to_string(),
                        });
                    }
                }
                _ => {
                    in_agent_header = false;
                }
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }

        Self { groups }
    }

    /// Whether `agent` may fetch `path`.
    ///
    /// The group with the longest agent-token match wins (falling back to
    /// `*`); within that group the longest matching path prefix decides,
    /// with `Allow` beating `Disallow` at equal length. No group or no
    /// matching rule means allowed.
    pub fn allows(&self, agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(agent) else {
            return true;
        };
        let path = if path.is_empty() { "/" } else { path };

        let mut best: Option<(usize, bool)> = None;
        for rule in &group.rules {
            if !path.starts_with(rule.path.as_str()) {
                continue;
            }
            let len = rule.path.len();
            match best {
                Some((best_len, _)) if len < best_len => {}
                Some((best_len, allowed)) if len == best_len => {
                    best = Some((best_len, allowed || rule.allow));
                }
                _ => best = Some((len, rule.allow)),
            }
        }
        best.map_or(true, |(_, allowed)| allowed)
    }

    fn group_for(&self, agent: &str) -> Option<&Group> {
        let agent = agent.to_ascii_lowercase();
        let mut best: Option<(&Group, usize)> = None;
        for group in &self.groups {
            for token in &group.agents {
                if token == "*" || !agent.contains(token.as_str()) {
                    continue;
                }
                if best.map_or(true, |(_, len)| token.len() > len) {
                    best = Some((group, token.len()));
                }
            }
        }
        if let Some((group, _)) = best {
            return Some(group);
        }
        self.groups
            .iter()
            .find(|group| group.agents.iter().any(|token| token == "*"))
    }
}

/// Answers whether a URL may be fetched under the site's crawl policy.
#[async_trait::async_trait]
pub trait PolicyGate: Send + Sync {
    async fn permits(&self, url: &Url) -> PolicyDecision;
}

enum CachedPolicy {
    Rules(RobotsRules),
    Unavailable(DenyReason),
}

/// Fetches and caches the policy file per authority. Any fetch or parse
/// trouble fails closed: the URL is treated as not permitted.
pub struct HttpPolicyGate {
    client: reqwest::Client,
    agent: String,
    policy_url: Option<Url>,
    cache: Mutex<HashMap<String, CachedPolicy>>,
}

impl HttpPolicyGate {
    /// `policy_url` overrides the default `<origin>/robots.txt` location.
    pub fn new(settings: &FetchSettings, policy_url: Option<Url>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            agent: settings.user_agent.clone(),
            policy_url,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn policy_location(&self, target: &Url) -> Option<Url> {
        if let Some(explicit) = &self.policy_url {
            return Some(explicit.clone());
        }
        target.join(POLICY_FILE_PATH).ok()
    }

    async fn fetch_rules(&self, location: &Url) -> CachedPolicy {
        let response = match self.client.get(location.as_str()).send().await {
            Ok(response) => response,
            Err(err) => {
                desk_warn!("policy file {location} unreachable: {}", map_reqwest_error(err));
                return CachedPolicy::Unavailable(DenyReason::Unreachable);
            }
        };
        let status = response.status();
        if !status.is_success() {
            desk_warn!("policy file {location} returned {status}");
            return CachedPolicy::Unavailable(DenyReason::BadStatus(status.as_u16()));
        }
        match response.text().await {
            Ok(text) => CachedPolicy::Rules(RobotsRules::parse(&text)),
            Err(err) => {
                desk_warn!("policy file {location} unreadable: {err}");
                CachedPolicy::Unavailable(DenyReason::Unreachable)
            }
        }
    }

    async fn decide(&self, url: &Url) -> PolicyDecision {
        let Some(location) = self.policy_location(url) else {
            return PolicyDecision::Denied(DenyReason::Unreachable);
        };
        let authority = location.authority().to_string();

        let cached_decision = {
            let cache = self.cache.lock().expect("policy cache lock");
            cache
                .get(&authority)
                .map(|cached| self.evaluate(cached, url))
        };
        if let Some(decision) = cached_decision {
            return decision;
        }

        let fetched = self.fetch_rules(&location).await;
        let decision = self.evaluate(&fetched, url);
        let mut cache = self.cache.lock().expect("policy cache lock");
        cache.insert(authority, fetched);
        decision
    }

    fn evaluate(&self, cached: &CachedPolicy, url: &Url) -> PolicyDecision {
        match cached {
            CachedPolicy::Rules(rules) => {
                if rules.allows(&self.agent, url.path()) {
                    PolicyDecision::Allowed
                } else {
                    PolicyDecision::Denied(DenyReason::RuleMatch)
                }
            }
            CachedPolicy::Unavailable(reason) => PolicyDecision::Denied(*reason),
        }
    }
}

#[async_trait::async_trait]
impl PolicyGate for HttpPolicyGate {
    async fn permits(&self, url: &Url) -> PolicyDecision {
        let decision = self.decide(url).await;
        match decision {
            PolicyDecision::Allowed => desk_info!("crawl policy allows {url}"),
            PolicyDecision::Denied(reason) => {
                desk_info!("crawl policy denies {url} ({reason:?})");
            }
        }
        decision
    }
}
