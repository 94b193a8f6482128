use std::sync::Once;

use scout_engine::{
    DenyReason, FetchSettings, HttpPolicyGate, PolicyDecision, PolicyGate, RobotsRules,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(desk_logging::initialize_for_tests);
}

#[test]
fn wildcard_group_rules_apply() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: *\n\
         Disallow: /private\n",
    );
    assert!(rules.allows("scout/0.1", "/public/paper.pdf"));
    assert!(!rules.allows("scout/0.1", "/private/paper.pdf"));
}

#[test]
fn longest_path_prefix_wins() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: *\n\
         Disallow: /docs\n\
         Allow: /docs/open\n",
    );
    assert!(!rules.allows("scout", "/docs/closed/a.pdf"));
    assert!(rules.allows("scout", "/docs/open/a.pdf"));
}

#[test]
fn allow_beats_disallow_at_equal_length() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: *\n\
         Disallow: /mixed\n\
         Allow: /mixed\n",
    );
    assert!(rules.allows("scout", "/mixed/file.pdf"));
}

#[test]
fn specific_agent_group_overrides_wildcard() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: *\n\
         Disallow: /\n\
         \n\
         User-agent: scout\n\
         Allow: /\n",
    );
    assert!(rules.allows("scout/0.1", "/anything"));
    assert!(!rules.allows("otherbot", "/anything"));
}

#[test]
fn consecutive_agent_headers_share_a_group() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: alpha\n\
         User-agent: beta\n\
         Disallow: /shared\n",
    );
    assert!(!rules.allows("alpha", "/shared/x"));
    assert!(!rules.allows("beta", "/shared/x"));
}

#[test]
fn empty_disallow_permits_everything() {
    init_logging();
    let rules = RobotsRules::parse(
        "User-agent: *\n\
         Disallow:\n",
    );
    assert!(rules.allows("scout", "/anywhere"));
}

#[test]
fn comments_and_unknown_fields_are_ignored() {
    init_logging();
    let rules = RobotsRules::parse(
        "# site policy\n\
         User-agent: * # everyone\n\
         Crawl-delay: 10\n\
         Disallow: /tmp # scratch space\n",
    );
    assert!(!rules.allows("scout", "/tmp/x"));
    assert!(rules.allows("scout", "/papers/x"));
}

#[test]
fn garbage_input_yields_no_restrictions() {
    init_logging();
    let rules = RobotsRules::parse("<<<not a policy file>>>");
    assert!(rules.allows("scout", "/anything"));
}

#[tokio::test]
async fn gate_denies_on_rule_match() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    let gate = HttpPolicyGate::new(&FetchSettings::default(), None).expect("gate");
    let denied = Url::parse(&format!("{}/private/a.pdf", server.uri())).unwrap();
    let allowed = Url::parse(&format!("{}/open/a.pdf", server.uri())).unwrap();

    assert_eq!(
        gate.permits(&denied).await,
        PolicyDecision::Denied(DenyReason::RuleMatch)
    );
    assert_eq!(gate.permits(&allowed).await, PolicyDecision::Allowed);
}

#[tokio::test]
async fn gate_fails_closed_on_bad_status() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gate = HttpPolicyGate::new(&FetchSettings::default(), None).expect("gate");
    let url = Url::parse(&format!("{}/a.pdf", server.uri())).unwrap();
    assert_eq!(
        gate.permits(&url).await,
        PolicyDecision::Denied(DenyReason::BadStatus(500))
    );
}

#[tokio::test]
async fn gate_fails_closed_when_unreachable() {
    init_logging();
    // Nothing listens on this port.
    let gate = HttpPolicyGate::new(&FetchSettings::default(), None).expect("gate");
    let url = Url::parse("http://127.0.0.1:9/a.pdf").unwrap();
    assert_eq!(
        gate.permits(&url).await,
        PolicyDecision::Denied(DenyReason::Unreachable)
    );
}

#[tokio::test]
async fn gate_caches_policy_per_authority() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .expect(1)
        .mount(&server)
        .await;

    let gate = HttpPolicyGate::new(&FetchSettings::default(), None).expect("gate");
    let first = Url::parse(&format!("{}/a.pdf", server.uri())).unwrap();
    let second = Url::parse(&format!("{}/b.pdf", server.uri())).unwrap();
    assert_eq!(gate.permits(&first).await, PolicyDecision::Allowed);
    assert_eq!(gate.permits(&second).await, PolicyDecision::Allowed);
    // MockServer verifies the expect(1) on drop.
}

#[tokio::test]
async fn gate_honours_explicit_policy_location() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/custom/policy.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
        )
        .mount(&server)
        .await;

    let policy_url = Url::parse(&format!("{}/custom/policy.txt", server.uri())).unwrap();
    let gate = HttpPolicyGate::new(&FetchSettings::default(), Some(policy_url)).expect("gate");
    let url = Url::parse(&format!("{}/a.pdf", server.uri())).unwrap();
    assert_eq!(
        gate.permits(&url).await,
        PolicyDecision::Denied(DenyReason::RuleMatch)
    );
}
