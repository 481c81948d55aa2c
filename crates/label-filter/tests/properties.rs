//! Property tests for the public matcher surface.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use label_filter::{LabelMatcher, LabelSet, Selector, SelectorError};
use proptest::prelude::*;
use tracing::Span;

fn key() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["app", "env", "tier", "example.com/team", "cluster.x-k8s.io/watch-filter"])
        .prop_map(String::from)
}

fn value() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "prod", "web", "value"]).prop_map(String::from)
}

fn clause() -> impl Strategy<Value = String> {
    prop_oneof![
        (key(), value()).prop_map(|(k, v)| format!("{k} = {v}")),
        (key(), value()).prop_map(|(k, v)| format!("{k}=={v}")),
        (key(), prop::collection::vec(value(), 1..4)).prop_map(|(k, vs)| format!("{k} in ({})", vs.join(", "))),
        key(),
        key().prop_map(|k| format!("!{k}")),
    ]
}

fn expression() -> impl Strategy<Value = String> {
    prop::collection::vec(clause(), 0..5).prop_map(|clauses| clauses.join(","))
}

fn label_sets() -> impl Strategy<Value = LabelSet> {
    prop::collection::btree_map(key(), value(), 0..5)
}

fn object(labels: LabelSet) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some("machine-0".to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn evaluation_is_deterministic(expr in expression(), labels in label_sets()) {
        let first = Selector::parse(&expr).unwrap();
        let second = Selector::parse(&expr).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.matches(&labels), second.matches(&labels));
        prop_assert_eq!(first.matches(&labels), first.matches(&labels));
    }

    #[test]
    fn canonical_form_reparses_to_same_selector(expr in expression()) {
        let selector = Selector::parse(&expr).unwrap();
        let reparsed = Selector::parse(&selector.to_string()).unwrap();
        prop_assert_eq!(selector, reparsed);
    }

    /// The watch cache and the event filter must never disagree about an object.
    #[test]
    fn adapters_agree(expr in expression(), labels in label_sets()) {
        let matcher = LabelMatcher::new(&expr).unwrap();
        let admission = matcher.cache_admission();
        let filter = matcher.event_filter(Span::none());
        let obj = object(labels.clone());

        let expected = matcher.selector().matches(&labels);
        prop_assert_eq!(admission.admits(&labels), expected);
        prop_assert_eq!(filter.create(&obj), expected);
        prop_assert_eq!(filter.update(&object(LabelSet::new()), &obj), expected);
        prop_assert_eq!(filter.delete(&obj), expected);

        // The selector string sent to the API server means the same thing
        if let Some(selector_string) = admission.selector_string() {
            let served = Selector::parse(&selector_string).unwrap();
            prop_assert_eq!(served.matches(&labels), expected);
        }
    }

    #[test]
    fn negation_with_equality_is_rejected(k in key(), v in value(), prefix in expression()) {
        let expr = if prefix.is_empty() { format!("!{k} = {v}") } else { format!("{prefix},!{k} = {v}") };
        let err = Selector::parse(&expr).unwrap_err();
        let SelectorError::InvalidExpression { clause, .. } = err;
        prop_assert_eq!(clause, format!("!{k} = {v}"));
    }

    #[test]
    fn missing_key_is_rejected(v in value()) {
        let expr = format!("= {v}");
        prop_assert!(Selector::parse(&expr).is_err());
    }
}

#[test]
fn empty_selector_matches_everything() {
    let selector = Selector::parse("").unwrap();
    assert!(selector.matches(&LabelSet::new()));
    assert!(selector.matches(&LabelSet::from([("anything".to_string(), "x".to_string())])));
}

#[test]
fn equality_scenarios() {
    let selector = Selector::parse("env = prod").unwrap();
    let prod = LabelSet::from([
        ("env".to_string(), "prod".to_string()),
        ("tier".to_string(), "web".to_string()),
    ]);
    let staging = LabelSet::from([("env".to_string(), "staging".to_string())]);

    assert!(selector.matches(&prod));
    assert!(!selector.matches(&staging));
    assert!(!selector.matches(&LabelSet::new()));
}

#[test]
fn exclusion_scenarios() {
    let selector = Selector::parse("!deprecated").unwrap();
    assert!(selector.matches(&LabelSet::new()));
    assert!(!selector.matches(&LabelSet::from([("deprecated".to_string(), "true".to_string())])));
}

#[test]
fn malformed_expression_names_clause() {
    let err = LabelMatcher::new("env=prod,tier in (web").unwrap_err();
    assert_eq!(err.clause(), "tier in (web");
    assert!(err.to_string().starts_with("invalid selector expression in clause `tier in (web`"));
}
