//! Event filter adapter.
//!
//! Gates create, update and delete events before they enqueue a reconcile.
//! Objects normally never get here when the cache admission selector is
//! installed; the filter catches anything that slips through.

use std::fmt;
use std::sync::Arc;

use kube::{Resource, ResourceExt};
use tracing::{Span, debug};

use crate::selector::Selector;

/// Kind of watch event being filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Object seen for the first time
    Create,
    /// Object changed
    Update,
    /// Object removed
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A watch event borrowed from the dispatch machinery.
#[derive(Debug)]
pub enum ObjectEvent<'a, K> {
    /// Object created
    Create(&'a K),
    /// Object updated from `old` to `new`
    Update {
        /// State before the update
        old: &'a K,
        /// State after the update
        new: &'a K,
    },
    /// Object deleted
    Delete(&'a K),
}

/// Predicate over watch events backed by the shared selector.
///
/// Decisions are logged at debug level inside `span`, which carries whatever
/// context the caller attached when building the filter.
#[derive(Debug, Clone)]
pub struct EventFilter {
    selector: Arc<Selector>,
    expression: Arc<str>,
    span: Span,
}

impl EventFilter {
    pub(crate) fn new(selector: Arc<Selector>, expression: Arc<str>, span: Span) -> Self {
        Self {
            selector,
            expression,
            span,
        }
    }

    /// Decides a create event.
    pub fn create<K: Resource>(&self, obj: &K) -> bool {
        self.decide(EventKind::Create, obj)
    }

    /// Decides an update event on the new object's labels only.
    pub fn update<K: Resource>(&self, _old: &K, new: &K) -> bool {
        self.decide(EventKind::Update, new)
    }

    /// Decides a delete event.
    pub fn delete<K: Resource>(&self, obj: &K) -> bool {
        self.decide(EventKind::Delete, obj)
    }

    /// Decides any event.
    pub fn filter<K: Resource>(&self, event: &ObjectEvent<'_, K>) -> bool {
        match event {
            ObjectEvent::Create(obj) => self.create(*obj),
            ObjectEvent::Update { old, new } => self.update(*old, *new),
            ObjectEvent::Delete(obj) => self.delete(*obj),
        }
    }

    /// A cloneable closure for filtering object streams. Decisions are logged
    /// with `event`, since a bare object stream carries no event kind of its own.
    pub fn predicate<K: Resource + 'static>(
        &self,
        event: EventKind,
    ) -> impl Fn(&K) -> bool + Clone + Send + Sync + use<K> {
        let filter = self.clone();
        move |obj: &K| filter.decide(event, obj)
    }

    fn decide<K: Resource>(&self, event: EventKind, obj: &K) -> bool {
        let matched = self.selector.matches(obj.labels());
        self.span.in_scope(|| {
            debug!(
                %event,
                object = %identity(obj),
                matched,
                expression = %self.expression,
                "{}",
                if matched { "event matched label selector" } else { "event filtered by label selector" }
            );
        });
        matched
    }
}

fn identity<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{ns}/{}", obj.name_any()),
        None => obj.name_any(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::LabelSet;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[derive(Debug, Default, Clone)]
    struct Record {
        event: String,
        object: String,
        matched: Option<bool>,
        expression: String,
    }

    impl Visit for Record {
        fn record_bool(&mut self, field: &Field, value: bool) {
            if field.name() == "matched" {
                self.matched = Some(value);
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            let rendered = format!("{value:?}");
            match field.name() {
                "event" => self.event = rendered,
                "object" => self.object = rendered,
                "expression" => self.expression = rendered,
                _ => {}
            }
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<Record>>>);

    impl<S: tracing::Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut record = Record::default();
            event.record(&mut record);
            self.0.lock().unwrap().push(record);
        }
    }

    fn object(name: &str, labels: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect::<LabelSet>(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn filter(expr: &str) -> EventFilter {
        EventFilter::new(
            Arc::new(Selector::parse(expr).unwrap()),
            Arc::from(expr),
            Span::none(),
        )
    }

    #[test]
    fn test_create_and_delete() {
        let f = filter("env=prod");
        assert!(f.create(&object("a", &[("env", "prod")])));
        assert!(!f.create(&object("b", &[("env", "dev")])));
        assert!(f.delete(&object("a", &[("env", "prod")])));
        assert!(!f.delete(&object("c", &[])));
    }

    #[test]
    fn test_update_uses_new_labels() {
        let f = filter("env=prod");
        let old = object("a", &[("env", "dev")]);
        let new = object("a", &[("env", "prod")]);
        assert!(f.update(&old, &new));
        assert!(!f.update(&new, &old));
        assert!(f.filter(&ObjectEvent::Update { old: &old, new: &new }));
    }

    #[test]
    fn test_predicate_closure() {
        let f = filter("!deprecated");
        let keep = f.predicate::<ConfigMap>(EventKind::Create);
        let objects = [object("a", &[]), object("b", &[("deprecated", "true")])];
        let kept: Vec<_> = objects.iter().filter(|o| keep(*o)).map(ResourceExt::name_any).collect();
        assert_eq!(kept, vec!["a".to_string()]);
    }

    #[test]
    fn test_predicate_logs_given_event_kind() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let f = filter("!deprecated");
            let on_create = f.predicate::<ConfigMap>(EventKind::Create);
            let on_delete = f.predicate::<ConfigMap>(EventKind::Delete);
            assert!(on_create(&object("new", &[])));
            assert!(!on_delete(&object("old", &[("deprecated", "true")])));
        });

        let records = capture.0.lock().unwrap().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, "create");
        assert_eq!(records[0].matched, Some(true));
        assert_eq!(records[1].event, "delete");
        assert_eq!(records[1].matched, Some(false));
    }

    #[test]
    fn test_one_debug_record_per_decision() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let f = filter("env = prod");
            f.create(&object("web", &[("env", "prod")]));
            f.delete(&object("db", &[]));
        });

        let records = capture.0.lock().unwrap().clone();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].event, "create");
        assert_eq!(records[0].object, "default/web");
        assert_eq!(records[0].matched, Some(true));
        assert_eq!(records[0].expression, "env = prod");

        assert_eq!(records[1].event, "delete");
        assert_eq!(records[1].object, "default/db");
        assert_eq!(records[1].matched, Some(false));
    }
}
