//! The event bus that fans build operation events out to listeners.
//!
//! Unfiltered listeners see every operation exactly as it ran. Filtered
//! listeners share a pipe per canonical type set: the pipe drops operations
//! outside the requested types and re-parents the survivors to their closest
//! forwarded ancestor, so each listener still observes a well-formed tree.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::descriptor::{OperationDescriptor, OperationId, OperationType};
use crate::event::{OperationFinished, OperationStarted};

/// Receives operation lifecycle events.
pub trait OperationListener: Send + Sync {
    fn started(&self, descriptor: &OperationDescriptor, event: &OperationStarted);
    fn finished(&self, descriptor: &OperationDescriptor, event: &OperationFinished);
}

/// Canonical form of a type filter: duplicates removed, members covered by
/// another member removed, remainder sorted by name. Subscriptions with the
/// same canonical set share one pipe.
pub fn reduce_types(types: &[OperationType]) -> Vec<OperationType> {
    let mut reduced: Vec<OperationType> = Vec::new();
    for &candidate in types {
        if types
            .iter()
            .any(|&other| other != candidate && other.covers(candidate))
        {
            continue;
        }
        if !reduced.contains(&candidate) {
            reduced.push(candidate);
        }
    }
    reduced.sort_by_key(|t| t.name());
    reduced
}

/// Per-pipe filtering state. Tracks the parent of every in-flight operation
/// so that filtered-out intermediates can be bridged over.
struct Forwarder {
    types: Vec<OperationType>,
    all_parents: FxHashMap<OperationId, Option<OperationId>>,
    forwarded: FxHashMap<OperationId, Option<OperationId>>,
}

impl Forwarder {
    fn new(types: Vec<OperationType>) -> Self {
        Self {
            types,
            all_parents: FxHashMap::default(),
            forwarded: FxHashMap::default(),
        }
    }

    fn accepts(&self, descriptor: &OperationDescriptor) -> bool {
        descriptor
            .operation_types()
            .iter()
            .any(|&actual| self.types.iter().any(|filter| filter.covers(actual)))
    }

    /// Walk up the ancestry until a forwarded operation is found. If the
    /// walk runs into an ancestor this pipe never saw start, the operation
    /// keeps its direct parent rather than taking an intermediate's id.
    fn closest_forwarded_ancestor(&self, parent: Option<OperationId>) -> Option<OperationId> {
        let mut candidate = parent;
        while let Some(id) = candidate {
            if self.forwarded.contains_key(&id) {
                return Some(id);
            }
            match self.all_parents.get(&id) {
                Some(next) => candidate = *next,
                None => return parent,
            }
        }
        None
    }

    /// Record a start. Returns the re-mapped parent if the operation passes
    /// the filter, `None` if the pipe drops it.
    fn map_started(&mut self, descriptor: &OperationDescriptor) -> Option<Option<OperationId>> {
        self.all_parents
            .insert(descriptor.id(), descriptor.parent_id());
        if !self.accepts(descriptor) {
            return None;
        }
        // The first forwarded operation anchors the downstream tree, so it
        // goes out parentless no matter what its real parent was.
        let remapped = if self.forwarded.is_empty() {
            None
        } else {
            self.closest_forwarded_ancestor(descriptor.parent_id())
        };
        self.forwarded.insert(descriptor.id(), remapped);
        Some(remapped)
    }

    /// Record a finish. Returns the parent the start was forwarded with, so
    /// both events agree, or `None` if the start was dropped.
    fn map_finished(&mut self, descriptor: &OperationDescriptor) -> Option<Option<OperationId>> {
        self.all_parents.remove(&descriptor.id());
        self.forwarded.remove(&descriptor.id())
    }
}

struct Pipe {
    forwarder: Forwarder,
    listeners: Vec<(u64, Arc<dyn OperationListener>)>,
}

#[derive(Default)]
struct BusState {
    next_token: u64,
    direct: Vec<(u64, Arc<dyn OperationListener>)>,
    pipes: FxHashMap<Vec<OperationType>, Pipe>,
}

/// Fans operation events out to every subscription.
///
/// A single lock guards both listener registration and event dispatch, so a
/// listener never observes events after its unsubscribe returns.
#[derive(Default)]
pub struct OperationEventBus {
    state: Mutex<BusState>,
}

impl OperationEventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to every operation, unfiltered.
    pub fn subscribe(self: &Arc<Self>, listener: Arc<dyn OperationListener>) -> Subscription {
        let mut state = self.state.lock();
        let token = state.next_token;
        state.next_token += 1;
        state.direct.push((token, listener));
        Subscription {
            bus: Arc::downgrade(self),
            token,
            key: None,
        }
    }

    /// Subscribe to the operations covered by `types`. An empty filter is an
    /// unfiltered subscription.
    pub fn subscribe_filtered(
        self: &Arc<Self>,
        types: &[OperationType],
        listener: Arc<dyn OperationListener>,
    ) -> Subscription {
        let key = reduce_types(types);
        if key.is_empty() {
            return self.subscribe(listener);
        }
        let mut state = self.state.lock();
        let token = state.next_token;
        state.next_token += 1;
        state
            .pipes
            .entry(key.clone())
            .or_insert_with(|| Pipe {
                forwarder: Forwarder::new(key.clone()),
                listeners: Vec::new(),
            })
            .listeners
            .push((token, listener));
        Subscription {
            bus: Arc::downgrade(self),
            token,
            key: Some(key),
        }
    }

    pub fn started(&self, descriptor: &OperationDescriptor, event: &OperationStarted) {
        let mut state = self.state.lock();
        for (_, listener) in &state.direct {
            listener.started(descriptor, event);
        }
        for pipe in state.pipes.values_mut() {
            if let Some(parent) = pipe.forwarder.map_started(descriptor) {
                let remapped = descriptor.with_parent_id(parent);
                for (_, listener) in &pipe.listeners {
                    listener.started(&remapped, event);
                }
            }
        }
    }

    pub fn finished(&self, descriptor: &OperationDescriptor, event: &OperationFinished) {
        let mut state = self.state.lock();
        for (_, listener) in &state.direct {
            listener.finished(descriptor, event);
        }
        for pipe in state.pipes.values_mut() {
            if let Some(parent) = pipe.forwarder.map_finished(descriptor) {
                let remapped = descriptor.with_parent_id(parent);
                for (_, listener) in &pipe.listeners {
                    listener.finished(&remapped, event);
                }
            }
        }
    }

    /// Number of live filtered pipes.
    pub fn pipe_count(&self) -> usize {
        self.state.lock().pipes.len()
    }

    fn unsubscribe(&self, token: u64, key: Option<&Vec<OperationType>>) {
        let mut state = self.state.lock();
        match key {
            None => state.direct.retain(|(t, _)| *t != token),
            Some(key) => {
                let evict = match state.pipes.get_mut(key) {
                    Some(pipe) => {
                        pipe.listeners.retain(|(t, _)| *t != token);
                        pipe.listeners.is_empty()
                    }
                    None => false,
                };
                // Still under the bus lock, so no new listener can have
                // joined the pipe between the check and the removal.
                if evict {
                    state.pipes.remove(key);
                }
            }
        }
    }
}

/// Handle to one registered listener. Dropping it without calling
/// [`Subscription::unsubscribe`] leaves the listener registered.
pub struct Subscription {
    bus: Weak<OperationEventBus>,
    token: u64,
    key: Option<Vec<OperationType>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.token, self.key.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OperationDescriptor;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl Recording {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl OperationListener for Recording {
        fn started(&self, descriptor: &OperationDescriptor, _event: &OperationStarted) {
            self.events.lock().push(format!(
                "start {} parent={:?}",
                descriptor.id(),
                descriptor.parent_id().map(OperationId::value)
            ));
        }

        fn finished(&self, descriptor: &OperationDescriptor, _event: &OperationFinished) {
            self.events.lock().push(format!(
                "finish {} parent={:?}",
                descriptor.id(),
                descriptor.parent_id().map(OperationId::value)
            ));
        }
    }

    fn descriptor(
        id: u64,
        parent: Option<u64>,
        operation_type: Option<OperationType>,
    ) -> OperationDescriptor {
        let mut builder = OperationDescriptor::builder(format!("op {id}"))
            .id(OperationId::new(id))
            .parent_id(parent.map(OperationId::new));
        if let Some(operation_type) = operation_type {
            builder = builder.operation_type(operation_type);
        }
        builder.build().unwrap()
    }

    fn start(bus: &OperationEventBus, descriptor: &OperationDescriptor) {
        bus.started(descriptor, &OperationStarted::now());
    }

    fn finish(bus: &OperationEventBus, descriptor: &OperationDescriptor) {
        bus.finished(
            descriptor,
            &OperationFinished::now(OperationStarted::now(), None),
        );
    }

    #[test]
    fn reduce_removes_covered_types_and_sorts() {
        assert_eq!(
            reduce_types(&[
                OperationType::TaskExecution,
                OperationType::Tasks,
                OperationType::Tests,
                OperationType::Configuration,
            ]),
            vec![OperationType::Configuration, OperationType::Tasks]
        );
        assert_eq!(
            reduce_types(&[OperationType::Build, OperationType::Tests]),
            vec![OperationType::Build]
        );
        assert_eq!(reduce_types(&[]), Vec::<OperationType>::new());
    }

    proptest! {
        #[test]
        fn reduce_is_order_independent(mut types in proptest::collection::vec(
            prop_oneof![
                Just(OperationType::Build),
                Just(OperationType::Configuration),
                Just(OperationType::ProjectConfiguration),
                Just(OperationType::TaskExecution),
                Just(OperationType::Tasks),
                Just(OperationType::Tests),
            ],
            0..8,
        )) {
            let reduced = reduce_types(&types);
            types.reverse();
            prop_assert_eq!(reduce_types(&types), reduced.clone());
            // No member covers another.
            for &a in &reduced {
                for &b in &reduced {
                    prop_assert!(a == b || !a.covers(b));
                }
            }
        }
    }

    #[test]
    fn unfiltered_listener_sees_operations_unchanged() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe(listener.clone());

        let root = descriptor(1, None, None);
        start(&bus, &root);
        finish(&bus, &root);
        assert_eq!(
            listener.take(),
            vec!["start 1 parent=None", "finish 1 parent=None"]
        );

        subscription.unsubscribe();
        start(&bus, &root);
        assert!(listener.take().is_empty());
    }

    #[test]
    fn filtered_pipe_bridges_over_dropped_intermediates() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe_filtered(&[OperationType::Tasks], listener.clone());

        // tasks(1) > configuration(2) > task-execution(3): the listener
        // never sees 2, so 3 is re-parented to 1.
        let run = descriptor(1, None, Some(OperationType::Tasks));
        let configure = descriptor(2, Some(1), Some(OperationType::Configuration));
        let task = descriptor(3, Some(2), Some(OperationType::TaskExecution));
        start(&bus, &run);
        start(&bus, &configure);
        start(&bus, &task);
        finish(&bus, &task);
        finish(&bus, &configure);
        finish(&bus, &run);

        assert_eq!(
            listener.take(),
            vec![
                "start 1 parent=None",
                "start 3 parent=Some(1)",
                "finish 3 parent=Some(1)",
                "finish 1 parent=None",
            ]
        );
        subscription.unsubscribe();
    }

    #[test]
    fn first_forwarded_operation_is_parentless() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe_filtered(&[OperationType::Tasks], listener.clone());

        // Parent 99 started before this pipe existed. The pipe has forwarded
        // nothing yet, so the operation becomes the root of its tree instead
        // of dangling off an id the listener never saw.
        let task = descriptor(3, Some(99), Some(OperationType::TaskExecution));
        start(&bus, &task);
        assert_eq!(listener.take(), vec!["start 3 parent=None"]);
        subscription.unsubscribe();
    }

    #[test]
    fn exhausted_ancestor_walk_keeps_the_direct_parent() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe_filtered(&[OperationType::Tasks], listener.clone());

        // With one operation already forwarded, a later operation whose
        // ancestry the pipe cannot trace keeps its own parent id rather
        // than borrowing some intermediate's.
        start(&bus, &descriptor(1, None, Some(OperationType::Tasks)));
        start(&bus, &descriptor(3, Some(50), Some(OperationType::TaskExecution)));
        assert_eq!(
            listener.take(),
            vec!["start 1 parent=None", "start 3 parent=Some(50)"]
        );
        subscription.unsubscribe();
    }

    #[test]
    fn an_operation_declaring_several_types_matches_any_of_them() {
        let bus = OperationEventBus::new();
        let tests_listener = Arc::new(Recording::default());
        let tasks_listener = Arc::new(Recording::default());
        let tests = bus.subscribe_filtered(&[OperationType::Tests], tests_listener.clone());
        let tasks =
            bus.subscribe_filtered(&[OperationType::TaskExecution], tasks_listener.clone());

        let run_tests = OperationDescriptor::builder("op 1")
            .id(OperationId::new(1))
            .operation_type(OperationType::TaskExecution)
            .operation_type(OperationType::Tests)
            .build()
            .unwrap();
        start(&bus, &run_tests);
        assert_eq!(tests_listener.take(), vec!["start 1 parent=None"]);
        assert_eq!(tasks_listener.take(), vec!["start 1 parent=None"]);
        tests.unsubscribe();
        tasks.unsubscribe();
    }

    #[test]
    fn untyped_operations_never_match_a_filter() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe_filtered(&[OperationType::Build], listener.clone());

        start(&bus, &descriptor(1, None, None));
        assert!(listener.take().is_empty());
        subscription.unsubscribe();
    }

    #[test]
    fn equivalent_filters_share_one_pipe() {
        let bus = OperationEventBus::new();
        let first = bus.subscribe_filtered(
            &[OperationType::Tasks, OperationType::TaskExecution],
            Arc::new(Recording::default()),
        );
        let second =
            bus.subscribe_filtered(&[OperationType::Tasks], Arc::new(Recording::default()));
        assert_eq!(bus.pipe_count(), 1);

        first.unsubscribe();
        assert_eq!(bus.pipe_count(), 1);
        second.unsubscribe();
        assert_eq!(bus.pipe_count(), 0);
    }

    #[test]
    fn empty_filter_is_an_unfiltered_subscription() {
        let bus = OperationEventBus::new();
        let listener = Arc::new(Recording::default());
        let subscription = bus.subscribe_filtered(&[], listener.clone());
        assert_eq!(bus.pipe_count(), 0);

        start(&bus, &descriptor(1, None, None));
        assert_eq!(listener.take(), vec!["start 1 parent=None"]);
        subscription.unsubscribe();
    }
}
