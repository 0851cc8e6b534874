//! Selected routes ("pills").
//!
//! The selection is a short ordered list of distinct route tags. Every change
//! is forwarded to a [`LayerSink`], normally the route layer engine.

use tracing::debug;

use crate::domain::RouteTag;

/// Maximum number of routes that can be selected at once.
pub const MAX_PILLS: usize = 3;

/// Receiver of selection changes.
pub trait LayerSink {
    /// A route was added to the selection.
    fn activate(&mut self, tag: &RouteTag);

    /// A route was removed from the selection.
    fn deactivate(&mut self, tag: &RouteTag);
}

/// Owner of the selected route list.
///
/// Invariants: at most [`MAX_PILLS`] routes, no duplicates, insertion order.
#[derive(Debug)]
pub struct SelectionController<S: LayerSink> {
    pills: Vec<RouteTag>,
    sink: S,
}

impl<S: LayerSink> SelectionController<S> {
    /// Create an empty selection.
    pub fn new(sink: S) -> Self {
        Self {
            pills: Vec::with_capacity(MAX_PILLS),
            sink,
        }
    }

    /// Create a selection pre-seeded with `tags`.
    ///
    /// Tags are added in order under the usual rules, so duplicates and tags
    /// beyond the capacity are ignored.
    pub fn with_initial(tags: impl IntoIterator<Item = RouteTag>, sink: S) -> Self {
        let mut selection = Self::new(sink);
        for tag in tags {
            selection.add(tag);
        }
        selection
    }

    /// Selected routes in insertion order.
    pub fn pills(&self) -> &[RouteTag] {
        &self.pills
    }

    pub fn len(&self) -> usize {
        self.pills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pills.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pills.len() >= MAX_PILLS
    }

    pub fn contains(&self, tag: &RouteTag) -> bool {
        self.pills.contains(tag)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Add a route. No-op when the selection is full or already has it.
    ///
    /// Returns whether the selection changed.
    pub fn add(&mut self, tag: RouteTag) -> bool {
        if self.is_full() || self.contains(&tag) {
            debug!(route = %tag, pills = self.pills.len(), "ignoring pill");
            return false;
        }

        self.sink.activate(&tag);
        self.pills.push(tag);
        true
    }

    /// Remove a route. No-op when it is not selected.
    ///
    /// Returns whether the selection changed.
    pub fn remove(&mut self, tag: &RouteTag) -> bool {
        let Some(idx) = self.pills.iter().position(|p| p == tag) else {
            return false;
        };

        let removed = self.pills.remove(idx);
        self.sink.deactivate(&removed);
        true
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    enum Op {
        Add(&'static str),
        Remove(&'static str),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        let tags = prop::sample::select(vec!["1", "6", "8", "N", "KT", "38R"]);
        prop_oneof![
            tags.clone().prop_map(Op::Add),
            tags.prop_map(Op::Remove),
        ]
    }

    /// Tracks which routes the sink believes are active.
    #[derive(Debug, Default)]
    struct ActiveSet {
        active: Vec<RouteTag>,
        double_activations: usize,
        spurious_deactivations: usize,
    }

    impl LayerSink for ActiveSet {
        fn activate(&mut self, tag: &RouteTag) {
            if self.active.contains(tag) {
                self.double_activations += 1;
            }
            self.active.push(tag.clone());
        }

        fn deactivate(&mut self, tag: &RouteTag) {
            match self.active.iter().position(|t| t == tag) {
                Some(idx) => {
                    self.active.remove(idx);
                }
                None => self.spurious_deactivations += 1,
            }
        }
    }

    proptest! {
        #[test]
        fn capacity_and_uniqueness_always_hold(ops in prop::collection::vec(arb_op(), 0..60)) {
            let mut selection = SelectionController::new(ActiveSet::default());

            for op in ops {
                let before = selection.pills().to_vec();
                match op {
                    Op::Add(t) => {
                        let t = RouteTag::parse(t).unwrap();
                        let was_present = before.contains(&t);
                        let was_full = before.len() >= MAX_PILLS;
                        let changed = selection.add(t);
                        if was_present || was_full {
                            prop_assert!(!changed);
                            prop_assert_eq!(selection.pills(), before.as_slice());
                        }
                    }
                    Op::Remove(t) => {
                        let t = RouteTag::parse(t).unwrap();
                        let changed = selection.remove(&t);
                        if !before.contains(&t) {
                            prop_assert!(!changed);
                            prop_assert_eq!(selection.pills(), before.as_slice());
                        }
                    }
                }

                prop_assert!(selection.len() <= MAX_PILLS);
                let unique: HashSet<_> = selection.pills().iter().collect();
                prop_assert_eq!(unique.len(), selection.len());
            }
        }

        #[test]
        fn sink_mirrors_selection(ops in prop::collection::vec(arb_op(), 0..60)) {
            let mut selection = SelectionController::new(ActiveSet::default());

            for op in ops {
                match op {
                    Op::Add(t) => { selection.add(RouteTag::parse(t).unwrap()); }
                    Op::Remove(t) => { selection.remove(&RouteTag::parse(t).unwrap()); }
                }
            }

            let sink = selection.sink();
            prop_assert_eq!(sink.double_activations, 0);
            prop_assert_eq!(sink.spurious_deactivations, 0);
            prop_assert_eq!(sink.active.as_slice(), selection.pills());
        }
    }
}
