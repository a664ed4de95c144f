//! Canonical, mutation-observable annotation collection
//!
//! The store holds document-space records only: no rendering objects and no
//! I/O. Persistence is a subscriber supplied by the host. Subscribers run
//! synchronously once per mutation; a failing subscriber is logged and never
//! rolls back the in-memory change.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId, AnnotationPatch};
use crate::error::{MarkupError, MarkupResult};

/// Kind of mutation reported to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

/// Error type subscribers may return
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Handle returned by [`AnnotationStore::subscribe`]
pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(ChangeType, &Annotation) -> Result<(), ListenerError>>;

/// Collection of annotations for a document
pub struct AnnotationStore {
    /// All annotations indexed by ID
    annotations: HashMap<AnnotationId, Annotation>,

    /// Ids per page, in creation order
    by_page: BTreeMap<u32, Vec<AnnotationId>>,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            annotations: HashMap::new(),
            by_page: BTreeMap::new(),
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Register a listener invoked with `(change, annotation)` on every mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(ChangeType, &Annotation) -> Result<(), ListenerError> + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Add an annotation
    ///
    /// Re-adding an id that already exists replaces the record in place and
    /// keeps its creation-order slot.
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id;
        let page = annotation.page_number;

        if let Some(previous) = self.annotations.insert(id, annotation) {
            if previous.page_number != page {
                self.unlink(previous.page_number, id);
                self.by_page.entry(page).or_default().push(id);
            }
        } else {
            self.by_page.entry(page).or_default().push(id);
        }

        tracing::debug!(%id, page, "annotation added");
        self.notify(ChangeType::Added, &id);
        id
    }

    /// Apply a partial update
    ///
    /// Returns [`MarkupError::AnnotationNotFound`] and leaves the store unchanged
    /// for unknown ids.
    pub fn update(&mut self, id: AnnotationId, patch: &AnnotationPatch) -> MarkupResult<()> {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(MarkupError::AnnotationNotFound(id))?;
        patch.apply_to(annotation);

        tracing::debug!(%id, "annotation updated");
        self.notify(ChangeType::Updated, &id);
        Ok(())
    }

    /// Overwrite a full record, as when undo/redo restores an earlier state
    ///
    /// Unlike [`update`](Self::update) this keeps the record's own
    /// `modified_at`.
    pub fn replace(&mut self, annotation: Annotation) -> MarkupResult<()> {
        let id = annotation.id;
        let previous = self
            .annotations
            .get(&id)
            .map(|existing| existing.page_number)
            .ok_or(MarkupError::AnnotationNotFound(id))?;
        let page = annotation.page_number;
        self.annotations.insert(id, annotation);
        if previous != page {
            self.unlink(previous, id);
            self.by_page.entry(page).or_default().push(id);
        }

        tracing::debug!(%id, "annotation replaced");
        self.notify(ChangeType::Updated, &id);
        Ok(())
    }

    /// Remove an annotation, returning the removed record
    pub fn remove(&mut self, id: AnnotationId) -> MarkupResult<Annotation> {
        let annotation = self
            .annotations
            .remove(&id)
            .ok_or(MarkupError::AnnotationNotFound(id))?;
        self.unlink(annotation.page_number, id);

        tracing::debug!(%id, "annotation removed");
        for (_, listener) in self.listeners.iter_mut() {
            if let Err(error) = listener(ChangeType::Removed, &annotation) {
                tracing::warn!(%id, %error, "store subscriber failed; keeping in-memory change");
            }
        }
        Ok(annotation)
    }

    /// Annotations on a page in creation order
    pub fn get(&self, page_number: u32) -> Vec<&Annotation> {
        self.by_page
            .get(&page_number)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.annotations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up a single annotation
    pub fn find(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.annotations.contains_key(&id)
    }

    /// All annotations ordered by page, then creation
    pub fn all(&self) -> Vec<&Annotation> {
        self.by_page
            .values()
            .flat_map(|ids| ids.iter().filter_map(|id| self.annotations.get(id)))
            .collect()
    }

    /// Seed the store from persisted records without notifying subscribers
    pub fn load(&mut self, records: impl IntoIterator<Item = Annotation>) {
        for annotation in records {
            let id = annotation.id;
            let page = annotation.page_number;
            if self.annotations.insert(id, annotation).is_none() {
                self.by_page.entry(page).or_default().push(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn unlink(&mut self, page: u32, id: AnnotationId) {
        if let Some(ids) = self.by_page.get_mut(&page) {
            ids.retain(|aid| *aid != id);
            if ids.is_empty() {
                self.by_page.remove(&page);
            }
        }
    }

    fn notify(&mut self, change: ChangeType, id: &AnnotationId) {
        let Some(annotation) = self.annotations.get(id) else {
            return;
        };
        for (_, listener) in self.listeners.iter_mut() {
            if let Err(error) = listener(change, annotation) {
                tracing::warn!(%id, %error, "store subscriber failed; keeping in-memory change");
            }
        }
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, AnnotationStyle, Point, Size};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rect_on(page: u32, x: f64) -> Annotation {
        Annotation::new(
            AnnotationKind::Rectangle,
            page,
            Point::new(x, 0.0),
            Size::new(10.0, 10.0),
            AnnotationStyle::default(),
        )
    }

    fn recording(store: &mut AnnotationStore) -> Rc<RefCell<Vec<(ChangeType, AnnotationId)>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        store.subscribe(move |change, annotation| {
            sink.borrow_mut().push((change, annotation.id));
            Ok(())
        });
        log
    }

    #[test]
    fn get_returns_creation_order_per_page() {
        let mut store = AnnotationStore::new();
        let a = store.add(rect_on(1, 30.0));
        let b = store.add(rect_on(2, 10.0));
        let c = store.add(rect_on(1, 20.0));

        let page_one: Vec<_> = store.get(1).iter().map(|a| a.id).collect();
        assert_eq!(page_one, vec![a, c]);
        assert_eq!(store.get(2)[0].id, b);
        assert!(store.get(3).is_empty());
    }

    #[test]
    fn each_mutation_notifies_once() {
        let mut store = AnnotationStore::new();
        let log = recording(&mut store);

        let id = store.add(rect_on(1, 0.0));
        store
            .update(
                id,
                &AnnotationPatch {
                    position: Some(Point::new(4.0, 4.0)),
                    ..Default::default()
                },
            )
            .unwrap();
        store.remove(id).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                (ChangeType::Added, id),
                (ChangeType::Updated, id),
                (ChangeType::Removed, id)
            ]
        );
    }

    #[test]
    fn update_unknown_id_reports_not_found() {
        let mut store = AnnotationStore::new();
        let log = recording(&mut store);
        store.add(rect_on(1, 0.0));
        log.borrow_mut().clear();

        let missing = AnnotationId::new_v4();
        let result = store.update(missing, &AnnotationPatch::default());
        assert_eq!(result, Err(MarkupError::AnnotationNotFound(missing)));
        assert!(log.borrow().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failing_subscriber_does_not_roll_back() {
        let mut store = AnnotationStore::new();
        store.subscribe(|_, _| Err("backing store offline".into()));
        let log = recording(&mut store);

        let id = store.add(rect_on(1, 0.0));
        assert!(store.contains(id));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut store = AnnotationStore::new();
        let log = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&log);
        let sub = store.subscribe(move |_, _| {
            *sink.borrow_mut() += 1;
            Ok(())
        });

        store.add(rect_on(1, 0.0));
        assert!(store.unsubscribe(sub));
        store.add(rect_on(1, 5.0));
        assert_eq!(*log.borrow(), 1);
    }

    #[test]
    fn load_is_silent() {
        let mut store = AnnotationStore::new();
        let log = recording(&mut store);
        store.load(vec![rect_on(1, 0.0), rect_on(2, 0.0)]);
        assert_eq!(store.len(), 2);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn replace_keeps_timestamps_and_notifies_update() {
        let mut store = AnnotationStore::new();
        let original = rect_on(1, 0.0);
        let id = store.add(original.clone());
        store
            .update(
                id,
                &AnnotationPatch {
                    position: Some(Point::new(9.0, 9.0)),
                    ..Default::default()
                },
            )
            .unwrap();
        let log = recording(&mut store);

        store.replace(original.clone()).unwrap();
        assert_eq!(store.find(id), Some(&original));
        assert_eq!(*log.borrow(), vec![(ChangeType::Updated, id)]);
        assert!(store.replace(rect_on(1, 1.0)).is_err());
    }

    #[test]
    fn readding_keeps_creation_slot() {
        let mut store = AnnotationStore::new();
        let first = rect_on(1, 0.0);
        let first_id = store.add(first.clone());
        let second = store.add(rect_on(1, 5.0));

        store.add(first);
        let order: Vec<_> = store.get(1).iter().map(|a| a.id).collect();
        assert_eq!(order, vec![first_id, second]);
    }
}
