//! Two-level subscriber table.
//!
//! Maps each target to its subscribers and each subscriber to its options,
//! both levels in insertion order. A target is present exactly while it has
//! at least one subscriber.

use crate::callback::Callback;
use crate::filter::FilterOptions;

/// Outcome of [`SubscriberTable::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion<O> {
    /// The target had no subscribers before.
    NewTarget,
    /// A new subscriber was added to an existing target.
    Added,
    /// The subscriber was already present; holds its previous options.
    Replaced(O),
}

/// Outcome of [`SubscriberTable::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The target has no subscribers.
    UnknownTarget,
    /// The callback is not subscribed to the target.
    UnknownSubscriber,
    /// The subscriber was removed and others remain.
    Removed {
        /// Subscribers left on the target.
        remaining: usize,
    },
    /// The last subscriber was removed, and the target with it.
    TargetEmptied,
}

/// A target with its subscribers.
#[derive(Debug)]
struct Entry<T, E, O> {
    target: T,
    subscribers: Vec<(Callback<E>, O)>,
}

/// Subscriptions keyed by target, then by callback identity.
#[derive(Debug)]
pub struct SubscriberTable<T, E, O> {
    entries: Vec<Entry<T, E, O>>,
}

impl<T, E, O> Default for SubscriberTable<T, E, O> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T, E, O> SubscriberTable<T, E, O>
where
    T: PartialEq + Clone,
    O: Copy,
{
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, target: &T) -> Option<&Entry<T, E, O>> {
        self.entries.iter().find(|e| e.target == *target)
    }

    fn position(&self, target: &T) -> Option<usize> {
        self.entries.iter().position(|e| e.target == *target)
    }

    /// Subscribe `callback` to `target`, replacing its options if it is
    /// already subscribed there.
    pub fn insert(&mut self, target: T, callback: Callback<E>, options: O) -> Insertion<O> {
        let Some(index) = self.position(&target) else {
            self.entries.push(Entry {
                target,
                subscribers: vec![(callback, options)],
            });
            return Insertion::NewTarget;
        };

        let subscribers = &mut self.entries[index].subscribers;
        match subscribers.iter_mut().find(|(cb, _)| cb.same(&callback)) {
            Some((_, existing)) => Insertion::Replaced(std::mem::replace(existing, options)),
            None => {
                subscribers.push((callback, options));
                Insertion::Added
            }
        }
    }

    /// Revert an [`insert`](Self::insert) given the outcome it returned.
    pub fn undo(&mut self, target: &T, callback: &Callback<E>, insertion: Insertion<O>) {
        match insertion {
            Insertion::NewTarget | Insertion::Added => {
                self.remove(target, callback);
            }
            Insertion::Replaced(previous) => {
                if let Some(index) = self.position(target) {
                    if let Some((_, options)) = self.entries[index]
                        .subscribers
                        .iter_mut()
                        .find(|(cb, _)| cb.same(callback))
                    {
                        *options = previous;
                    }
                }
            }
        }
    }

    /// Unsubscribe `callback` from `target`.
    pub fn remove(&mut self, target: &T, callback: &Callback<E>) -> Removal {
        let Some(index) = self.position(target) else {
            return Removal::UnknownTarget;
        };

        let subscribers = &mut self.entries[index].subscribers;
        let Some(position) = subscribers.iter().position(|(cb, _)| cb.same(callback)) else {
            return Removal::UnknownSubscriber;
        };
        subscribers.remove(position);

        if subscribers.is_empty() {
            self.entries.remove(index);
            Removal::TargetEmptied
        } else {
            Removal::Removed {
                remaining: subscribers.len(),
            }
        }
    }

    /// The subscribers of `target` with their options, in subscription order.
    pub fn subscribers(&self, target: &T) -> Vec<(Callback<E>, O)> {
        self.entry(target)
            .map(|e| e.subscribers.clone())
            .unwrap_or_default()
    }

    /// The options `callback` subscribed to `target` with.
    pub fn options(&self, target: &T, callback: &Callback<E>) -> Option<O> {
        self.entry(target)?
            .subscribers
            .iter()
            .find(|(cb, _)| cb.same(callback))
            .map(|(_, options)| *options)
    }

    /// Iterate targets and their subscribers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &[(Callback<E>, O)])> {
        self.entries
            .iter()
            .map(|e| (&e.target, e.subscribers.as_slice()))
    }

    /// Every target, in insertion order.
    pub fn targets(&self) -> Vec<T> {
        self.entries.iter().map(|e| e.target.clone()).collect()
    }

    /// Whether `target` has subscribers.
    pub fn contains(&self, target: &T) -> bool {
        self.entry(target).is_some()
    }

    /// Number of targets.
    pub fn target_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of subscribers on `target`.
    pub fn subscriber_count(&self, target: &T) -> usize {
        self.entry(target).map_or(0, |e| e.subscribers.len())
    }

    /// Number of subscriptions across all targets.
    pub fn total_subscribers(&self) -> usize {
        self.entries.iter().map(|e| e.subscribers.len()).sum()
    }

    /// Whether the table has no targets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every subscription.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T, E, O> SubscriberTable<T, E, O>
where
    T: PartialEq + Clone,
    O: FilterOptions,
{
    /// The combined options for `target`: `defaults` OR every subscriber's
    /// options. `None` when the target has no subscribers.
    pub fn combined(&self, target: &T, defaults: O) -> Option<O> {
        let entry = self.entry(target)?;
        Some(O::combine(
            defaults,
            entry.subscribers.iter().map(|(_, options)| options),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PropertyFilter;

    type Table = SubscriberTable<&'static str, (), PropertyFilter>;

    fn callback() -> Callback<()> {
        Callback::new(|_| {})
    }

    #[test]
    fn test_insert_and_replace() {
        let mut table = Table::new();
        let a = callback();
        let get = PropertyFilter::new().with_get();
        let set = PropertyFilter::new().with_set();

        assert_eq!(table.insert("t", a.clone(), get), Insertion::NewTarget);
        assert_eq!(table.insert("t", a.clone(), set), Insertion::Replaced(get));
        assert_eq!(table.insert("t", callback(), get), Insertion::Added);

        assert_eq!(table.subscriber_count(&"t"), 2);
        assert_eq!(table.options(&"t", &a), Some(set));
    }

    #[test]
    fn test_remove_last_drops_target() {
        let mut table = Table::new();
        let a = callback();
        let b = callback();
        table.insert("t", a.clone(), PropertyFilter::ALL);
        table.insert("t", b.clone(), PropertyFilter::ALL);

        assert_eq!(table.remove(&"u", &a), Removal::UnknownTarget);
        assert_eq!(table.remove(&"t", &callback()), Removal::UnknownSubscriber);
        assert_eq!(table.remove(&"t", &a), Removal::Removed { remaining: 1 });
        assert_eq!(table.remove(&"t", &b), Removal::TargetEmptied);
        assert!(!table.contains(&"t"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut table = Table::new();
        let a = callback();
        let get = PropertyFilter::new().with_get();

        let first = table.insert("t", a.clone(), get);
        let second = table.insert("t", a.clone(), PropertyFilter::ALL);
        table.undo(&"t", &a, second);
        assert_eq!(table.options(&"t", &a), Some(get));

        table.undo(&"t", &a, first);
        assert!(table.is_empty());
    }

    #[test]
    fn test_insertion_order_and_combined() {
        let mut table = Table::new();
        table.insert("b", callback(), PropertyFilter::new().with_del());
        table.insert("a", callback(), PropertyFilter::new().with_get());
        table.insert("a", callback(), PropertyFilter::new().with_set());

        assert_eq!(table.targets(), vec!["b", "a"]);
        assert_eq!(table.total_subscribers(), 3);
        assert_eq!(
            table.combined(&"a", PropertyFilter::NONE),
            Some(PropertyFilter::new().with_get().with_set())
        );
        assert_eq!(table.combined(&"c", PropertyFilter::ALL), None);
    }
}
