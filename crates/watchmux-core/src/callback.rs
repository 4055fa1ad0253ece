//! Subscriber callbacks.

use std::fmt;
use std::rc::Rc;

/// A subscriber callback for events of type `E`.
///
/// Callbacks are compared by identity: clones of one `Callback` are the same
/// subscriber, while two callbacks built from identical closures are not.
/// Subscribing the same callback to a target twice replaces its options.
pub struct Callback<E> {
    func: Rc<dyn Fn(&E)>,
}

impl<E> Callback<E> {
    /// Wrap a closure.
    pub fn new(func: impl Fn(&E) + 'static) -> Self {
        Self {
            func: Rc::new(func),
        }
    }

    /// Whether `self` and `other` are the same subscriber.
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }

    pub(crate) fn invoke(&self, event: &E) {
        (self.func)(event)
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.func) as *const ()
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self {
            func: Rc::clone(&self.func),
        }
    }
}

impl<E> PartialEq for Callback<E> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<E> Eq for Callback<E> {}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_identity() {
        let a: Callback<u32> = Callback::new(|_| {});
        let b: Callback<u32> = Callback::new(|_| {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_invoke() {
        let total = Rc::new(Cell::new(0));
        let sink = Rc::clone(&total);
        let callback = Callback::new(move |n: &u32| sink.set(sink.get() + n));

        callback.invoke(&2);
        callback.clone().invoke(&3);
        assert_eq!(total.get(), 5);
    }
}
