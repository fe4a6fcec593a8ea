//! Per-call scope.
//!
//! The [`Mediator`](crate::Mediator) opens one [`CallScope`] for every
//! `send` and `publish` call and hands it to each handler and behavior
//! factory it invokes. Values stored in the scope live exactly as long as the
//! call: the scope is dropped when the call returns, fails, short-circuits, or
//! when the call's future is dropped before completion.
//!
//! ```rust,ignore
//! registry.register_request_handler::<CreateOrder, _, _>(|scope| {
//!     // Shared with every behavior of the same call.
//!     let unit_of_work = scope.get_or_insert_with(UnitOfWork::begin);
//!     CreateOrderHandler::new(unit_of_work)
//! });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::message::Shape;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// State owned by a single dispatch call.
pub struct CallScope {
    id: u64,
    shape: Shape,
    values: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl CallScope {
    /// Opens a new scope for a call dispatching `shape`.
    pub fn open(shape: Shape) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        trace!(scope = id, shape = %shape, "Call scope opened");
        Self {
            id,
            shape,
            values: Mutex::new(HashMap::new()),
        }
    }

    /// Process-unique identifier of this call.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Shape of the message being dispatched.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Returns the scoped value of type `T`, if one was stored.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let value = self.values.lock().get(&TypeId::of::<T>()).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Returns the scoped value of type `T`, creating it with `init` on first
    /// access within this call.
    pub fn get_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut values = self.values.lock();
        if let Some(value) = values.get(&TypeId::of::<T>()).cloned()
            && let Ok(value) = value.downcast::<T>()
        {
            return value;
        }

        let value = Arc::new(init());
        values.insert(TypeId::of::<T>(), value.clone());
        value
    }

    /// Number of scoped values currently stored.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns `true` if no scoped value has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        trace!(
            scope = self.id,
            shape = %self.shape,
            values = self.values.get_mut().len(),
            "Call scope released"
        );
    }
}

impl fmt::Debug for CallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallScope")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("values", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Connection {
        opened: usize,
    }

    #[test]
    fn test_scoped_value_is_created_once() {
        let scope = CallScope::open(Shape::of::<u8>());
        let counter = AtomicUsize::new(0);

        let first = scope.get_or_insert_with(|| Connection {
            opened: counter.fetch_add(1, Ordering::SeqCst) + 1,
        });
        let second = scope.get_or_insert_with(|| Connection {
            opened: counter.fetch_add(1, Ordering::SeqCst) + 1,
        });

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.opened, 1);
        assert_eq!(scope.len(), 1);
        assert!(scope.get::<Connection>().is_some());
        assert!(scope.get::<String>().is_none());
    }

    #[test]
    fn test_scopes_are_isolated() {
        let a = CallScope::open(Shape::of::<u8>());
        let b = CallScope::open(Shape::of::<u8>());

        a.get_or_insert_with(|| 1_u32);

        assert!(b.is_empty());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_values_are_released_with_scope() {
        let scope = CallScope::open(Shape::of::<u8>());
        let value = scope.get_or_insert_with(|| String::from("unit of work"));
        assert_eq!(Arc::strong_count(&value), 2);

        drop(scope);
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
