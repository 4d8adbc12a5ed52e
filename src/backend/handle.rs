//! Opaque delegate handles
//!
//! A handle wraps whatever state a backend builds in `init`. The runtime
//! stores it and routes it back to the issuing backend but never looks
//! inside.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle identifier, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Backend-private state for one initialized delegate
///
/// Created by a backend's `init`, consumed by its `destroy`. Not `Clone`:
/// exactly one handle exists per delegate instance.
pub struct DelegateHandle {
    id: HandleId,
    owner: Option<String>,
    state: Box<dyn Any + Send + Sync>,
}

impl DelegateHandle {
    /// Wrap backend state in a fresh handle
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self {
            id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)),
            owner: None,
            state: Box::new(state),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Name of the backend that issued this handle, once bound
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn bind_owner(&mut self, name: &str) {
        self.owner = Some(name.to_string());
    }

    /// Borrow the backend state if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    /// Borrow the backend state or report an invalid handle for `backend`
    pub fn state<T: Any>(&self, backend: &str) -> Result<&T> {
        self.downcast_ref::<T>()
            .ok_or_else(|| Error::invalid_handle(backend))
    }

    /// Take the backend state back out, consuming the handle
    pub fn into_state<T: Any + Send + Sync>(self) -> std::result::Result<Box<T>, Self> {
        let DelegateHandle { id, owner, state } = self;
        state
            .downcast::<T>()
            .map_err(|state| DelegateHandle { id, owner, state })
    }
}

impl fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct State {
        value: u32,
    }

    #[test]
    fn test_ids_are_unique() {
        let a = DelegateHandle::new(());
        let b = DelegateHandle::new(());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_downcast() {
        let handle = DelegateHandle::new(State { value: 7 });
        assert_eq!(handle.downcast_ref::<State>().unwrap().value, 7);
        assert!(handle.downcast_ref::<u64>().is_none());
        assert!(matches!(
            handle.state::<u64>("npu"),
            Err(Error::DelegateInvalidHandle { .. })
        ));
    }

    #[test]
    fn test_into_state() {
        let mut handle = DelegateHandle::new(State { value: 3 });
        handle.bind_owner("cpu_ref");
        let id = handle.id();

        let handle = handle.into_state::<u8>().unwrap_err();
        assert_eq!(handle.id(), id);
        assert_eq!(handle.owner(), Some("cpu_ref"));

        let state = handle.into_state::<State>().unwrap();
        assert_eq!(state.value, 3);
    }
}
