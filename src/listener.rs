use std::{cell::RefCell, sync::Arc};

use derive_where::derive_where;

use crate::{Obj, Wrapped};

// === Slots === //

const LISTENER_KEY: &str = "rust_listener";
const LISTENER_LIST_KEY: &str = "rust_listeners";

#[derive_where(Default)]
struct ListenerSlot<L: ?Sized + 'static> {
    current: RefCell<Option<Arc<L>>>,
}

#[derive_where(Default)]
struct ListenerList<L: ?Sized + 'static> {
    entries: RefCell<Vec<Arc<L>>>,
}

// Lazily installs the slot on first access. The slot rides on the attachment
// store and dies with the native object; the listeners it refers to do not.
fn slot<L: ?Sized + 'static>(obj: &Obj) -> Arc<ListenerSlot<L>> {
    if let Some(slot) = obj.data::<ListenerSlot<L>>(LISTENER_KEY) {
        return slot;
    }

    let slot = Arc::new(ListenerSlot::<L>::default());

    obj.set_data(LISTENER_KEY, slot.clone());

    slot
}

fn list_slot<L: ?Sized + 'static>(obj: &Obj) -> Arc<ListenerList<L>> {
    if let Some(slot) = obj.data::<ListenerList<L>>(LISTENER_LIST_KEY) {
        return slot;
    }

    let slot = Arc::new(ListenerList::<L>::default());

    obj.set_data(LISTENER_LIST_KEY, slot.clone());

    slot
}

fn identity<L: ?Sized>(listener: &Arc<L>) -> *const () {
    Arc::as_ptr(listener).cast()
}

// === Listenable === //

/// Wrapper types observed by at most one listener at a time.
///
/// A given object holds one listener slot, keyed by `Listener`; wrapper types
/// sharing a native object must agree on that type.
pub trait Listenable: Wrapped {
    type Listener: ?Sized + 'static;

    /// Replaces the attached listener, dropping the reference to the previous
    /// one. `None` detaches.
    fn set_listener(&self, listener: Option<Arc<Self::Listener>>) {
        *slot::<Self::Listener>(self.obj()).current.borrow_mut() = listener;
    }

    /// Fetches the currently attached listener, if any.
    fn listener(&self) -> Option<Arc<Self::Listener>> {
        slot::<Self::Listener>(self.obj()).current.borrow().clone()
    }
}

// === MultiListenable === //

/// Wrapper types observed by an ordered collection of listeners.
pub trait MultiListenable: Wrapped {
    type Listener: ?Sized + 'static;

    /// Appends `listener` unless an identical listener (same allocation) is
    /// already attached.
    fn add_listener(&self, listener: Arc<Self::Listener>) {
        let list = list_slot::<Self::Listener>(self.obj());
        let mut entries = list.entries.borrow_mut();

        if entries.iter().any(|known| identity(known) == identity(&listener)) {
            return;
        }

        entries.push(listener);
    }

    /// Removes the first identity match of `listener`; no-op if absent.
    fn remove_listener(&self, listener: &Arc<Self::Listener>) {
        let list = list_slot::<Self::Listener>(self.obj());
        let mut entries = list.entries.borrow_mut();

        if let Some(index) = entries
            .iter()
            .position(|known| identity(known) == identity(listener))
        {
            entries.remove(index);
        }
    }

    /// Snapshots the attached listeners in insertion order.
    ///
    /// Dispatch iterates the snapshot, so a listener removing itself (or any
    /// other listener) mid-iteration cannot corrupt the traversal.
    fn listeners(&self) -> Vec<Arc<Self::Listener>> {
        list_slot::<Self::Listener>(self.obj()).entries.borrow().clone()
    }
}
