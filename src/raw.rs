//! The native side of the bridge, expressed as the C-convention contract the
//! wrapper layer binds against: manually reference-counted objects carrying a
//! keyed attachment table, and intrusive singly-linked lists.
//!
//! Everything here operates on raw pointers and follows the collaborator
//! library's rules rather than Rust's: an object is destroyed only when its
//! refcount reaches zero, attachment destructors run exactly once, and an
//! empty list *is* the null pointer.

use std::{
    cell::{Cell, RefCell},
    ffi::c_void,
    fmt, ptr,
};

use rustc_hash::FxHashMap;

// === RawObject === //

/// Cleanup callback attached to a datum; invoked exactly once, either when the
/// key is overwritten/removed or when the owning object is destroyed.
pub type RawDestructor = unsafe fn(data: *mut c_void);

/// A manually reference-counted native object.
///
/// Only ever handled through a `*mut RawObject`; the pointer address is the
/// object's identity. All access to a given object must be serialized by the
/// caller — the type is deliberately neither `Send` nor `Sync`.
pub struct RawObject {
    refcount: Cell<u32>,
    data: RefCell<FxHashMap<String, Datum>>,
}

struct Datum {
    value: *mut c_void,
    destructor: Option<RawDestructor>,
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("refcount", &self.refcount.get())
            .finish_non_exhaustive()
    }
}

/// Allocates a fresh object with a refcount of one. The caller owns that
/// initial reference.
pub fn obj_new() -> *mut RawObject {
    Box::into_raw(Box::new(RawObject {
        refcount: Cell::new(1),
        data: RefCell::new(FxHashMap::default()),
    }))
}

/// Takes an additional reference on `obj` and returns it.
///
/// # Safety
///
/// `obj` must be non-null and alive.
pub unsafe fn obj_ref(obj: *mut RawObject) -> *mut RawObject {
    let refcount = unsafe { &(*obj).refcount };

    let count = refcount
        .get()
        .checked_add(1)
        .unwrap_or_else(|| panic!("refcount overflow on native object {obj:?}"));

    refcount.set(count);

    obj
}

/// Releases one reference on `obj`, destroying it once the count reaches zero.
///
/// Destruction runs every attachment destructor exactly once and then frees
/// the object. Releasing a reference that was never taken is an unrecoverable
/// contract breach and panics rather than corrupting the graph.
///
/// # Safety
///
/// `obj` must be non-null and alive, and the caller must own the reference
/// being released.
pub unsafe fn obj_unref(obj: *mut RawObject) {
    let refcount = unsafe { &(*obj).refcount };

    let count = refcount.get();

    if count == 0 {
        panic!("refcount underflow on native object {obj:?}");
    }

    refcount.set(count - 1);

    if count == 1 {
        unsafe { obj_destroy(obj) };
    }
}

/// Reads the current refcount of `obj`.
///
/// # Safety
///
/// `obj` must be non-null and alive.
pub unsafe fn obj_refcount(obj: *const RawObject) -> u32 {
    unsafe { &(*obj).refcount }.get()
}

unsafe fn obj_destroy(obj: *mut RawObject) {
    // The allocation must go away even if an attachment destructor panics;
    // every entry has already been detached, so none can run twice.
    let _free = scopeguard::guard(obj, |obj| drop(unsafe { Box::from_raw(obj) }));

    let data: Vec<Datum> = {
        let mut map = unsafe { (*obj).data.borrow_mut() };

        map.drain().map(|(_, datum)| datum).collect()
    };

    for datum in data {
        if let Some(destructor) = datum.destructor {
            unsafe { destructor(datum.value) };
        }
    }
}

/// Stores `value` under `key` on `obj`.
///
/// If the key already held a datum, the prior destructor runs exactly once,
/// after the table has been updated. `destructor`, if any, runs when the key
/// is next overwritten or removed, or when `obj` is destroyed.
///
/// # Safety
///
/// `obj` must be non-null and alive; `value` must remain valid until the
/// destructor runs.
pub unsafe fn obj_data_set(
    obj: *mut RawObject,
    key: &str,
    value: *mut c_void,
    destructor: Option<RawDestructor>,
) {
    // Destructors may re-enter the table; never run one under the borrow.
    let prev = unsafe { (*obj).data.borrow_mut() }.insert(key.to_owned(), Datum { value, destructor });

    if let Some(prev) = prev
        && let Some(destructor) = prev.destructor
    {
        unsafe { destructor(prev.value) };
    }
}

/// Fetches the datum stored under `key`, or null if the key is unset.
///
/// # Safety
///
/// `obj` must be non-null and alive.
pub unsafe fn obj_data_get(obj: *mut RawObject, key: &str) -> *mut c_void {
    unsafe { (*obj).data.borrow() }
        .get(key)
        .map_or(ptr::null_mut(), |datum| datum.value)
}

/// Removes the datum stored under `key`, running its destructor immediately.
/// Removing an absent key is a no-op.
///
/// # Safety
///
/// `obj` must be non-null and alive.
pub unsafe fn obj_data_remove(obj: *mut RawObject, key: &str) {
    let prev = unsafe { (*obj).data.borrow_mut() }.remove(key);

    if let Some(prev) = prev
        && let Some(destructor) = prev.destructor
    {
        unsafe { destructor(prev.value) };
    }
}

// === RawList === //

/// A node of the native intrusive singly-linked list. Null terminates; the
/// empty list is the null pointer.
#[repr(C)]
#[derive(Debug)]
pub struct RawList {
    pub data: *mut c_void,
    pub next: *mut RawList,
}

/// Appends `data` to the list headed by `list`, returning the (possibly new)
/// head. Passing a null `list` starts a fresh list.
///
/// # Safety
///
/// `list` must be null or point to a well-formed list.
pub unsafe fn list_append(list: *mut RawList, data: *mut c_void) -> *mut RawList {
    let node = Box::into_raw(Box::new(RawList {
        data,
        next: ptr::null_mut(),
    }));

    if list.is_null() {
        return node;
    }

    let mut tail = list;

    unsafe {
        while !(*tail).next.is_null() {
            tail = (*tail).next;
        }

        (*tail).next = node;
    }

    list
}

/// Counts the entries of the list headed by `list`.
///
/// # Safety
///
/// `list` must be null or point to a well-formed list.
pub unsafe fn list_len(list: *const RawList) -> usize {
    let mut len = 0;
    let mut node = list;

    while !node.is_null() {
        len += 1;
        node = unsafe { (*node).next };
    }

    len
}

/// Frees every node of the list, invoking `destructor` on each payload first.
/// Returns the new (null) head.
///
/// # Safety
///
/// `list` must be null or point to a well-formed list whose payloads are valid
/// inputs for `destructor`; no node may be used afterwards.
pub unsafe fn list_free_with(list: *mut RawList, destructor: RawDestructor) -> *mut RawList {
    let mut node = list;

    while !node.is_null() {
        let owned = unsafe { Box::from_raw(node) };

        unsafe { destructor(owned.data) };

        node = owned.next;
    }

    ptr::null_mut()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Saturating the counter needs direct access to the cell; the rest of the
    // contract is exercised from the crate-level test module.
    #[test]
    #[should_panic(expected = "refcount overflow")]
    fn saturated_refcount_is_fatal() {
        let obj = obj_new();

        unsafe {
            (*obj).refcount.set(u32::MAX);

            obj_ref(obj);
        }
    }
}
