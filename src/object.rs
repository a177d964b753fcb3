use std::{
    any::Any,
    ffi::{CString, c_void},
    fmt, hash, ptr,
    sync::{Arc, Weak},
};

use thiserror::Error;

use crate::raw;

// === Error === //

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Returned by [`Obj::string_data`] for an unset key. Typed object lookups
    /// instead report absence with `None`, since "no object" is a normal
    /// outcome there; for string data an empty result would be ambiguous with
    /// a stored empty string.
    #[error("no string data attached under key {key:?}")]
    NotFound { key: String },
}

// === Obj === //

/// The attachment key holding the identity-cache back-pointer. Installed with
/// no destructor; the wrapper's own teardown clears it.
const IDENTITY_KEY: &str = "rust_object";

/// A managed wrapper around one native object.
///
/// An `Obj` owns exactly one native reference, taken when the wrapper is
/// minted and released when the last clone is dropped. At most one wrapper
/// exists per live native object: re-wrapping a pointer that already carries a
/// wrapper yields a new shared reference to the *same* wrapper, so `Obj`s
/// minted from the same pointer always compare equal.
///
/// `Obj` is neither `Send` nor `Sync`; all access to a given native object
/// and its wrapper must stay on the thread the native library dispatches on.
#[derive(Clone)]
pub struct Obj {
    core: Arc<ObjCore>,
}

struct ObjCore {
    raw: *mut raw::RawObject,
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({:p}, rc {})", self.core.raw, unsafe {
            raw::obj_refcount(self.core.raw)
        })
    }
}

impl Eq for Obj {}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl hash::Hash for Obj {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.core) as usize).hash(state);
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl Obj {
    /// Allocates a fresh native object and wraps it, transferring the creation
    /// reference into the wrapper.
    pub fn new() -> Self {
        unsafe { Self::from_raw_owned(raw::obj_new()) }.expect("obj_new returned a null object")
    }

    /// Wraps a borrowed native pointer, returning `None` for null.
    ///
    /// If `ptr` already carries a wrapper, a new shared reference to that same
    /// wrapper is returned. Otherwise a wrapper is minted and takes its own
    /// native reference.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live native object.
    pub unsafe fn from_raw_borrowed(ptr: *mut raw::RawObject) -> Option<Self> {
        unsafe { Self::wrap(ptr, true) }
    }

    /// Wraps a native pointer whose single owning reference is being
    /// transferred in (e.g. from a factory call), returning `None` for null.
    ///
    /// The minted wrapper adopts the transferred reference instead of taking
    /// another one.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live native object, and the caller
    /// must own the reference being transferred.
    pub unsafe fn from_raw_owned(ptr: *mut raw::RawObject) -> Option<Self> {
        unsafe { Self::wrap(ptr, false) }
    }

    unsafe fn wrap(ptr: *mut raw::RawObject, take_ref: bool) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }

        let cached = unsafe { raw::obj_data_get(ptr, IDENTITY_KEY) } as *const Weak<ObjCore>;

        if !cached.is_null() {
            let Some(core) = unsafe { &*cached }.upgrade() else {
                // The entry is cleared before any teardown step that could
                // re-enter this path, so a dead back-pointer means the native
                // library broke the lifetime contract.
                panic!("identity cache of native object {ptr:?} points at a dead wrapper");
            };

            if !take_ref {
                // The transferred reference is redundant; the live wrapper
                // already owns one.
                unsafe { raw::obj_unref(ptr) };
            }

            return Some(Self { core });
        }

        if take_ref {
            unsafe { raw::obj_ref(ptr) };
        }

        let core = Arc::new(ObjCore { raw: ptr });
        let entry = Box::into_raw(Box::new(Arc::downgrade(&core)));

        unsafe { raw::obj_data_set(ptr, IDENTITY_KEY, entry.cast(), None) };

        Some(Self { core })
    }

    /// Returns the wrapped native pointer without touching its refcount.
    ///
    /// Callers that store the pointer beyond this wrapper's lifetime must take
    /// their own reference.
    pub fn as_raw(&self) -> *mut raw::RawObject {
        self.core.raw
    }

    /// Maps an optional wrapper to its native pointer, null for `None`.
    pub fn raw_or_null(obj: Option<&Self>) -> *mut raw::RawObject {
        obj.map_or(ptr::null_mut(), Self::as_raw)
    }

    /// Attaches `value` under `key`, replacing (and dropping) whatever the key
    /// previously held. The value lives until the key is overwritten or unset,
    /// or the native object is destroyed.
    ///
    /// Keys must stay type-consistent: a later [`Obj::data`] with a different
    /// `T` is a caller bug and reports `None`.
    pub fn set_data<T: Any>(&self, key: &str, value: Arc<T>) {
        assert_ne!(key, IDENTITY_KEY, "attachment key {IDENTITY_KEY:?} is reserved");

        let value: Arc<dyn Any> = value;
        let entry = Box::into_raw(Box::new(value));

        unsafe { raw::obj_data_set(self.as_raw(), key, entry.cast(), Some(drop_data_entry)) };
    }

    /// Fetches the value attached under `key`, or `None` if the key is unset
    /// or holds a value of a different type.
    pub fn data<T: Any>(&self, key: &str) -> Option<Arc<T>> {
        assert_ne!(key, IDENTITY_KEY, "attachment key {IDENTITY_KEY:?} is reserved");

        let entry = unsafe { raw::obj_data_get(self.as_raw(), key) } as *const Arc<dyn Any>;

        if entry.is_null() {
            return None;
        }

        let entry = unsafe { &*entry };

        // `Arc::downcast` is only provided for `Send + Sync` payloads, which
        // attachments deliberately are not; check and recast by hand instead.
        entry.is::<T>().then(|| {
            let raw = Arc::into_raw(entry.clone());

            unsafe { Arc::from_raw(raw as *const T) }
        })
    }

    /// Removes the attachment under `key`, dropping its value immediately.
    /// Unsetting an absent key is a no-op.
    pub fn unset_data(&self, key: &str) {
        assert_ne!(key, IDENTITY_KEY, "attachment key {IDENTITY_KEY:?} is reserved");

        unsafe { raw::obj_data_remove(self.as_raw(), key) };
    }

    /// Attaches a copy of `value` under `key` as store-owned string data.
    ///
    /// Panics if `value` contains an interior NUL byte, which the native
    /// string convention cannot represent.
    pub fn set_string_data(&self, key: &str, value: &str) {
        let value = CString::new(value).expect("string attachment data cannot contain a NUL byte");

        self.set_data(key, Arc::new(value));
    }

    /// Fetches the string data attached under `key`.
    ///
    /// Fails with [`Error::NotFound`] for an unset key; an explicitly stored
    /// empty string is returned successfully.
    pub fn string_data(&self, key: &str) -> Result<String, Error> {
        let Some(value) = self.data::<CString>(key) else {
            return Err(Error::NotFound { key: key.to_owned() });
        };

        Ok(value.to_string_lossy().into_owned())
    }
}

impl Drop for ObjCore {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }

        unsafe {
            // Clear the identity entry first: a wrap during the rest of
            // teardown must mint a fresh wrapper rather than resurrect this
            // one, and the entry has to be gone before an unref that may
            // destroy the attachment table with it.
            let entry = raw::obj_data_get(self.raw, IDENTITY_KEY) as *mut Weak<ObjCore>;

            raw::obj_data_remove(self.raw, IDENTITY_KEY);

            if !entry.is_null() {
                drop(Box::from_raw(entry));
            }

            raw::obj_unref(self.raw);
        }
    }
}

unsafe fn drop_data_entry(data: *mut c_void) {
    drop(unsafe { Box::from_raw(data as *mut Arc<dyn Any>) });
}
