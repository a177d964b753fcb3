use std::{
    ffi::{CStr, CString, c_char, c_void},
    fmt,
    marker::PhantomData,
    ptr::{self, NonNull},
};

use derive_where::derive_where;

use crate::{Wrapped, raw};

// === Native list -> managed sequence === //

/// Converts a borrowed native object list into a `Vec` of wrappers, front to
/// back, preserving order. Each entry resolves through the identity cache and
/// takes its own reference; the list and its nodes are left untouched. Null
/// entries are skipped.
///
/// # Safety
///
/// `list` must be null or point to a well-formed list whose payloads are live
/// native objects of the type `T` stands for.
pub unsafe fn obj_list_to_vec<T: Wrapped>(list: *const raw::RawList) -> Vec<T> {
    let mut out = Vec::new();
    let mut node = list;

    while !node.is_null() {
        unsafe {
            if let Some(obj) = T::from_raw_borrowed((*node).data.cast()) {
                out.push(obj);
            }

            node = (*node).next;
        }
    }

    out
}

/// Converts a borrowed native list of C strings into a `Vec<String>`.
///
/// # Safety
///
/// `list` must be null or point to a well-formed list whose payloads are null
/// or NUL-terminated strings.
pub unsafe fn string_list_to_vec(list: *const raw::RawList) -> Vec<String> {
    let mut out = Vec::new();
    let mut node = list;

    while !node.is_null() {
        unsafe {
            out.push(string_from_ptr((*node).data as *const c_char));
            node = (*node).next;
        }
    }

    out
}

/// Converts a borrowed, NULL-terminated C string array into a `Vec<String>`.
/// A null `array` yields an empty `Vec`.
///
/// # Safety
///
/// `array` must be null or point to a NULL-terminated array of NUL-terminated
/// strings.
pub unsafe fn c_string_array_to_vec(array: *const *const c_char) -> Vec<String> {
    let mut out = Vec::new();

    if array.is_null() {
        return out;
    }

    let mut index = 0;

    loop {
        let entry = unsafe { *array.add(index) };

        if entry.is_null() {
            break;
        }

        out.push(unsafe { string_from_ptr(entry) });

        index += 1;
    }

    out
}

/// Copies a borrowed C string into a `String`; null maps to the empty string.
///
/// # Safety
///
/// `value` must be null or point to a NUL-terminated string.
pub unsafe fn string_from_ptr(value: *const c_char) -> String {
    if value.is_null() {
        return String::new();
    }

    unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
}

// === StringArg === //

/// A temporary native string snapshotting a managed `&str` for one call.
///
/// The pointer from [`StringArg::as_ptr`] stays valid while the guard lives;
/// the empty string maps to null, matching the native convention for optional
/// string arguments. The inbound counterpart is [`string_from_ptr`].
#[derive(Debug, Default)]
pub struct StringArg {
    buffer: Option<CString>,
}

impl StringArg {
    /// Panics if `value` contains an interior NUL byte, which the native
    /// string convention cannot represent.
    pub fn new(value: &str) -> Self {
        let buffer = (!value.is_empty()).then(|| {
            CString::new(value).expect("native string arguments cannot contain a NUL byte")
        });

        Self { buffer }
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.buffer.as_ref().map_or(ptr::null(), |buffer| buffer.as_ptr())
    }
}

// === ObjList === //

/// A temporary native list snapshotting a managed sequence of wrappers.
///
/// Construction takes one native reference per entry; dropping the guard
/// releases those references and frees the nodes, leaving every refcount where
/// it started. The head pointer from [`ObjList::as_ptr`] is valid for native
/// calls for as long as the guard lives; an empty sequence yields a null head,
/// per the native convention.
#[derive_where(Default)]
pub struct ObjList<T: Wrapped> {
    head: Option<NonNull<raw::RawList>>,
    _ty: PhantomData<T>,
}

impl<T: Wrapped> fmt::Debug for ObjList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjList").finish_non_exhaustive()
    }
}

impl<T: Wrapped> ObjList<T> {
    pub fn new<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut head = ptr::null_mut();

        for item in items {
            let entry = item.as_raw();

            unsafe {
                // The list owns one reference per entry.
                raw::obj_ref(entry);

                head = raw::list_append(head, entry.cast());
            }
        }

        Self {
            head: NonNull::new(head),
            _ty: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *const raw::RawList {
        self.head.map_or(ptr::null(), |head| head.as_ptr() as *const _)
    }
}

impl<T: Wrapped> Drop for ObjList<T> {
    fn drop(&mut self) {
        let Some(head) = self.head else { return };

        unsafe { raw::list_free_with(head.as_ptr(), unref_entry) };
    }
}

unsafe fn unref_entry(data: *mut c_void) {
    if !data.is_null() {
        unsafe { raw::obj_unref(data.cast()) };
    }
}

// === StringList === //

/// A temporary native list snapshotting a managed sequence of strings.
///
/// Construction duplicates each string into list-owned storage; dropping the
/// guard frees the buffers and the nodes. An empty sequence yields a null
/// head.
#[derive(Default)]
pub struct StringList {
    head: Option<NonNull<raw::RawList>>,
}

impl fmt::Debug for StringList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringList").finish_non_exhaustive()
    }
}

impl StringList {
    /// Panics if an item contains an interior NUL byte, which the native
    /// string convention cannot represent.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut head = ptr::null_mut();

        for item in items {
            let buffer = CString::new(item.as_ref())
                .expect("native string list entries cannot contain a NUL byte");

            unsafe {
                head = raw::list_append(head, buffer.into_raw().cast());
            }
        }

        Self {
            head: NonNull::new(head),
        }
    }

    pub fn as_ptr(&self) -> *const raw::RawList {
        self.head.map_or(ptr::null(), |head| head.as_ptr() as *const _)
    }
}

impl Drop for StringList {
    fn drop(&mut self) {
        let Some(head) = self.head else { return };

        unsafe { raw::list_free_with(head.as_ptr(), free_string_entry) };
    }
}

unsafe fn free_string_entry(data: *mut c_void) {
    if !data.is_null() {
        drop(unsafe { CString::from_raw(data as *mut c_char) });
    }
}
