//! An identity-preserving bridge between Rust wrappers and a manually
//! reference-counted native object graph.
//!
//! The native library this crate talks to hands out opaque, refcounted object
//! pointers and lets arbitrary keyed data ride on each object (see [`raw`]).
//! `tether` ties those pointers into Rust's ownership model:
//!
//! - every native object maps to **exactly one** live [`Obj`] wrapper —
//!   re-wrapping a pointer resolves to the existing wrapper through an
//!   identity-cache attachment stored on the object itself;
//! - wrapper lifetime drives the native refcount: one reference is taken when
//!   a wrapper is minted and released when its last clone drops;
//! - typed data ([`Obj::set_data`]), string data ([`Obj::set_string_data`]),
//!   and observers ([`Listenable`], [`MultiListenable`]) attach to native
//!   objects without the native library knowing about Rust types;
//! - native lists convert losslessly to and from `Vec`s of wrappers or
//!   strings ([`obj_list_to_vec`], [`ObjList`], [`StringList`]).
//!
//! Bindings expose one newtype per native type via the [`wrapper!`] macro:
//!
//! ```
//! use tether::{Wrapped as _, raw, wrapper};
//!
//! wrapper!(pub Session);
//!
//! // A native pointer crosses into managed code for the first time...
//! let handle = raw::obj_new();
//! let session = unsafe { Session::from_raw_borrowed(handle) }.unwrap();
//!
//! // ...and every later crossing resolves to the same wrapper.
//! let again = unsafe { Session::from_raw_borrowed(handle) }.unwrap();
//! assert_eq!(session, again);
//!
//! session.obj().set_string_data("peer", "alice");
//! assert_eq!(again.obj().string_data("peer").unwrap(), "alice");
//!
//! // Dropping the wrappers releases their shared native reference.
//! drop((session, again));
//! unsafe { raw::obj_unref(handle) };
//! ```
//!
//! # Concurrency
//!
//! The native library is single-threaded from this layer's point of view: all
//! refcounting and attachment access happens on whatever thread its callback
//! mechanism runs on. Nothing here is internally synchronized and the wrapper
//! types are deliberately neither `Send` nor `Sync`.

pub mod raw;

mod object;
pub use self::object::*;

mod wrapper;
pub use self::wrapper::*;

mod listener;
pub use self::listener::*;

mod list;
pub use self::list::*;
