use bytemuck::TransparentWrapper;

use crate::{Obj, raw};

// === Wrapped === //

/// A typed facade over [`Obj`].
///
/// Implemented by the `#[repr(transparent)]` newtypes the [`wrapper!`] macro
/// mints, one per native type a binding exposes. All identity and ownership
/// semantics are inherited from `Obj`: two typed wrappers minted from the same
/// native pointer share one wrapper and compare equal.
///
/// [`wrapper!`]: crate::wrapper!
pub trait Wrapped: Sized + TransparentWrapper<Obj> {
    fn from_obj(obj: Obj) -> Self {
        TransparentWrapper::wrap(obj)
    }

    fn into_obj(self) -> Obj {
        TransparentWrapper::peel(self)
    }

    fn obj(&self) -> &Obj {
        TransparentWrapper::peel_ref(self)
    }

    /// Typed variant of [`Obj::from_raw_borrowed`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live native object of the type this
    /// wrapper stands for.
    unsafe fn from_raw_borrowed(ptr: *mut raw::RawObject) -> Option<Self> {
        unsafe { Obj::from_raw_borrowed(ptr) }.map(Self::from_obj)
    }

    /// Typed variant of [`Obj::from_raw_owned`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live native object of the type this
    /// wrapper stands for, and the caller must own the transferred reference.
    unsafe fn from_raw_owned(ptr: *mut raw::RawObject) -> Option<Self> {
        unsafe { Obj::from_raw_owned(ptr) }.map(Self::from_obj)
    }

    /// Alias to [`Obj::as_raw`].
    fn as_raw(&self) -> *mut raw::RawObject {
        self.obj().as_raw()
    }
}

// Lets untyped code use the `Wrapped` surface directly. Wrapping `Obj` in
// itself is the identity, which is exactly what `TransparentWrapper` promises.
unsafe impl TransparentWrapper<Obj> for Obj {}

impl Wrapped for Obj {}

// === Macros === //

#[doc(hidden)]
pub mod wrapper_internals {
    pub use {
        crate::{Obj, Wrapped},
        bytemuck::TransparentWrapper,
        std::{
            clone::Clone,
            cmp::{Eq, PartialEq},
            fmt,
            hash::Hash,
            stringify,
        },
    };
}

/// Mints `#[repr(transparent)]` wrapper newtypes over [`Obj`], implementing
/// [`Wrapped`] for each.
///
/// ```
/// use tether::{Obj, Wrapped as _, wrapper};
///
/// wrapper!(pub Call, pub Conference);
///
/// let call = Call::from_obj(Obj::new());
/// let same = unsafe { Call::from_raw_borrowed(call.as_raw()) }.unwrap();
/// assert_eq!(call, same);
/// ```
#[macro_export]
macro_rules! wrapper {
    ( $( $vis:vis $ty:ident ),*$(,)? ) => {$(
        #[derive(
            $crate::wrapper_internals::Clone,
            $crate::wrapper_internals::Hash,
            $crate::wrapper_internals::Eq,
            $crate::wrapper_internals::PartialEq,
        )]
        #[repr(transparent)]
        $vis struct $ty($crate::wrapper_internals::Obj);

        unsafe impl
            $crate::wrapper_internals::TransparentWrapper<$crate::wrapper_internals::Obj>
            for $ty
        {
        }

        impl $crate::wrapper_internals::fmt::Debug for $ty {
            fn fmt(
                &self,
                f: &mut $crate::wrapper_internals::fmt::Formatter<'_>,
            ) -> $crate::wrapper_internals::fmt::Result {
                f.debug_tuple($crate::wrapper_internals::stringify!($ty))
                    .field(&self.0)
                    .finish()
            }
        }

        impl $crate::wrapper_internals::Wrapped for $ty {}
    )*};
}
