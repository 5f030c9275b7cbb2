//! Scoped ownership of handles that live outside of Rust.
//!
//! Extension records frequently carry handles owned by the operating system
//! or a driver, such as file descriptors for imported memory. An
//! [`ExternalHandle`] ties such a handle to a Rust scope and optionally closes
//! it when the guard is dropped. How a handle is closed is platform specific
//! and is supplied through a [`HandleCloser`].

use core::mem::ManuallyDrop;

/// Defines how a kind of external handle is closed.
///
/// # Examples
///
/// ```
/// use structchain::handle::{ExternalHandle, HandleCloser};
///
/// struct Fd;
///
/// impl HandleCloser for Fd {
///     type Handle = i32;
///
///     fn close(fd: i32) {
///         // `libc::close(fd)` on a real system.
///         let _ = fd;
///     }
/// }
///
/// let guard = ExternalHandle::<Fd>::acquire(3, true);
/// assert_eq!(guard.get(), 3);
/// ```
pub trait HandleCloser: 'static {
    /// The raw handle type.
    type Handle: Copy + core::fmt::Debug;

    /// Releases `handle`.
    fn close(handle: Self::Handle);
}

/// Owns an external handle for the lifetime of the guard.
///
/// If the guard was acquired with `close_on_drop` set, the handle is closed
/// exactly once when the guard is dropped. Otherwise the guard only carries
/// the handle and the caller remains responsible for it.
pub struct ExternalHandle<C: HandleCloser> {
    handle: C::Handle,
    close_on_drop: bool,
}

impl<C: HandleCloser> ExternalHandle<C> {
    /// Wraps `handle`, closing it on drop if `close_on_drop` is set.
    #[must_use]
    pub fn acquire(handle: C::Handle, close_on_drop: bool) -> Self {
        Self {
            handle,
            close_on_drop,
        }
    }

    /// The wrapped handle.
    pub fn get(&self) -> C::Handle {
        self.handle
    }

    /// Whether the handle will be closed when the guard is dropped.
    pub fn closes_on_drop(&self) -> bool {
        self.close_on_drop
    }

    /// Gives up ownership of the handle without closing it.
    #[must_use]
    pub fn into_raw(self) -> C::Handle {
        let this = ManuallyDrop::new(self);
        this.handle
    }
}

impl<C: HandleCloser> Drop for ExternalHandle<C> {
    fn drop(&mut self) {
        if self.close_on_drop {
            tracing::trace!(handle = ?self.handle, "closing external handle");
            C::close(self.handle);
        }
    }
}

impl<C: HandleCloser> core::fmt::Debug for ExternalHandle<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExternalHandle")
            .field("handle", &self.handle)
            .field("close_on_drop", &self.close_on_drop)
            .finish()
    }
}
