//! Marker trait for values that may sit in a cross-domain slot.

/// Marker trait for types that can be placed in a cross-domain queue slot.
///
/// A slot is written by the producing domain and later copied out by the
/// consuming domain without either side running a destructor on it.
///
/// # Safety
/// Implementors must be plain `Copy` data with no interior references into
/// memory owned by a single domain.
pub unsafe trait Serial: Copy {}

unsafe impl Serial for u8 {}
unsafe impl Serial for u16 {}
unsafe impl Serial for u32 {}
unsafe impl Serial for u64 {}
unsafe impl Serial for usize {}
unsafe impl Serial for i32 {}
unsafe impl Serial for i64 {}
unsafe impl Serial for bool {}
unsafe impl<T: Copy> Serial for Option<T> {}
unsafe impl<T: Copy, const N: usize> Serial for [T; N] {}
unsafe impl<A: Copy, B: Copy> Serial for (A, B) {}
