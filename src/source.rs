//! The foreign callback surface the benchmarks pull data from.
//!
//! Each method is one boundary crossing. Implementations report a pending
//! foreign-side fault as `Err(BenchError::BoundaryFault)` and a missing object
//! as `Ok(None)`; the driver decides what either means for the run.
//!
//! Views handed to the visitor closures are only valid for the duration of
//! the closure. Implementations release them (without copying back) before
//! returning.

use crate::errors::Result;
use crate::view::AddressLengthSlots;

/// Callbacks bound to a provider instance.
pub trait InstanceSource {
    /// `getString(index)`, read through the narrow (modified UTF-8) rendering.
    fn with_string_narrow<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>>;

    /// `getString(index)`, read as native-width UTF-16 code units.
    fn with_string_wide<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u16]) -> R,
    ) -> Result<Option<R>>;

    /// `getUTF8String(index).getBytes()`.
    fn with_utf8_string<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>>;

    /// `getByteString(index)`.
    fn with_byte_string<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>>;
}

/// Type-level callbacks, including the ones that trade in raw addresses.
///
/// # Safety
///
/// Any positive address returned by [`byte_native_preallocated`],
/// [`byte_native_allocate`] or written by
/// [`byte_native_preallocated_with_size`] must point to at least as many
/// readable bytes as the paired length reports, and stay valid until the next
/// call on this source. The driver dereferences these addresses directly.
///
/// [`byte_native_preallocated`]: StaticSource::byte_native_preallocated
/// [`byte_native_allocate`]: StaticSource::byte_native_allocate
/// [`byte_native_preallocated_with_size`]: StaticSource::byte_native_preallocated_with_size
pub unsafe trait StaticSource {
    /// Static `getByteString(index)`.
    fn with_byte_string<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>>;

    /// `getByteNativePreallocated(index)`: address of callee-owned bytes.
    fn byte_native_preallocated(&mut self, index: i32) -> Result<i64>;

    /// `getByteLength(index)`.
    fn byte_length(&mut self, index: i32) -> Result<i32>;

    /// `getByteNativePreallocatedWithSize(index, outAddress)`.
    fn byte_native_preallocated_with_size(
        &mut self,
        index: i32,
        slots: &mut AddressLengthSlots,
    ) -> Result<()>;

    /// `getByteNativeCallerAllocated(index, bufferAddress, capacity)`.
    ///
    /// Returns the number of bytes written, or `-required` when the buffer
    /// is too small.
    fn byte_native_caller_allocated(&mut self, index: i32, buffer: &mut [u8]) -> Result<i32>;

    /// `getStaticNativeLongByReturn(index)`.
    fn native_long_by_return(&mut self, index: i32) -> Result<i64>;

    /// `getStaticNativeLongByArg(index, outAddress)`.
    fn native_long_by_arg(&mut self, index: i32, out: &mut i64) -> Result<()>;

    /// `getByteNativeAllocate(index)`: fresh allocation owned by the caller
    /// until handed back through [`free_byte_native`](StaticSource::free_byte_native).
    fn byte_native_allocate(&mut self, index: i32) -> Result<i64>;

    /// `freeByteNative(address)`.
    fn free_byte_native(&mut self, address: i64) -> Result<()>;
}
