//! Borrowed views over memory handed across the boundary, and the
//! caller-owned scratch areas the callee writes into.

use crate::errors::{BenchError, Result};

/// Check an address/length pair reported by the callee.
///
/// Lengths at or above `i32::MAX` are rejected so the value always fits a
/// Java array size.
pub fn validate_region(index: i32, address: i64, length: i64) -> Result<usize> {
    if address <= 0 || length <= 0 || length >= i64::from(i32::MAX) {
        return Err(BenchError::InvalidAddressOrLength {
            index,
            address,
            length,
        });
    }
    Ok(length as usize)
}

/// Read-only view over callee-owned native memory.
///
/// The view is only valid for the iteration that produced it; the driver
/// drops it before issuing the next callback or any free call.
#[derive(Debug, Clone, Copy)]
pub struct NativeView<'a> {
    bytes: &'a [u8],
}

impl<'a> NativeView<'a> {
    /// Interpret a raw address and length as a byte view.
    ///
    /// # Safety
    ///
    /// After validation succeeds, `address` must point to at least `length`
    /// readable bytes that stay alive and unmodified for `'a`.
    pub unsafe fn from_raw(index: i32, address: i64, length: i64) -> Result<Self> {
        let len = validate_region(index, address, length)?;
        let bytes = std::slice::from_raw_parts(address as usize as *const u8, len);
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Two-slot scratch area the callee fills with an address and a length.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddressLengthSlots {
    pub address: i64,
    pub length: i64,
}

impl AddressLengthSlots {
    pub fn clear(&mut self) {
        self.address = 0;
        self.length = 0;
    }

    /// Address passed to the callee; slot 0 at +0, slot 1 at +8.
    pub fn out_address(&mut self) -> i64 {
        self as *mut Self as usize as i64
    }
}

/// Outcome of one caller-allocated copy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Written(usize),
    NeedsCapacity(i64),
}

impl CopyOutcome {
    /// Decode the callee's return value: bytes written, or `-required`.
    pub fn from_raw(index: i32, copied: i32, capacity: usize) -> Result<Self> {
        if copied < 0 {
            return Ok(CopyOutcome::NeedsCapacity(-i64::from(copied)));
        }
        let written = copied as usize;
        if written == 0 || written > capacity {
            return Err(BenchError::InvalidAddressOrLength {
                index,
                address: 0,
                length: i64::from(copied),
            });
        }
        Ok(CopyOutcome::Written(written))
    }
}

/// Caller-owned buffer that survives a whole run and only grows on request.
#[derive(Debug)]
pub struct GrowableBuffer {
    storage: Vec<u8>,
    max_capacity: usize,
    growths: usize,
}

impl GrowableBuffer {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        Self {
            storage: vec![0u8; initial_capacity],
            max_capacity,
            growths: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of times the buffer has been reallocated.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// The first `len` bytes, as filled in by the callee.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.storage[..len.min(self.storage.len())]
    }

    /// Grow to twice the required capacity.
    ///
    /// Fails when the target is zero, overflows, exceeds the configured
    /// maximum, or would not enlarge the buffer (a callee that keeps asking
    /// for less than we already offer would otherwise loop forever).
    pub fn grow_for(&mut self, index: i32, required: i64) -> Result<usize> {
        let exhausted = || BenchError::GrowthExhausted { index, required };
        let target = required
            .checked_mul(2)
            .filter(|t| *t > 0)
            .and_then(|t| usize::try_from(t).ok())
            .ok_or_else(exhausted)?;
        if target > self.max_capacity || target <= self.storage.len() {
            return Err(exhausted());
        }
        self.storage.resize(target, 0);
        self.growths += 1;
        Ok(target)
    }
}
