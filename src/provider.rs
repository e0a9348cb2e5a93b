//! In-process string providers.
//!
//! These play the role of the Java `StringProvider` / `StringProviderStatic`
//! fixtures so every transfer variant can be driven without a JVM.

use std::borrow::Cow;
use std::collections::HashMap;

use rand::Rng;

use crate::errors::{BenchError, Crossing, Result};
use crate::source::{InstanceSource, StaticSource};
use crate::view::AddressLengthSlots;

/// Byte-backed string wrapper handed out by `getUTF8String`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf8String {
    bytes: Vec<u8>,
}

impl Utf8String {
    pub fn from_string(s: &str) -> Self {
        Self {
            bytes: s.as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn get_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone)]
pub struct StringProvider {
    strings: Vec<String>,
    interesting: usize,
    post_process: bool,
}

impl StringProvider {
    /// `num_strings` random lowercase strings of `string_length` characters.
    pub fn new(string_length: usize, num_strings: usize, post_process: bool) -> Self {
        let mut rng = rand::thread_rng();
        let strings = (0..num_strings)
            .map(|_| {
                (0..string_length)
                    .map(|_| rng.gen_range(b'a'..=b'z') as char)
                    .collect()
            })
            .collect();
        Self::with_strings(strings, post_process)
    }

    pub fn with_strings(strings: Vec<String>, post_process: bool) -> Self {
        let interesting = strings.iter().filter(|s| s.contains("abc")).count();
        Self {
            strings,
            interesting,
            post_process,
        }
    }

    pub fn num_strings(&self) -> usize {
        self.strings.len()
    }

    /// Strings containing `"abc"`; consumed by benchmarks alongside results.
    pub fn interesting(&self) -> usize {
        self.interesting
    }

    fn slot(&self, index: i32) -> Option<&str> {
        if self.strings.is_empty() {
            return None;
        }
        let i = (index as i64).rem_euclid(self.strings.len() as i64) as usize;
        Some(&self.strings[i])
    }

    pub fn get_string(&self, index: i32) -> Option<Cow<'_, str>> {
        let s = self.slot(index)?;
        if self.post_process {
            Some(Cow::Owned(
                s.to_uppercase().replace('Z', "z").replace('A', "a"),
            ))
        } else {
            Some(Cow::Borrowed(s))
        }
    }

    pub fn get_utf8_string(&self, index: i32) -> Option<Utf8String> {
        self.get_string(index).map(|s| Utf8String::from_string(&s))
    }

    pub fn get_byte_string(&self, index: i32) -> Option<Vec<u8>> {
        self.get_string(index).map(|s| s.into_owned().into_bytes())
    }
}

impl InstanceSource for StringProvider {
    fn with_string_narrow<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>> {
        Ok(self.get_string(index).map(|s| f(s.as_bytes())))
    }

    fn with_string_wide<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u16]) -> R,

    ) -> Result<Option<R>> {
        Ok(self.get_string(index).map(|s| {
            let units: Vec<u16> = s.encode_utf16().collect();
            f(&units)
        }))
    }

    fn with_utf8_string<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u8]) -> R,

    ) -> Result<Option<R>> {
        Ok(self.get_utf8_string(index).map(|u| f(u.get_bytes())))
    }

    fn with_byte_string<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u8]) -> R,

    ) -> Result<Option<R>> {
        Ok(self.get_byte_string(index).map(|b| f(&b)))
    }
}

/// Type-level provider with one native copy of every string allocated up
/// front, plus on-demand allocations that must be handed back.
#[derive(Debug)]
pub struct StaticStringProvider {
    provider: StringProvider,
    preallocated: Vec<Box<[u8]>>,
    outstanding: HashMap<i64, Box<[u8]>>,
    allocations: usize,
    frees: usize,
}

fn java_fault(message: impl Into<String>) -> BenchError {
    BenchError::boundary(Crossing::Call, message)
}

impl StaticStringProvider {
    pub fn new(provider: StringProvider) -> Self {
        let preallocated = (0..provider.num_strings() as i32)
            .filter_map(|i| provider.get_byte_string(i))
            .map(Vec::into_boxed_slice)
            .collect();
        Self {
            provider,
            preallocated,
            outstanding: HashMap::new(),
            allocations: 0,
            frees: 0,
        }
    }

    pub fn provider(&self) -> &StringProvider {
        &self.provider
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    pub fn free_count(&self) -> usize {
        self.frees
    }

    /// Allocations handed out and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn byte_string(&self, index: i32) -> Result<Vec<u8>> {
        self.provider
            .get_byte_string(index)
            .ok_or_else(|| java_fault("java.lang.NullPointerException"))
    }

    /// `index * index + 1` in 32-bit arithmetic, widened afterwards.
    pub fn long_for_index(index: i32) -> i64 {
        i64::from(index.wrapping_mul(index).wrapping_add(1))
    }
}

// SAFETY: preallocated copies live as long as the provider; allocations stay
// in `outstanding` until freed. Neither is mutated after creation.
unsafe impl StaticSource for StaticStringProvider {
    fn with_byte_string<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>> {
        Ok(self.provider.get_byte_string(index).map(|b| f(&b)))
    }

    fn byte_native_preallocated(&mut self, index: i32) -> Result<i64> {
        if self.preallocated.is_empty() {
            return Err(java_fault("java.lang.IllegalStateException: Unallocated preallocated"));
        }
        let i = (index as i64).rem_euclid(self.preallocated.len() as i64) as usize;
        Ok(self.preallocated[i].as_ptr() as usize as i64)
    }

    fn byte_length(&mut self, index: i32) -> Result<i32> {
        Ok(self.byte_string(index)?.len() as i32)
    }

    fn byte_native_preallocated_with_size(
        &mut self,
        index: i32,
        slots: &mut AddressLengthSlots,
    ) -> Result<()> {
        let address = self.byte_native_preallocated(index)?;
        let length = self.byte_length(index)?;
        slots.address = address;
        slots.length = i64::from(length);
        Ok(())
    }

    fn byte_native_caller_allocated(&mut self, index: i32, buffer: &mut [u8]) -> Result<i32> {
        let actual = self.byte_string(index)?;
        let len = actual.len();
        if len > buffer.len() {
            return Ok(-(len as i32));
        }
        buffer[..len].copy_from_slice(&actual);
        Ok(len as i32)
    }

    fn native_long_by_return(&mut self, index: i32) -> Result<i64> {
        Ok(Self::long_for_index(index))
    }

    fn native_long_by_arg(&mut self, index: i32, out: &mut i64) -> Result<()> {
        *out = Self::long_for_index(index);
        Ok(())
    }

    /// A zero-length string allocates nothing and yields address 0, as a
    /// zero-byte `allocateMemory` does.
    fn byte_native_allocate(&mut self, index: i32) -> Result<i64> {
        let copy = self.byte_string(index)?.into_boxed_slice();
        if copy.is_empty() {
            return Ok(0);
        }
        let address = copy.as_ptr() as usize as i64;
        self.outstanding.insert(address, copy);
        self.allocations += 1;
        Ok(address)
    }

    fn free_byte_native(&mut self, address: i64) -> Result<()> {
        match self.outstanding.remove(&address) {
            Some(_) => {
                self.frees += 1;
                Ok(())
            }
            None => Err(java_fault(format!("free of unknown address {:#x}", address))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_strings_are_lowercase() {
        let provider = StringProvider::new(32, 16, false);
        assert_eq!(provider.num_strings(), 16);
        for i in 0..16 {
            let s = provider.get_string(i).unwrap();
            assert_eq!(s.len(), 32);
            assert!(s.bytes().all(|b| b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_index_wraps_and_empty_is_absent() {
        let provider = StringProvider::with_strings(vec!["one".into(), "two".into()], false);
        assert_eq!(provider.get_string(3).unwrap(), "two");
        let empty = StringProvider::with_strings(Vec::new(), false);
        assert!(empty.get_string(0).is_none());
        assert!(empty.get_byte_string(0).is_none());
    }

    #[test]
    fn test_post_process_keeps_a_and_z_lowercase() {
        let provider = StringProvider::with_strings(vec!["azbycx".into()], true);
        assert_eq!(provider.get_string(0).unwrap(), "azBYCX");
    }

    #[test]
    fn test_interesting_counts_abc() {
        let provider = StringProvider::with_strings(
            vec!["xabcx".into(), "abd".into(), "abc".into()],
            false,
        );
        assert_eq!(provider.interesting(), 2);
    }

    #[test]
    fn test_caller_allocated_reports_required_capacity() {
        let mut stat = StaticStringProvider::new(StringProvider::with_strings(
            vec!["0123456789".into()],
            false,
        ));
        let mut small = [0u8; 4];
        assert_eq!(stat.byte_native_caller_allocated(0, &mut small).unwrap(), -10);
        let mut big = [0u8; 16];
        assert_eq!(stat.byte_native_caller_allocated(0, &mut big).unwrap(), 10);
        assert_eq!(&big[..10], b"0123456789");
    }

    #[test]
    fn test_allocate_and_free_are_paired() {
        let mut stat = StaticStringProvider::new(StringProvider::with_strings(
            vec!["abc".into()],
            false,
        ));
        let address = stat.byte_native_allocate(0).unwrap();
        assert!(address > 0);
        assert_eq!(stat.outstanding(), 1);
        stat.free_byte_native(address).unwrap();
        assert_eq!(stat.outstanding(), 0);
        assert!(stat.free_byte_native(address).is_err());
        assert_eq!((stat.allocation_count(), stat.free_count()), (1, 1));
    }

    #[test]
    fn test_empty_allocation_yields_null_address() {
        let mut stat = StaticStringProvider::new(StringProvider::with_strings(
            vec![String::new(), "abc".into()],
            false,
        ));
        assert_eq!(stat.byte_native_allocate(0).unwrap(), 0);
        assert_eq!(stat.byte_native_allocate(2).unwrap(), 0);
        assert_eq!(stat.allocation_count(), 0);
        assert_eq!(stat.outstanding(), 0);

        let a = stat.byte_native_allocate(1).unwrap();
        let b = stat.byte_native_allocate(1).unwrap();
        assert_ne!(a, b);
        assert_eq!(stat.outstanding(), 2);
    }

    #[test]
    fn test_long_for_index_uses_int_arithmetic() {
        assert_eq!(StaticStringProvider::long_for_index(3), 10);
        assert_eq!(
            StaticStringProvider::long_for_index(65536),
            i64::from(65536i32.wrapping_mul(65536).wrapping_add(1))
        );
    }
}
