//! Transfer benchmark entry points.
//!
//! Every function runs `iterations` callbacks strictly in sequence, folds
//! what comes back into an accumulator, and aborts on the first fault. A
//! non-positive iteration count runs nothing and returns the seed result.

use std::fmt;

use crate::checksum::{LongAccumulator, TransferAccumulator};
use crate::config::BenchConfig;
use crate::errors::{BenchError, Result};
use crate::source::{InstanceSource, StaticSource};
use crate::view::{AddressLengthSlots, CopyOutcome, GrowableBuffer, NativeView};

fn absent(callback: &'static str, index: i32) -> impl FnOnce() -> BenchError {
    move || BenchError::AbsentValue { callback, index }
}

fn invalid_address(index: i32, address: i64) -> BenchError {
    BenchError::InvalidAddressOrLength {
        index,
        address,
        length: 0,
    }
}

/// Length of each string's narrow copy; no checksum.
///
/// The narrow rendering is the JVM's modified UTF-8, so the count is the
/// byte length of that encoding rather than the number of characters.
pub fn string_narrow<S: InstanceSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        let len = source
            .with_string_narrow(i, |chars| chars.len())?
            .ok_or_else(absent("getString", i))?;
        acc.record_length(len);
    }
    Ok(acc.finish_length_only())
}

pub fn string_wide<S: InstanceSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        source
            .with_string_wide(i, |units| acc.record_units(units))?
            .ok_or_else(absent("getString", i))?;
    }
    Ok(acc.finish())
}

pub fn utf8_string<S: InstanceSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        source
            .with_utf8_string(i, |bytes| acc.record_bytes(bytes))?
            .ok_or_else(absent("getUTF8String", i))?;
    }
    Ok(acc.finish())
}

pub fn byte_string<S: InstanceSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        source
            .with_byte_string(i, |bytes| acc.record_bytes(bytes))?
            .ok_or_else(absent("getByteString", i))?;
    }
    Ok(acc.finish())
}

pub fn static_byte_string<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        source
            .with_byte_string(i, |bytes| acc.record_bytes(bytes))?
            .ok_or_else(absent("getByteString", i))?;
    }
    Ok(acc.finish())
}

/// Callee-owned bytes located by a returned address and a separate length
/// call. Nothing is released.
pub fn preallocated_by_return<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        let address = source.byte_native_preallocated(i)?;
        if address <= 0 {
            return Err(invalid_address(i, address));
        }
        let length = source.byte_length(i)?;
        // SAFETY: StaticSource guarantees positive addresses are readable for
        // the reported length until the next call.
        let view = unsafe { NativeView::from_raw(i, address, i64::from(length))? };
        acc.record_bytes(view.as_bytes());
    }
    Ok(acc.finish())
}

/// Same data as [`preallocated_by_return`], with address and length written
/// into a caller-provided pair of slots.
pub fn preallocated_by_out_param<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    let mut slots = AddressLengthSlots::default();
    for i in 0..iterations {
        slots.clear();
        source.byte_native_preallocated_with_size(i, &mut slots)?;
        // SAFETY: see preallocated_by_return.
        let view = unsafe { NativeView::from_raw(i, slots.address, slots.length)? };
        acc.record_bytes(view.as_bytes());
    }
    Ok(acc.finish())
}

/// The callee copies into `buffer`. A request for more capacity grows the
/// buffer and retries the same index without consuming the budget.
pub fn caller_allocated<S: StaticSource>(
    source: &mut S,
    iterations: i32,
    buffer: &mut GrowableBuffer,
) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        let written = loop {
            let capacity = buffer.capacity();
            let copied = source.byte_native_caller_allocated(i, buffer.as_mut_slice())?;
            match CopyOutcome::from_raw(i, copied, capacity)? {
                CopyOutcome::Written(len) => break len,
                CopyOutcome::NeedsCapacity(required) => {
                    buffer.grow_for(i, required)?;
                }
            }
        };
        acc.record_bytes(buffer.filled(written));
    }
    Ok(acc.finish())
}

pub fn long_by_return<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = LongAccumulator::new();
    for i in 0..iterations {
        acc.record(source.native_long_by_return(i)?);
    }
    Ok(acc.finish())
}

pub fn long_by_out_param<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = LongAccumulator::new();
    let mut value = 0i64;
    for i in 0..iterations {
        source.native_long_by_arg(i, &mut value)?;
        acc.record(value);
    }
    Ok(acc.finish())
}

/// Fresh callee allocation per iteration, handed back with an explicit free.
///
/// Once a positive address is confirmed the buffer is freed even if the
/// length turns out to be invalid. After a boundary fault no further call is
/// made, so that buffer is leaked.
pub fn allocate_then_free<S: StaticSource>(source: &mut S, iterations: i32) -> Result<i64> {
    let mut acc = TransferAccumulator::new();
    for i in 0..iterations {
        let address = source.byte_native_allocate(i)?;
        if address <= 0 {
            return Err(invalid_address(i, address));
        }
        let length = source.byte_length(i)?;
        // SAFETY: the allocation stays live until free_byte_native below,
        // and the view does not outlive this block.
        let scanned = unsafe { NativeView::from_raw(i, address, i64::from(length)) }
            .map(|view| acc.record_bytes(view.as_bytes()));
        source.free_byte_native(address)?;
        scanned?;
    }
    Ok(acc.finish())
}

/// Variants driven by a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceVariant {
    StringNarrow,
    StringWide,
    Utf8String,
    ByteString,
}

impl InstanceVariant {
    pub const ALL: [InstanceVariant; 4] = [
        InstanceVariant::StringNarrow,
        InstanceVariant::StringWide,
        InstanceVariant::Utf8String,
        InstanceVariant::ByteString,
    ];

    pub fn run<S: InstanceSource>(self, source: &mut S, iterations: i32) -> Result<i64> {
        match self {
            InstanceVariant::StringNarrow => string_narrow(source, iterations),
            InstanceVariant::StringWide => string_wide(source, iterations),
            InstanceVariant::Utf8String => utf8_string(source, iterations),
            InstanceVariant::ByteString => byte_string(source, iterations),
        }
    }
}

/// Variants driven by type-level callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticVariant {
    ByteString,
    PreallocatedByReturn,
    PreallocatedByOutParam,
    CallerAllocated,
    LongByReturn,
    LongByOutParam,
    AllocateThenFree,
}

impl StaticVariant {
    pub const ALL: [StaticVariant; 7] = [
        StaticVariant::ByteString,
        StaticVariant::PreallocatedByReturn,
        StaticVariant::PreallocatedByOutParam,
        StaticVariant::CallerAllocated,
        StaticVariant::LongByReturn,
        StaticVariant::LongByOutParam,
        StaticVariant::AllocateThenFree,
    ];

    /// Byte-buffer variants, whose results are comparable with each other.
    pub const BUFFERED: [StaticVariant; 5] = [
        StaticVariant::ByteString,
        StaticVariant::PreallocatedByReturn,
        StaticVariant::PreallocatedByOutParam,
        StaticVariant::CallerAllocated,
        StaticVariant::AllocateThenFree,
    ];

    /// Only [`StaticVariant::CallerAllocated`] allocates a buffer, sized
    /// from `config`.
    pub fn run<S: StaticSource>(
        self,
        source: &mut S,
        iterations: i32,
        config: &BenchConfig,
    ) -> Result<i64> {
        match self {
            StaticVariant::ByteString => static_byte_string(source, iterations),
            StaticVariant::PreallocatedByReturn => preallocated_by_return(source, iterations),
            StaticVariant::PreallocatedByOutParam => preallocated_by_out_param(source, iterations),
            StaticVariant::CallerAllocated => {
                caller_allocated(source, iterations, &mut config.caller_buffer())
            }
            StaticVariant::LongByReturn => long_by_return(source, iterations),
            StaticVariant::LongByOutParam => long_by_out_param(source, iterations),
            StaticVariant::AllocateThenFree => allocate_then_free(source, iterations),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferVariant {
    Instance(InstanceVariant),
    Static(StaticVariant),
}

impl TransferVariant {
    pub fn name(&self) -> &'static str {
        match self {
            TransferVariant::Instance(v) => match v {
                InstanceVariant::StringNarrow => "string_narrow",
                InstanceVariant::StringWide => "string_wide",
                InstanceVariant::Utf8String => "utf8_string",
                InstanceVariant::ByteString => "byte_string",
            },
            TransferVariant::Static(v) => match v {
                StaticVariant::ByteString => "static_byte_string",
                StaticVariant::PreallocatedByReturn => "preallocated_by_return",
                StaticVariant::PreallocatedByOutParam => "preallocated_by_out_param",
                StaticVariant::CallerAllocated => "caller_allocated",
                StaticVariant::LongByReturn => "long_by_return",
                StaticVariant::LongByOutParam => "long_by_out_param",
                StaticVariant::AllocateThenFree => "allocate_then_free",
            },
        }
    }
}

impl fmt::Display for TransferVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<InstanceVariant> for TransferVariant {
    fn from(v: InstanceVariant) -> Self {
        TransferVariant::Instance(v)
    }
}

impl From<StaticVariant> for TransferVariant {
    fn from(v: StaticVariant) -> Self {
        TransferVariant::Static(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{StaticStringProvider, StringProvider};

    fn fixed_provider() -> StringProvider {
        StringProvider::with_strings(vec!["abc".into(), "hello".into(), "zz".into()], false)
    }

    #[test]
    fn test_zero_iterations_return_seed() {
        let mut provider = fixed_provider();
        for variant in InstanceVariant::ALL {
            assert_eq!(variant.run(&mut provider, 0).unwrap(), 1);
            assert_eq!(variant.run(&mut provider, -5).unwrap(), 1);
        }
        let mut stat = StaticStringProvider::new(fixed_provider());
        let config = BenchConfig::default();
        for variant in StaticVariant::ALL {
            assert_eq!(variant.run(&mut stat, 0, &config).unwrap(), 1);
        }
    }

    #[test]
    fn test_only_caller_allocated_builds_a_buffer() {
        // vec![0u8; usize::MAX] panics, so any eager buffer would fail here.
        let config = BenchConfig {
            initial_caller_capacity: usize::MAX,
            max_caller_capacity: usize::MAX,
            ..BenchConfig::default()
        };
        let mut stat = StaticStringProvider::new(fixed_provider());
        for variant in StaticVariant::ALL {
            if variant == StaticVariant::CallerAllocated {
                continue;
            }
            assert!(variant.run(&mut stat, 3, &config).is_ok(), "{:?}", variant);
        }
    }

    #[test]
    fn test_caller_allocated_sizes_buffer_from_config() {
        let config = BenchConfig {
            initial_caller_capacity: 2,
            max_caller_capacity: 64,
            ..BenchConfig::default()
        };
        let mut stat = StaticStringProvider::new(fixed_provider());
        let mut provider = fixed_provider();
        assert_eq!(
            StaticVariant::CallerAllocated.run(&mut stat, 7, &config).unwrap(),
            byte_string(&mut provider, 7).unwrap()
        );

        let tight = BenchConfig {
            initial_caller_capacity: 2,
            max_caller_capacity: 4,
            ..BenchConfig::default()
        };
        assert!(matches!(
            StaticVariant::CallerAllocated.run(&mut stat, 1, &tight),
            Err(BenchError::GrowthExhausted { index: 0, required: 3 })
        ));
    }

    #[test]
    fn test_string_narrow_counts_lengths_only() {
        let mut provider = fixed_provider();
        // 1 + 3 + 5 + 2 + 3
        assert_eq!(string_narrow(&mut provider, 4).unwrap(), 14);
    }

    #[test]
    fn test_byte_string_formula() {
        let mut provider = fixed_provider();
        let strings = ["abc", "hello", "zz", "abc"];
        let mut accum = 1i64;
        let mut scans = 1i64;
        for s in strings {
            accum += s.len() as i64;
            scans += s.bytes().fold(0u8, |a, b| a ^ b) as i8 as i64;
        }
        assert_eq!(byte_string(&mut provider, 4).unwrap(), accum & scans);
    }

    #[test]
    fn test_long_variants_agree() {
        let mut stat = StaticStringProvider::new(fixed_provider());
        let mut expected = 1i64;
        for i in 0..10i64 {
            expected ^= (i * i + 1) << 1;
        }
        assert_eq!(long_by_return(&mut stat, 10).unwrap(), expected);
        assert_eq!(long_by_out_param(&mut stat, 10).unwrap(), expected);
    }

    #[test]
    fn test_variant_names_are_unique() {
        let mut names: Vec<&str> = InstanceVariant::ALL
            .iter()
            .map(|v| TransferVariant::from(*v).name())
            .chain(StaticVariant::ALL.iter().map(|v| TransferVariant::from(*v).name()))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
