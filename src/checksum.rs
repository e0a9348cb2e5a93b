//! Accumulators that keep the optimizer from discarding transferred data.

/// XOR-fold a byte slice, treating the result as a signed byte.
#[inline]
pub fn xor_fold_bytes(bytes: &[u8]) -> i8 {
    bytes.iter().fold(0u8, |scan, &b| scan ^ b) as i8
}

/// XOR-fold UTF-16 code units.
#[inline]
pub fn xor_fold_units(units: &[u16]) -> u16 {
    units.iter().fold(0u16, |scan, &u| scan ^ u)
}

/// Running length and checksum totals for one benchmark run.
///
/// Both totals start at 1 so an empty run yields `1 & 1 = 1`. All arithmetic
/// wraps, matching the behaviour of the native `long` accumulators the Java
/// baselines were recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAccumulator {
    accum: i64,
    scans: i64,
}

impl Default for TransferAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferAccumulator {
    pub const SEED: i64 = 1;

    pub fn new() -> Self {
        Self {
            accum: Self::SEED,
            scans: Self::SEED,
        }
    }

    /// Fold one iteration's bytes.
    #[inline]
    pub fn record_bytes(&mut self, bytes: &[u8]) {
        let scan = xor_fold_bytes(bytes);
        self.accum = self.accum.wrapping_add(bytes.len() as i64);
        self.scans = self.scans.wrapping_add(i64::from(scan));
    }

    /// Fold one iteration's UTF-16 code units.
    #[inline]
    pub fn record_units(&mut self, units: &[u16]) {
        let scan = xor_fold_units(units);
        self.accum = self.accum.wrapping_add(units.len() as i64);
        self.scans = self.scans.wrapping_add(i64::from(scan));
    }

    /// Count a length without touching the checksum.
    #[inline]
    pub fn record_length(&mut self, len: usize) {
        self.accum = self.accum.wrapping_add(len as i64);
    }

    pub fn accum(&self) -> i64 {
        self.accum
    }

    pub fn scans(&self) -> i64 {
        self.scans
    }

    /// Combined result for checksummed variants.
    pub fn finish(&self) -> i64 {
        self.accum & self.scans
    }

    /// Result for the length-only variant.
    pub fn finish_length_only(&self) -> i64 {
        self.accum
    }
}

/// Accumulator for the variants that transfer a bare 64-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongAccumulator {
    accum: i64,
}

impl Default for LongAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl LongAccumulator {
    pub fn new() -> Self {
        Self {
            accum: TransferAccumulator::SEED,
        }
    }

    #[inline]
    pub fn record(&mut self, value: i64) {
        self.accum ^= value.wrapping_shl(1);
    }

    pub fn finish(&self) -> i64 {
        self.accum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_run_is_seed() {
        let acc = TransferAccumulator::new();
        assert_eq!(acc.finish(), 1);
        assert_eq!(acc.finish_length_only(), 1);
        assert_eq!(LongAccumulator::new().finish(), 1);
    }

    #[test]
    fn test_xor_fold_is_signed_byte() {
        assert_eq!(xor_fold_bytes(b""), 0);
        assert_eq!(xor_fold_bytes(b"a"), 0x61);
        assert_eq!(xor_fold_bytes(b"ab"), 0x61 ^ 0x62);
        assert_eq!(xor_fold_bytes(&[0x80]), -128);
        assert_eq!(xor_fold_bytes(&[0xff, 0x01]), -2);
    }

    #[test]
    fn test_negative_scan_is_sign_extended() {
        let mut acc = TransferAccumulator::new();
        acc.record_bytes(&[0xff]);
        assert_eq!(acc.accum(), 2);
        assert_eq!(acc.scans(), 0);
        assert_eq!(acc.finish(), 0);
    }

    #[test]
    fn test_record_bytes_matches_formula() {
        let items: [&[u8]; 3] = [b"hello", b"world", b"jni"];
        let mut acc = TransferAccumulator::new();
        let mut accum = 1i64;
        let mut scans = 1i64;
        for item in items {
            acc.record_bytes(item);
            accum += item.len() as i64;
            scans += item.iter().fold(0u8, |s, b| s ^ b) as i8 as i64;
        }
        assert_eq!(acc.finish(), accum & scans);
    }

    #[test]
    fn test_units_are_unsigned() {
        let mut acc = TransferAccumulator::new();
        acc.record_units(&[0xffff]);
        assert_eq!(acc.scans(), 1 + 0xffff);
        assert_eq!(acc.accum(), 2);
    }

    #[test]
    fn test_long_accumulator_shifts_and_xors() {
        let mut acc = LongAccumulator::new();
        acc.record(1);
        assert_eq!(acc.finish(), 1 ^ 2);
        acc.record(2);
        assert_eq!(acc.finish(), 1 ^ 2 ^ 4);
        let mut acc = LongAccumulator::new();
        acc.record(i64::MIN);
        assert_eq!(acc.finish(), 1);
    }
}
