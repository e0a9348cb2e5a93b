use std::fmt;

use thiserror::Error;

/// Reserved result returned to Java when a run aborts.
///
/// The bit pattern is `0xf00dBeefDeadBeef` read as a signed 64-bit value. It
/// cannot be produced by the accumulators for any realistic run length.
pub const ERROR_CODE: i64 = 0xf00d_beef_dead_beef_u64 as i64;

/// Boundary crossing that failed, used for fault context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    FindClass,
    MethodLookup,
    Call,
    ArrayAccess,
    StringAccess,
}

impl fmt::Display for Crossing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Crossing::FindClass => "find_class",
            Crossing::MethodLookup => "method_lookup",
            Crossing::Call => "call",
            Crossing::ArrayAccess => "array_access",
            Crossing::StringAccess => "string_access",
        };
        f.write_str(name)
    }
}

/// Everything that can abort a transfer run.
///
/// All variants are reported to Java as [`ERROR_CODE`]; the distinction only
/// survives inside the crate for logging and tests.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("boundary fault during {crossing}: {message}")]
    BoundaryFault { crossing: Crossing, message: String },

    #[error("absent value returned by {callback} for index {index}")]
    AbsentValue { callback: &'static str, index: i32 },

    #[error("invalid address or length at index {index}: address={address}, length={length}")]
    InvalidAddressOrLength { index: i32, address: i64, length: i64 },

    #[error("caller buffer growth exhausted at index {index}: required={required}")]
    GrowthExhausted { index: i32, required: i64 },
}

impl BenchError {
    pub fn boundary(crossing: Crossing, message: impl Into<String>) -> Self {
        BenchError::BoundaryFault {
            crossing,
            message: message.into(),
        }
    }

    /// Stable code used in structured log entries.
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::BoundaryFault { .. } => "BOUNDARY_FAULT",
            BenchError::AbsentValue { .. } => "ABSENT_VALUE",
            BenchError::InvalidAddressOrLength { .. } => "INVALID_ADDRESS_OR_LENGTH",
            BenchError::GrowthExhausted { .. } => "GROWTH_EXHAUSTED",
        }
    }
}

impl From<jni::errors::Error> for BenchError {
    fn from(e: jni::errors::Error) -> Self {
        BenchError::boundary(Crossing::Call, e.to_string())
    }
}

/// Result type alias using BenchError
pub type Result<T> = std::result::Result<T, BenchError>;

/// Erase the fault taxonomy into the value handed back across the boundary.
pub fn collapse(result: Result<i64>) -> i64 {
    result.unwrap_or(ERROR_CODE)
}

/// Errors raised while loading or validating [`crate::config::BenchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_bit_pattern() {
        assert_eq!(ERROR_CODE as u64, 0xf00dbeefdeadbeef);
        assert!(ERROR_CODE < 0);
    }

    #[test]
    fn test_collapse_erases_every_variant() {
        let faults = vec![
            BenchError::boundary(Crossing::Call, "java.lang.IllegalStateException"),
            BenchError::AbsentValue { callback: "getString", index: 3 },
            BenchError::InvalidAddressOrLength { index: 0, address: 0, length: 10 },
            BenchError::GrowthExhausted { index: 1, required: 0 },
        ];
        for fault in faults {
            assert_eq!(collapse(Err(fault)), ERROR_CODE);
        }
        assert_eq!(collapse(Ok(42)), 42);
    }

    #[test]
    fn test_error_display_and_codes() {
        let err = BenchError::AbsentValue { callback: "getByteString", index: 7 };
        assert_eq!(err.error_code(), "ABSENT_VALUE");
        assert_eq!(
            format!("{}", err),
            "absent value returned by getByteString for index 7"
        );

        let err = BenchError::boundary(Crossing::MethodLookup, "NoSuchMethodError");
        assert_eq!(err.error_code(), "BOUNDARY_FAULT");
        assert!(format!("{}", err).starts_with("boundary fault during method_lookup"));
    }

    #[test]
    fn test_from_jni_error() {
        let err = BenchError::from(jni::errors::Error::JavaException);
        match err {
            BenchError::BoundaryFault { crossing, .. } => assert_eq!(crossing, Crossing::Call),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
