use std::marker::PhantomData;
use std::ptr;

use jni::objects::JString;
use jni::sys::{jchar, jstring};
use jni::JNIEnv;

use crate::errors::{BenchError, Crossing, Result};

/// RAII view over the UTF-16 code units of a Java string.
///
/// Wraps `GetStringChars`/`ReleaseStringChars`; the `jni` crate only exposes
/// the modified UTF-8 accessors. Released on drop, never copied back.
pub struct StringCharsGuard<'s> {
    env: *mut jni::sys::JNIEnv,
    string: jstring,
    chars: *const jchar,
    len: usize,
    _string: PhantomData<&'s JString<'s>>,
}

impl<'s> StringCharsGuard<'s> {
    pub fn new(env: &JNIEnv<'_>, string: &'s JString<'_>) -> Result<Self> {
        let raw = env.get_raw();
        let jstr = string.as_raw();
        // SAFETY: `raw` is the live env of the current thread and `jstr` is a
        // valid, non-null local reference for at least 's.
        unsafe {
            let table = &**raw;
            let (get_length, get_chars) = match (table.GetStringLength, table.GetStringChars) {
                (Some(len), Some(chars)) => (len, chars),
                _ => {
                    return Err(BenchError::boundary(
                        Crossing::StringAccess,
                        "GetStringChars unavailable",
                    ))
                }
            };
            let len = get_length(raw, jstr);
            let chars = get_chars(raw, jstr, ptr::null_mut());
            if chars.is_null() {
                return Err(BenchError::boundary(
                    Crossing::StringAccess,
                    "GetStringChars returned null",
                ));
            }
            Ok(Self {
                env: raw,
                string: jstr,
                chars,
                len: len.max(0) as usize,
                _string: PhantomData,
            })
        }
    }

    pub fn as_units(&self) -> &[u16] {
        // SAFETY: the JVM keeps `len` code units readable until release.
        unsafe { std::slice::from_raw_parts(self.chars, self.len) }
    }
}

impl Drop for StringCharsGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: same env and string the chars were obtained from.
        unsafe {
            if let Some(release) = (**self.env).ReleaseStringChars {
                release(self.env, self.string, self.chars);
            }
        }
    }
}

/// Reinterpret JVM byte elements as unsigned bytes.
pub fn as_unsigned(bytes: &[i8]) -> &[u8] {
    // SAFETY: i8 and u8 have identical size and alignment.
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const u8, bytes.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_unsigned_preserves_bits() {
        let signed: [i8; 4] = [-1, 0, 1, -128];
        assert_eq!(as_unsigned(&signed), &[0xff, 0x00, 0x01, 0x80]);
    }
}
