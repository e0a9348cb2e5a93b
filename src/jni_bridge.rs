//! JVM-backed callback sources.
//!
//! Method IDs are looked up on first use and cached for the rest of the run.
//! Any JNI failure, including a pending Java exception, becomes a
//! `BoundaryFault`; the exception is left pending for the Java caller.

use jni::objects::{JByteArray, JClass, JMethodID, JObject, JStaticMethodID, JString, ReleaseMode};
use jni::signature::{Primitive, ReturnType};
use jni::sys::{jint, jlong, jvalue};
use jni::JNIEnv;

use crate::config::BenchConfig;
use crate::errors::{BenchError, Crossing, Result};
use crate::jni_raii::{as_unsigned, StringCharsGuard};
use crate::source::{InstanceSource, StaticSource};
use crate::view::AddressLengthSlots;

fn fault(crossing: Crossing) -> impl FnOnce(jni::errors::Error) -> BenchError {
    move |e| BenchError::boundary(crossing, e.to_string())
}

fn int_arg(i: jint) -> jvalue {
    jvalue { i }
}

fn long_arg(j: jlong) -> jvalue {
    jvalue { j }
}

/// Read a byte array's elements without copying back, then let `f` see them.
fn with_byte_elements<'local, R>(
    env: &mut JNIEnv<'local>,
    array: JObject<'local>,
    f: impl FnOnce(&[u8]) -> R,
) -> Result<Option<R>> {
    if array.is_null() {
        return Ok(None);
    }
    let array = env.auto_local(JByteArray::from(array));
    // SAFETY: no other view of this array is alive, and we only read it.
    let elements = unsafe { env.get_array_elements(&*array, ReleaseMode::NoCopyBack) }
        .map_err(fault(Crossing::ArrayAccess))?;
    Ok(Some(f(as_unsigned(&elements))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceMethod {
    GetString,
    GetUtf8String,
    GetByteString,
    Utf8GetBytes,
}

impl InstanceMethod {
    const COUNT: usize = 4;

    fn descriptor(self) -> (&'static str, &'static str) {
        match self {
            InstanceMethod::GetString => ("getString", "(I)Ljava/lang/String;"),
            InstanceMethod::GetUtf8String => (
                "getUTF8String",
                "(I)Lcom/evolvedbinary/jnibench/common/UTF8String;",
            ),
            InstanceMethod::GetByteString => ("getByteString", "(I)[B"),
            InstanceMethod::Utf8GetBytes => ("getBytes", "()[B"),
        }
    }
}

/// Callbacks on a `StringProvider` instance.
pub struct JvmInstanceSource<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    provider: &'a JObject<'local>,
    provider_class: JClass<'local>,
    utf8_class_name: String,
    utf8_class: Option<JClass<'local>>,
    methods: [Option<JMethodID>; InstanceMethod::COUNT],
}

impl<'a, 'local> JvmInstanceSource<'a, 'local> {
    pub fn new(
        env: &'a mut JNIEnv<'local>,
        provider: &'a JObject<'local>,
        config: &BenchConfig,
    ) -> Result<Self> {
        let provider_class = env
            .find_class(config.provider_class.as_str())
            .map_err(fault(Crossing::FindClass))?;
        Ok(Self {
            env,
            provider,
            provider_class,
            utf8_class_name: config.utf8_string_class.clone(),
            utf8_class: None,
            methods: [None; InstanceMethod::COUNT],
        })
    }

    fn method(&mut self, method: InstanceMethod) -> Result<JMethodID> {
        if let Some(id) = self.methods[method as usize] {
            return Ok(id);
        }
        let (name, sig) = method.descriptor();
        let id = if method == InstanceMethod::Utf8GetBytes {
            if self.utf8_class.is_none() {
                let class = self
                    .env
                    .find_class(self.utf8_class_name.as_str())
                    .map_err(fault(Crossing::FindClass))?;
                self.utf8_class = Some(class);
            }
            match &self.utf8_class {
                Some(class) => self.env.get_method_id(class, name, sig),
                None => return Err(BenchError::boundary(Crossing::FindClass, "UTF8String")),
            }
        } else {
            self.env.get_method_id(&self.provider_class, name, sig)
        }
        .map_err(fault(Crossing::MethodLookup))?;
        self.methods[method as usize] = Some(id);
        Ok(id)
    }

    /// Invoke an object-returning provider method with the index.
    fn call_object(&mut self, method: InstanceMethod, index: i32) -> Result<JObject<'local>> {
        let id = self.method(method)?;
        // SAFETY: `id` was resolved against the provider class with a
        // signature taking one int and returning an object.
        let value = unsafe {
            self.env
                .call_method_unchecked(self.provider, id, ReturnType::Object, &[int_arg(index)])
        }
        .map_err(fault(Crossing::Call))?;
        value.l().map_err(fault(Crossing::Call))
    }
}

impl InstanceSource for JvmInstanceSource<'_, '_> {
    fn with_string_narrow<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>> {
        let obj = self.call_object(InstanceMethod::GetString, index)?;
        if obj.is_null() {
            return Ok(None);
        }
        let string = self.env.auto_local(JString::from(obj));
        // SAFETY: getString is declared to return java.lang.String.
        let chars = unsafe { self.env.get_string_unchecked(&string) }
            .map_err(fault(Crossing::StringAccess))?;
        Ok(Some(f(chars.to_bytes())))
    }

    fn with_string_wide<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u16]) -> R,

    ) -> Result<Option<R>> {
        let obj = self.call_object(InstanceMethod::GetString, index)?;
        if obj.is_null() {
            return Ok(None);
        }
        let string = self.env.auto_local(JString::from(obj));
        let chars = StringCharsGuard::new(self.env, &string)?;
        Ok(Some(f(chars.as_units())))
    }

    fn with_utf8_string<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u8]) -> R,

    ) -> Result<Option<R>> {
        let obj = self.call_object(InstanceMethod::GetUtf8String, index)?;
        if obj.is_null() {
            return Ok(None);
        }
        let utf8 = self.env.auto_local(obj);
        let get_bytes = self.method(InstanceMethod::Utf8GetBytes)?;
        // SAFETY: getBytes()[B resolved on the UTF8String class.
        let bytes = unsafe {
            self.env
                .call_method_unchecked(&*utf8, get_bytes, ReturnType::Array, &[])
        }
        .and_then(|v| v.l())
        .map_err(fault(Crossing::Call))?;
        with_byte_elements(self.env, bytes, f)
    }

    fn with_byte_string<R>(

        &mut self,

        index: i32,

        f: impl FnOnce(&[u8]) -> R,

    ) -> Result<Option<R>> {
        let bytes = self.call_object(InstanceMethod::GetByteString, index)?;
        with_byte_elements(self.env, bytes, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaticMethod {
    GetByteString,
    GetByteNativePreallocated,
    GetByteLength,
    GetByteNativePreallocatedWithSize,
    GetByteNativeCallerAllocated,
    GetStaticNativeLongByReturn,
    GetStaticNativeLongByArg,
    GetByteNativeAllocate,
    FreeByteNative,
}

impl StaticMethod {
    const COUNT: usize = 9;

    fn descriptor(self) -> (&'static str, &'static str) {
        match self {
            StaticMethod::GetByteString => ("getByteString", "(I)[B"),
            StaticMethod::GetByteNativePreallocated => ("getByteNativePreallocated", "(I)J"),
            StaticMethod::GetByteLength => ("getByteLength", "(I)I"),
            StaticMethod::GetByteNativePreallocatedWithSize => {
                ("getByteNativePreallocatedWithSize", "(IJ)V")
            }
            StaticMethod::GetByteNativeCallerAllocated => {
                ("getByteNativeCallerAllocated", "(IJI)I")
            }
            StaticMethod::GetStaticNativeLongByReturn => ("getStaticNativeLongByReturn", "(I)J"),
            StaticMethod::GetStaticNativeLongByArg => ("getStaticNativeLongByArg", "(IJ)V"),
            StaticMethod::GetByteNativeAllocate => ("getByteNativeAllocate", "(I)J"),
            StaticMethod::FreeByteNative => ("freeByteNative", "(J)V"),
        }
    }

    fn return_type(self) -> ReturnType {
        match self {
            StaticMethod::GetByteString => ReturnType::Array,
            StaticMethod::GetByteNativePreallocated
            | StaticMethod::GetStaticNativeLongByReturn
            | StaticMethod::GetByteNativeAllocate => ReturnType::Primitive(Primitive::Long),
            StaticMethod::GetByteLength | StaticMethod::GetByteNativeCallerAllocated => {
                ReturnType::Primitive(Primitive::Int)
            }
            StaticMethod::GetByteNativePreallocatedWithSize
            | StaticMethod::GetStaticNativeLongByArg
            | StaticMethod::FreeByteNative => ReturnType::Primitive(Primitive::Void),
        }
    }
}

/// Static callbacks on `StringProviderStatic`.
pub struct JvmStaticSource<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    class: JClass<'local>,
    methods: [Option<JStaticMethodID>; StaticMethod::COUNT],
}

impl<'a, 'local> JvmStaticSource<'a, 'local> {
    pub fn new(env: &'a mut JNIEnv<'local>, config: &BenchConfig) -> Result<Self> {
        let class = env
            .find_class(config.static_provider_class.as_str())
            .map_err(fault(Crossing::FindClass))?;
        Ok(Self {
            env,
            class,
            methods: [None; StaticMethod::COUNT],
        })
    }

    fn method(&mut self, method: StaticMethod) -> Result<JStaticMethodID> {
        if let Some(id) = self.methods[method as usize] {
            return Ok(id);
        }
        let (name, sig) = method.descriptor();
        let id = self
            .env
            .get_static_method_id(&self.class, name, sig)
            .map_err(fault(Crossing::MethodLookup))?;
        self.methods[method as usize] = Some(id);
        Ok(id)
    }

    fn call(
        &mut self,
        method: StaticMethod,
        args: &[jvalue],
    ) -> Result<jni::objects::JValueOwned<'local>> {
        let id = self.method(method)?;
        // SAFETY: `args` and the return type match the descriptor `id` was
        // resolved with.
        unsafe {
            self.env
                .call_static_method_unchecked(&self.class, id, method.return_type(), args)
        }
        .map_err(fault(Crossing::Call))
    }

    fn call_long(&mut self, method: StaticMethod, args: &[jvalue]) -> Result<i64> {
        self.call(method, args)?.j().map_err(fault(Crossing::Call))
    }

    fn call_int(&mut self, method: StaticMethod, args: &[jvalue]) -> Result<i32> {
        self.call(method, args)?.i().map_err(fault(Crossing::Call))
    }
}

// SAFETY: the Java side hands out addresses from Unsafe.allocateMemory that
// stay valid until freeByteNative (or for the provider's lifetime when
// preallocated), with lengths taken from the same byte strings.
unsafe impl StaticSource for JvmStaticSource<'_, '_> {
    fn with_byte_string<R>(
        &mut self,
        index: i32,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<Option<R>> {
        let bytes = self
            .call(StaticMethod::GetByteString, &[int_arg(index)])?
            .l()
            .map_err(fault(Crossing::Call))?;
        with_byte_elements(self.env, bytes, f)
    }

    fn byte_native_preallocated(&mut self, index: i32) -> Result<i64> {
        self.call_long(StaticMethod::GetByteNativePreallocated, &[int_arg(index)])
    }

    fn byte_length(&mut self, index: i32) -> Result<i32> {
        self.call_int(StaticMethod::GetByteLength, &[int_arg(index)])
    }

    fn byte_native_preallocated_with_size(
        &mut self,
        index: i32,
        slots: &mut AddressLengthSlots,
    ) -> Result<()> {
        let out = slots.out_address();
        self.call(
            StaticMethod::GetByteNativePreallocatedWithSize,
            &[int_arg(index), long_arg(out)],
        )?;
        Ok(())
    }

    fn byte_native_caller_allocated(&mut self, index: i32, buffer: &mut [u8]) -> Result<i32> {
        let address = buffer.as_mut_ptr() as usize as jlong;
        let capacity = buffer.len().min(i32::MAX as usize) as jint;
        self.call_int(
            StaticMethod::GetByteNativeCallerAllocated,
            &[int_arg(index), long_arg(address), int_arg(capacity)],
        )
    }

    fn native_long_by_return(&mut self, index: i32) -> Result<i64> {
        self.call_long(StaticMethod::GetStaticNativeLongByReturn, &[int_arg(index)])
    }

    fn native_long_by_arg(&mut self, index: i32, out: &mut i64) -> Result<()> {
        let address = out as *mut i64 as usize as jlong;
        self.call(
            StaticMethod::GetStaticNativeLongByArg,
            &[int_arg(index), long_arg(address)],
        )?;
        Ok(())
    }

    fn byte_native_allocate(&mut self, index: i32) -> Result<i64> {
        self.call_long(StaticMethod::GetByteNativeAllocate, &[int_arg(index)])
    }

    fn free_byte_native(&mut self, address: i64) -> Result<()> {
        self.call(StaticMethod::FreeByteNative, &[long_arg(address)])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_descriptors_match_return_types() {
        let all = [
            StaticMethod::GetByteString,
            StaticMethod::GetByteNativePreallocated,
            StaticMethod::GetByteLength,
            StaticMethod::GetByteNativePreallocatedWithSize,
            StaticMethod::GetByteNativeCallerAllocated,
            StaticMethod::GetStaticNativeLongByReturn,
            StaticMethod::GetStaticNativeLongByArg,
            StaticMethod::GetByteNativeAllocate,
            StaticMethod::FreeByteNative,
        ];
        assert_eq!(all.len(), StaticMethod::COUNT);
        for method in all {
            let (_, sig) = method.descriptor();
            let ret = &sig[sig.find(')').unwrap() + 1..];
            let expected = match method.return_type() {
                ReturnType::Array => "[B",
                ReturnType::Primitive(Primitive::Long) => "J",
                ReturnType::Primitive(Primitive::Int) => "I",
                ReturnType::Primitive(Primitive::Void) => "V",
                other => panic!("unexpected return type {:?}", other),
            };
            assert_eq!(ret, expected, "{:?}", method);
        }
    }

    #[test]
    fn test_instance_descriptors_take_index() {
        for method in [
            InstanceMethod::GetString,
            InstanceMethod::GetUtf8String,
            InstanceMethod::GetByteString,
        ] {
            assert!(method.descriptor().1.starts_with("(I)"));
        }
        assert_eq!(InstanceMethod::Utf8GetBytes.descriptor().1, "()[B");
    }
}
