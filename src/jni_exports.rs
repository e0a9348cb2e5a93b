// Native entry points for com.evolvedbinary.jnibench.common.FooByCallStaticFinal.

use jni::objects::{JClass, JObject};
use jni::sys::{jint, jlong, JNI_VERSION_1_6};
use jni::JNIEnv;
use once_cell::sync::Lazy;

use crate::config::{global_config, BenchConfig};
use crate::driver::{InstanceVariant, StaticVariant, TransferVariant};
use crate::errors::{collapse, Result};
use crate::handle;
use crate::jni_bridge::{JvmInstanceSource, JvmStaticSource};
use crate::logging::{generate_trace_id, PerformanceLogger};

static EXPORT_LOGGER: Lazy<PerformanceLogger> = Lazy::new(|| PerformanceLogger::new("jni_exports"));

/// Run one benchmark, log the fault if any, and collapse to the Java result.
fn run_traced(
    config: &BenchConfig,
    variant: TransferVariant,
    run: impl FnOnce() -> Result<i64>,
) -> jlong {
    let result = if config.trace_runs {
        EXPORT_LOGGER.log_operation(variant.name(), &generate_trace_id(), run)
    } else {
        run()
    };
    if let Err(fault) = &result {
        EXPORT_LOGGER.log_fault(variant.name(), &generate_trace_id(), fault);
    }
    collapse(result)
}

fn run_instance<'local>(
    env: &mut JNIEnv<'local>,
    provider: &JObject<'local>,
    variant: InstanceVariant,
    iterations: jint,
) -> jlong {
    let config = global_config();
    run_traced(&config, variant.into(), || {
        let mut source = JvmInstanceSource::new(env, provider, &config)?;
        variant.run(&mut source, iterations)
    })
}

fn run_static(env: &mut JNIEnv<'_>, variant: StaticVariant, iterations: jint) -> jlong {
    let config = global_config();
    run_traced(&config, variant.into(), || {
        let mut source = JvmStaticSource::new(env, &config)?;
        variant.run(&mut source, iterations, &config)
    })
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: *mut jni::sys::JavaVM,
    _reserved: *mut std::os::raw::c_void,
) -> jint {
    crate::ensure_initialized();
    JNI_VERSION_1_6
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_newFoo(
    _env: JNIEnv,
    _class: JClass,
) -> jlong {
    handle::create()
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_disposeInternal(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    // SAFETY: Java's NativeBackedObject disposes each handle exactly once.
    unsafe { handle::destroy(handle) }
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStringFromJava<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    provider: JObject<'local>,
    num_times: jint,
) -> jlong {
    run_instance(&mut env, &provider, InstanceVariant::StringNarrow, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStringFromJavaAsNativeUTF16<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    provider: JObject<'local>,
    num_times: jint,
) -> jlong {
    run_instance(&mut env, &provider, InstanceVariant::StringWide, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getUTF8StringFromJava<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    provider: JObject<'local>,
    num_times: jint,
) -> jlong {
    run_instance(&mut env, &provider, InstanceVariant::Utf8String, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getBytesFromJava<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    provider: JObject<'local>,
    num_times: jint,
) -> jlong {
    run_instance(&mut env, &provider, InstanceVariant::ByteString, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticBytesFromJava(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::ByteString, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticNativePreallocatedFromJava(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::PreallocatedByReturn, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticNativePreallocatedWithSizeFromJava(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::PreallocatedByOutParam, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticByteNativeCallerAllocated(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::CallerAllocated, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticNativeFromJava(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::AllocateThenFree, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticNativeLongByReturn(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::LongByReturn, num_times)
}

#[no_mangle]
pub extern "system" fn Java_com_evolvedbinary_jnibench_common_FooByCallStaticFinal_getStaticNativeLongByArg(
    mut env: JNIEnv,
    _class: JClass,
    num_times: jint,
) -> jlong {
    run_static(&mut env, StaticVariant::LongByOutParam, num_times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BenchError, ERROR_CODE};

    #[test]
    fn test_run_traced_collapses_faults() {
        let config = BenchConfig::default();
        let variant = TransferVariant::from(StaticVariant::LongByReturn);
        assert_eq!(run_traced(&config, variant, || Ok(7)), 7);
        let faulted = run_traced(&config, variant, || {
            Err(BenchError::AbsentValue { callback: "getString", index: 0 })
        });
        assert_eq!(faulted, ERROR_CODE);
    }

    #[test]
    fn test_run_traced_with_tracing_enabled() {
        let config = BenchConfig {
            trace_runs: true,
            ..BenchConfig::default()
        };
        let variant = TransferVariant::from(InstanceVariant::ByteString);
        assert_eq!(run_traced(&config, variant, || Ok(1)), 1);
    }
}
