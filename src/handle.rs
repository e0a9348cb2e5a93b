use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Placeholder native allocation backing a Java `FooByCallStaticFinal`.
#[derive(Debug)]
pub struct BenchResource {
    id: u64,
}

impl BenchResource {
    pub fn new() -> Self {
        Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for BenchResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate a resource and hand ownership to the caller as an opaque handle.
pub fn create() -> i64 {
    Box::into_raw(Box::new(BenchResource::new())) as usize as i64
}

/// Release a handle returned by [`create`]. A zero handle is ignored.
///
/// # Safety
///
/// `handle` must come from [`create`] and must not have been destroyed
/// already.
pub unsafe fn destroy(handle: i64) {
    if handle == 0 {
        return;
    }
    drop(Box::from_raw(handle as usize as *mut BenchResource));
}

/// Borrow the resource behind a live handle.
///
/// # Safety
///
/// Same contract as [`destroy`]; the borrow must end before the handle is
/// destroyed.
pub unsafe fn resolve<'a>(handle: i64) -> Option<&'a BenchResource> {
    (handle as usize as *const BenchResource).as_ref()
}
