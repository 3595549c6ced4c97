use wasmtime::{Caller, Extern, Memory};

use crate::context::ResponseContext;
use crate::runtime::HostState;

/// Resolve the guest's exported linear memory, caching the handle.
///
/// Only the handle is cached; the data behind it can grow or be rewritten
/// by the guest between calls, so every read goes back to the live export.
/// Returns `None` when the guest exports no memory, which disables the
/// whole connection ABI.
pub(crate) fn ensure_memory<C: ResponseContext>(
    caller: &mut Caller<'_, HostState<C>>,
) -> Option<Memory> {
    if let Some(mem) = caller.data().memory {
        return Some(mem);
    }
    let mem = caller.get_export("memory").and_then(Extern::into_memory)?;
    caller.data_mut().memory = Some(mem);
    Some(mem)
}

/// Copy `len` bytes at `offset` out of the guest's current linear memory.
///
/// Returns `None` when the memory export is absent or the range falls
/// outside the current memory size; callers treat that as a no-op trigger,
/// never an error. The result is an owned copy; no borrow into guest
/// memory may outlive a single ABI call.
pub(crate) fn read_guest_bytes<C: ResponseContext>(
    caller: &mut Caller<'_, HostState<C>>,
    offset: u32,
    len: u32,
) -> Option<Vec<u8>> {
    let memory = ensure_memory(caller)?;
    copy_range(memory.data(&*caller), offset, len)
}

fn copy_range(data: &[u8], offset: u32, len: u32) -> Option<Vec<u8>> {
    let start = offset as usize;
    let end = start.checked_add(len as usize)?;
    data.get(start..end).map(<[u8]>::to_vec)
}

#[cfg(test)]
mod tests {
    use super::copy_range;

    #[test]
    fn in_range_copies() {
        assert_eq!(copy_range(b"hello world", 6, 5), Some(b"world".to_vec()));
        assert_eq!(copy_range(b"abc", 0, 3), Some(b"abc".to_vec()));
    }

    #[test]
    fn zero_length_in_bounds_is_an_empty_copy() {
        assert_eq!(copy_range(b"abc", 3, 0), Some(Vec::new()));
        assert_eq!(copy_range(b"abc", 0, 0), Some(Vec::new()));
    }

    #[test]
    fn out_of_range_is_unavailable() {
        assert_eq!(copy_range(b"abc", 1, 3), None);
        assert_eq!(copy_range(b"abc", 4, 0), None);
        assert_eq!(copy_range(b"abc", u32::MAX, 2), None);
    }

    #[test]
    fn length_overflow_is_unavailable() {
        assert_eq!(copy_range(b"abc", 1, u32::MAX), None);
    }
}
