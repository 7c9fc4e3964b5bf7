// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static trace ring buffers for drivers and tasks.
//!
//! A ring buffer records the last N events of a `Copy + PartialEq` payload
//! type, typically a per-crate `Trace` enum. Buffers are declared with
//! [`ringbuf!`] and written with [`ringbuf_entry!`]; they are meant to be
//! inspected post-hoc with a debugger, not consumed at runtime.
//!
//! ```ignore
//! ringbuf!(Trace, 16, Trace::None);
//! // ...
//! ringbuf_entry!(Trace::LinkUp { port });
//! ```
//!
//! If an entry repeats the most recent one (same line, same payload), its
//! count is bumped instead of consuming another slot.

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A single-borrow cell suitable for `static` ring buffers.
///
/// Unlike `RefCell` this is `Sync`; unlike a mutex there is nothing to poison.
/// If the cell is already borrowed, `borrow_mut` waits for the borrow to be
/// released rather than panicking, so entries written from test threads can
/// never take the firmware down.
#[derive(Default)]
pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

impl<T> StaticCell<T> {
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Gets exclusive access to the contents of `self`, waiting if another
    /// borrow is still live.
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        while self.borrowed.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
        }
        // Safety: the flag above ensures we never hand out an aliasing &mut.
        unsafe {
            StaticRef {
                contents: &mut *self.cell.get(),
                borrow: &self.borrowed,
            }
        }
    }
}

unsafe impl<T> Sync for StaticCell<T> where for<'a> &'a mut T: Send {}

pub struct StaticRef<'a, T> {
    contents: &'a mut T,
    borrow: &'a AtomicBool,
}

impl<T> Drop for StaticRef<'_, T> {
    fn drop(&mut self) {
        self.borrow.store(false, Ordering::Release);
    }
}

impl<T> core::ops::Deref for StaticRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &*self.contents
    }
}

impl<T> core::ops::DerefMut for StaticRef<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contents
    }
}

/// Declares a ring buffer in the current module.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a buffer named `NAME` with room for
/// `N` entries of type `Type`, all initialized to `expr`. Omitting the name
/// declares the per-module default, `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Inserts data into a ring buffer declared with [`ringbuf!`].
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate payload and buffer in a tuple so that neither can
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(
            &mut *$crate::StaticCell::borrow_mut(buf),
            line!() as u16,
            p,
        );
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$buf;
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// Inserts data into a ring buffer declared at the root of the current crate.
#[cfg(not(feature = "disabled"))]
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {
        $crate::ringbuf_entry!(crate::$buf, $payload);
    };
    ($payload:expr) => {
        $crate::ringbuf_entry!(crate::__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// One slot of a [`Ringbuf`]. When an entry repeats the most recent one
/// (same `line` and `payload`), `count` is incremented instead of consuming
/// a new slot.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size. Instantiate through the
/// [`ringbuf!`] macro rather than directly.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub fn entry(&mut self, line: u16, payload: T) {
        // Treat a never-written buffer as having an out-of-range last index,
        // so the first insertion lands in slot 0 without a special case.
        let last = self.last.unwrap_or(usize::MAX);

        // Coalesce with the most recent entry where possible. `get_mut`
        // doubles as the bounds check for the usize::MAX case above.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            // Not a remainder: this also maps the usize::MAX starting value
            // to 0, and our targets lack hardware divide anyway.
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty<const N: usize>() -> Ringbuf<u32, N> {
        Ringbuf {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: 0,
            }; N],
        }
    }

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut buf = empty::<4>();
        buf.entry(10, 0xaa);
        assert_eq!(buf.last, Some(0));
        assert_eq!(buf.buffer[0].payload, 0xaa);
        assert_eq!(buf.buffer[0].count, 1);
    }

    #[test]
    fn repeats_coalesce() {
        let mut buf = empty::<4>();
        buf.entry(10, 7);
        buf.entry(10, 7);
        buf.entry(10, 7);
        assert_eq!(buf.last, Some(0));
        assert_eq!(buf.buffer[0].count, 3);

        // A different payload takes a new slot.
        buf.entry(10, 8);
        assert_eq!(buf.last, Some(1));
    }

    #[test]
    fn wraps_around() {
        let mut buf = empty::<2>();
        buf.entry(1, 1);
        buf.entry(2, 2);
        buf.entry(3, 3);
        assert_eq!(buf.last, Some(0));
        assert_eq!(buf.buffer[0].payload, 3);
        assert_eq!(buf.buffer[0].generation, 2);
    }
}
