// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-sample agreement, shared by the copper and module state machines.
//!
//! A link status is only acted on when two reads a few milliseconds apart
//! agree. A disagreement means the link changed mid-poll; the caller skips
//! the pass (or counts it as a flap when the port was up) rather than
//! acting on a value that is already stale.

use embedded_hal::blocking::delay::DelayMs;

/// Settle time between the two samples.
pub(crate) const AGREE_SETTLE_MS: u32 = 5;

/// Runs `f` twice and returns its value only if both runs agree.
pub(crate) fn sample_agreeing<T, E, F, D>(
    delay: &mut D,
    mut f: F,
) -> Result<Option<T>, E>
where
    T: PartialEq,
    F: FnMut() -> Result<T, E>,
    D: DelayMs<u32>,
{
    let first = f()?;
    delay.delay_ms(AGREE_SETTLE_MS);
    let second = f()?;
    Ok(if first == second { Some(first) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDelay;
    impl DelayMs<u32> for NoDelay {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    #[test]
    fn agreement_passes_value_through() {
        let r: Result<_, ()> = sample_agreeing(&mut NoDelay, || Ok(7));
        assert_eq!(r, Ok(Some(7)));
    }

    #[test]
    fn disagreement_yields_none() {
        let mut vals = [1, 2].into_iter();
        let r: Result<_, ()> =
            sample_agreeing(&mut NoDelay, || Ok(vals.next().unwrap()));
        assert_eq!(r, Ok(None));
    }

    #[test]
    fn errors_cut_the_sampling_short() {
        let mut calls = 0;
        let r: Result<Option<u8>, &str> = sample_agreeing(&mut NoDelay, || {
            calls += 1;
            Err("bus fault")
        });
        assert_eq!(r, Err("bus fault"));
        assert_eq!(calls, 1);
    }
}
