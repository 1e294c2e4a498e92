//! Timeouts and the monotonic clock seam.
//!
//! Every suspending radio call is raced against a delay from an
//! `embedded_hal_async::delay::DelayNs` implementation (`embassy_time::Delay`
//! on target, a virtual delay in tests).

use core::future::Future;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

/// Milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// The raced future did not finish within its budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedOut;

/// Run `fut` for at most `timeout_ms`. On timeout `fut` is dropped, which
/// cancels whatever radio operation it was waiting on.
pub async fn with_timeout<D, F>(delay: &mut D, timeout_ms: u32, fut: F) -> Result<F::Output, TimedOut>
where
    D: DelayNs,
    F: Future,
{
    match select(fut, delay.delay_ms(timeout_ms)).await {
        Either::First(output) => Ok(output),
        Either::Second(()) => Err(TimedOut),
    }
}
