//! Bounded fixed-interval polling, shared by every wait-for-readiness path.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::Instant;

/// Run `probe` every `interval` until it yields a value or `timeout`
/// elapses. The first probe happens immediately; the wait never exceeds
/// `timeout + interval`. The cancellation flag is observed before every
/// probe and during the sleep between probes, so an interrupt arriving
/// mid-wait does not sit out the full timeout.
///
/// Returns `Ok(None)` on timeout so each caller can attach its own
/// `TimeoutError`. Probe errors are returned as-is.
///
/// # Errors
///
/// Returns an error if `probe` fails or the cancellation flag flips.
pub async fn until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: &watch::Receiver<bool>,
    mut probe: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut cancel = cancel.clone();
    let deadline = Instant::now() + timeout;
    loop {
        if *cancel.borrow() {
            anyhow::bail!("interrupted");
        }
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = cancelled(&mut cancel) => anyhow::bail!("interrupted"),
        }
    }
}

/// Resolves only once the flag flips to true. A dropped sender can never
/// cancel, so that case pends forever instead of waking the select.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_value_once_probe_is_ready() {
        let (_tx, rx) = watch::channel(false);
        let attempts = Cell::new(0_u32);
        let attempts_ref = &attempts;
        let result = until(
            Duration::from_secs(1),
            Duration::from_secs(10),
            &rx,
            move || async move {
                attempts_ref.set(attempts_ref.get() + 1);
                if attempts_ref.get() >= 3 {
                    Ok(Some("ready"))
                } else {
                    Ok(None)
                }
            },
        )
        .await
        .expect("poll");
        assert_eq!(result, Some("ready"));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_within_timeout_plus_interval() {
        let (_tx, rx) = watch::channel(false);
        let started = Instant::now();
        let result: Option<()> = until(
            Duration::from_secs(1),
            Duration::from_secs(5),
            &rx,
            || async { Ok(None) },
        )
        .await
        .expect("poll");
        assert_eq!(result, None);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "gave up early: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(6), "overran: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_stop_the_poll() {
        let (_tx, rx) = watch::channel(false);
        let attempts = Cell::new(0_u32);
        let attempts_ref = &attempts;
        let result: Result<Option<()>> = until(
            Duration::from_secs(1),
            Duration::from_secs(10),
            &rx,
            move || async move {
                attempts_ref.set(attempts_ref.get() + 1);
                anyhow::bail!("backend exploded")
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1, "should not retry after an error");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep_between_probes() {
        let (tx, rx) = watch::channel(false);
        let started = Instant::now();
        let (result, ()) = tokio::join!(
            until(Duration::from_secs(30), Duration::from_secs(600), &rx, || async {
                Ok::<Option<()>, anyhow::Error>(None)
            }),
            async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                tx.send(true).expect("send cancel");
            }
        );
        result.expect_err("expected Err");
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(30), "cancel waited out the interval: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn flag_already_set_skips_the_first_probe() {
        let (_tx, rx) = watch::channel(true);
        let attempts = Cell::new(0_u32);
        let attempts_ref = &attempts;
        let result: Result<Option<()>> = until(
            Duration::from_secs(1),
            Duration::from_secs(10),
            &rx,
            move || async move {
                attempts_ref.set(attempts_ref.get() + 1);
                Ok(None)
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 0);
    }
}
