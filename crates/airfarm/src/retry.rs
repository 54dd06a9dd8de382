use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total attempts, including the first.
    pub attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter (`0..=jitter_max_ms`) added to each backoff sleep.
    pub jitter_max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            // Keep this bounded so a farming run stays responsive even when
            // a platform is down; callers fall back to mock data after this.
            attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter_max_ms: 150,
        }
    }
}

fn compute_backoff_delay(cfg: &BackoffConfig, attempt: usize) -> Duration {
    let shift = u32::try_from(attempt.min(16)).unwrap_or(16_u32);
    let pow2 = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(cfg.base_delay.as_millis()).unwrap_or(u64::MAX);
    let mut ms = base_ms.saturating_mul(pow2);
    let max_ms = u64::try_from(cfg.max_delay.as_millis()).unwrap_or(u64::MAX);
    if ms > max_ms {
        ms = max_ms;
    }
    let jitter = if cfg!(test) || cfg.jitter_max_ms == 0 {
        0
    } else {
        // Avoid holding a non-Send RNG across await points.
        let range = cfg.jitter_max_ms.saturating_add(1);
        rand::random::<u64>() % range
    };
    Duration::from_millis(ms.saturating_add(jitter))
}

/// Retry `op` up to `cfg.attempts` times with exponential backoff + jitter
/// between attempts. Only meant for idempotent reads.
pub async fn with_backoff<T, Fut>(
    cfg: &BackoffConfig,
    mut op: impl FnMut() -> Fut + Send,
    context_label: &'static str,
) -> eyre::Result<T>
where
    Fut: std::future::Future<Output = eyre::Result<T>> + Send,
{
    if cfg.attempts == 0 {
        eyre::bail!("invalid backoff config: attempts=0");
    }

    let mut last_err: Option<eyre::Report> = None;

    for attempt in 0..cfg.attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
            }
        }
        if attempt + 1 < cfg.attempts {
            tokio::time::sleep(compute_backoff_delay(cfg, attempt)).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| eyre::eyre!("unknown error"))
        .wrap_err(context_label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test]
    async fn retries_until_attempts_exhausted() -> eyre::Result<()> {
        let cfg = BackoffConfig {
            attempts: 3,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            jitter_max_ms: 0,
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let res: eyre::Result<()> = with_backoff(
            &cfg,
            move || {
                let calls3 = Arc::clone(&calls2);
                async move {
                    calls3.fetch_add(1, Ordering::SeqCst);
                    eyre::bail!("fail")
                }
            },
            "op",
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn returns_first_success() -> eyre::Result<()> {
        let cfg = BackoffConfig {
            attempts: 3,
            base_delay: Duration::from_millis(0),
            ..Default::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);

        let out = with_backoff(
            &cfg,
            move || {
                let calls3 = Arc::clone(&calls2);
                async move {
                    if calls3.fetch_add(1, Ordering::SeqCst) == 1 {
                        Ok(42_i32)
                    } else {
                        eyre::bail!("nope")
                    }
                }
            },
            "op",
        )
        .await?;
        assert_eq!(out, 42_i32);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
