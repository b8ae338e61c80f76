use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total attempts, including the first one.
    pub rounds: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter (`0..=jitter_max_ms`) added to each backoff sleep.
    pub jitter_max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(3),
            jitter_max_ms: 200,
        }
    }
}

impl BackoffConfig {
    pub fn with_rounds(rounds: usize) -> Self {
        Self {
            rounds: rounds.max(1),
            ..Self::default()
        }
    }
}

fn compute_backoff_delay(cfg: &BackoffConfig, round: usize) -> Duration {
    let shift = u32::try_from(round.min(16)).unwrap_or(16_u32);
    let pow2 = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let base_ms = u64::try_from(cfg.base_delay.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(cfg.max_delay.as_millis()).unwrap_or(u64::MAX);
    let ms = base_ms.saturating_mul(pow2).min(max_ms);
    let jitter = if cfg!(test) || cfg.jitter_max_ms == 0 {
        0
    } else {
        let range = cfg.jitter_max_ms.saturating_add(1);
        rand::random::<u64>() % range
    };
    Duration::from_millis(ms.saturating_add(jitter))
}

/// Run `op` up to `cfg.rounds` times, sleeping with exponential backoff + jitter between
/// failed attempts. Only for idempotent reads: never wrap a broadcast in this.
pub async fn retry_with_backoff<T, Fut>(
    cfg: &BackoffConfig,
    mut op: impl FnMut() -> Fut,
    context_label: &'static str,
) -> eyre::Result<T>
where
    Fut: std::future::Future<Output = eyre::Result<T>>,
{
    if cfg.rounds == 0 {
        eyre::bail!("invalid backoff config: rounds=0");
    }

    let mut last_err: Option<eyre::Report> = None;

    for round in 0..cfg.rounds {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                tracing::debug!(op = context_label, round, error = %format!("{e:#}"), "attempt failed");
                last_err = Some(e);
            }
        }

        if round + 1 < cfg.rounds {
            tokio::time::sleep(compute_backoff_delay(cfg, round)).await;
        }
    }

    Err(last_err
        .unwrap_or_else(|| eyre::eyre!("unknown error"))
        .wrap_err(context_label))
}
