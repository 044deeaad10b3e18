//! Background renewal of the gateway's own Vault token.
//!
//! The loop renews with the token's *creation* TTL on every cycle and sleeps
//! a third of it in between. The increment never adapts to the remaining
//! lease; a token whose max TTL is shorter than its creation TTL will still
//! expire at its max TTL.

use std::sync::Arc;
use std::time::Duration;

use keygate_vault_client::{SecretBackend, TokenRenewal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RenewalError;

/// Shortest sleep between renewals, whatever the TTL.
pub const MIN_RENEWAL_SLEEP: Duration = Duration::from_secs(1);

/// Renewal schedule, fixed when the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    /// TTL the token was created with, in seconds
    pub creation_ttl: u64,
    /// Seconds between renewals: `creation_ttl / 3`, rounded down
    pub renewal_delay: u64,
}

impl Lease {
    /// Schedule for a token created with `creation_ttl` seconds.
    #[must_use]
    pub const fn from_creation_ttl(creation_ttl: u64) -> Self {
        Self {
            creation_ttl,
            renewal_delay: creation_ttl / 3,
        }
    }

    /// Wall-clock sleep between renewals.
    #[must_use]
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs(self.renewal_delay).max(MIN_RENEWAL_SLEEP)
    }
}

/// The renewal loop, ready to run.
pub struct RenewalLoop {
    backend: Arc<dyn SecretBackend>,
    lease: Lease,
}

impl RenewalLoop {
    /// Look up the token and fix the schedule.
    ///
    /// Returns `Ok(None)` for a token that never expires.
    ///
    /// # Errors
    ///
    /// [`RenewalError::Lookup`] if lookup-self fails or its response has no
    /// `creation_ttl`. The caller must not serve in that case.
    pub async fn start(backend: Arc<dyn SecretBackend>) -> Result<Option<Self>, RenewalError> {
        let lookup = backend.lookup_self().await.map_err(RenewalError::Lookup)?;

        if lookup.creation_ttl == 0 {
            info!(
                display_name = %lookup.display_name,
                "Vault token does not expire, renewal not needed"
            );
            return Ok(None);
        }

        let lease = Lease::from_creation_ttl(lookup.creation_ttl);
        info!(
            creation_ttl = lease.creation_ttl,
            renewal_delay = lease.renewal_delay,
            renewable = lookup.renewable,
            "Vault token renewal scheduled"
        );
        Ok(Some(Self { backend, lease }))
    }

    /// The fixed schedule.
    #[must_use]
    pub const fn lease(&self) -> Lease {
        self.lease
    }

    /// One renew-self call with the creation TTL.
    ///
    /// # Errors
    ///
    /// [`RenewalError::Attempt`] if the backend call fails.
    pub async fn renew_once(&self) -> Result<TokenRenewal, RenewalError> {
        self.backend
            .renew_self(self.lease.creation_ttl)
            .await
            .map_err(RenewalError::Attempt)
    }

    /// Renew, sleep, repeat until `shutdown` is cancelled. Failed renewals
    /// are logged and retried on the next cycle.
    pub async fn run(self, shutdown: CancellationToken) {
        let sleep = self.lease.sleep_duration();
        info!(interval_secs = sleep.as_secs(), "Token renewal loop starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Token renewal loop shutting down");
                return;
            }

            match self.renew_once().await {
                Ok(renewal) => info!(
                    lease_secs = renewal.lease_duration.as_secs(),
                    next_in_secs = sleep.as_secs(),
                    "Renewed Vault token"
                ),
                Err(e) => warn!(
                    code = e.code().as_str(),
                    error = %e,
                    next_in_secs = sleep.as_secs(),
                    "Failed to renew Vault token"
                ),
            }

            tokio::select! {
                () = tokio::time::sleep(sleep) => {},
                () = shutdown.cancelled() => {
                    info!("Token renewal loop shutting down");
                    return;
                }
            }
        }
    }
}
