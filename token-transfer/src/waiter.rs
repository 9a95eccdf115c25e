//! Polls an [`AttestationSource`] until a signed VAA shows up or the deadline passes.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::{debug, info, warn};
use portal_vaas::{signing::GuardianSetTable, Vaa};
use tokio::time::{sleep, timeout, Instant};

use crate::{
    error::WaitError,
    source::{AttestationHandle, AttestationSource, AttestationStatus},
};

pub struct AttestationWaiter {
    source: Arc<dyn AttestationSource>,
    poll_interval: Duration,
    guardian_sets: Arc<GuardianSetTable>,
}

impl AttestationWaiter {
    /// Only VAAs that reach quorum against `guardian_sets` are returned. Anything less counts as
    /// pending, so an empty table never yields a VAA.
    pub fn new(
        source: Arc<dyn AttestationSource>,
        poll_interval: Duration,
        guardian_sets: Arc<GuardianSetTable>,
    ) -> Self {
        AttestationWaiter {
            source,
            poll_interval,
            guardian_sets,
        }
    }

    /// Waits at most `limit` for the attestation of `handle`. Dropping the returned future stops
    /// the polling.
    pub async fn wait(
        &self,
        handle: &AttestationHandle,
        limit: Duration,
    ) -> Result<Vec<u8>, WaitError> {
        let start = Instant::now();
        info!("waiting up to {} ms for VAA {handle}", limit.as_millis());

        match timeout(limit, self.poll(handle)).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!("no VAA for {handle} after {elapsed_ms} ms");
                Err(WaitError::Timeout { elapsed_ms })
            }
        }
    }

    async fn poll(&self, handle: &AttestationHandle) -> Result<Vec<u8>, WaitError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.source.fetch(handle).await {
                Ok(AttestationStatus::Signed(vaa)) if self.has_quorum(&vaa) => {
                    info!("VAA {handle} signed after {attempt} attempt(s)");
                    return Ok(vaa);
                }
                Ok(AttestationStatus::Signed(_)) => {
                    debug!("VAA {handle} is below quorum, attempt {attempt}");
                }
                Ok(AttestationStatus::Pending) => debug!("VAA {handle} pending, attempt {attempt}"),
                Ok(AttestationStatus::Rejected(reason)) => return Err(WaitError::Rejected(reason)),
                Err(e) => warn!("fetching VAA {handle} failed, attempt {attempt}: {e:#}"),
            }

            sleep(self.poll_interval).await;
        }
    }

    fn has_quorum(&self, raw: &[u8]) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let verified =
            Vaa::<Vec<u8>>::deserialize(raw).and_then(|vaa| self.guardian_sets.verify(&vaa, now));
        match verified {
            Ok(_) => true,
            Err(e) => {
                debug!("discarding VAA: {e}");
                false
            }
        }
    }
}
