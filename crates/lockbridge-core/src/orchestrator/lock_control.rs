// ── One-shot lock commands ──
//
// Single request/acknowledgment exchanges against a paired lock. They
// occupy no session slot and resolve with their result instead of
// emitting events. Commands that end a user interaction (open, delete,
// pairing confirmation) release the link afterwards.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::pairing::spawn_rf_module_pairing;
use super::{Context, exchange};
use crate::error::CoreError;
use crate::event::Operation;
use crate::model::{
    AuthMaterial, Cat1Info, Device, DeviceInfo, LogVersion, MacAddress, NbIotInfo, RecordQuery,
    RecordWindow,
};
use crate::transport::TransportError;

/// What happens to the link once a command resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Keep,
    Release,
}

#[derive(Clone)]
pub struct LockControl {
    ctx: Arc<Context>,
}

impl LockControl {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn open(&self, device: &MacAddress) -> Result<(), CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.open_lock(&material)).await;
        self.settle("openLock", device, Link::Release, result).await
    }

    pub async fn close(&self, device: &MacAddress) -> Result<(), CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.close_lock(&material)).await;
        self.settle("closeLock", device, Link::Keep, result).await
    }

    /// Remove the pairing on the lock. Cached credentials are dropped once
    /// the lock accepts.
    pub async fn delete(&self, device: &MacAddress) -> Result<(), CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.delete_lock(&material)).await;
        let result = self.settle("deleteLock", device, Link::Release, result).await;
        if result.is_ok() && self.ctx.auth.clear(device) {
            info!(%device, "lock deleted, credentials forgotten");
        }
        result
    }

    /// Re-announce a completed pairing and retry the RF module link.
    pub async fn confirm_pairing(&self, device: &MacAddress) -> Result<(), CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.pair_success_ind(&material)).await;
        let result = self.settle("pairSuccessInd", device, Link::Release, result).await;
        if result.is_ok() {
            spawn_rf_module_pairing(Arc::clone(&self.ctx.transport), AuthMaterial::clone(&material));
        }
        result
    }

    /// Identity of a paired lock, without its secrets.
    pub async fn dna(&self, device: &MacAddress) -> Result<DeviceInfo, CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.get_dna(&material)).await;
        let dna = self.settle("getDna", device, Link::Keep, result).await?;
        Ok(DeviceInfo::new(
            &Device::from_id(device.clone(), None),
            Some(&dna),
            None,
        ))
    }

    pub async fn set_key_expiration_alarm(&self, device: &MacAddress, time: u32) -> Result<(), CoreError> {
        let material = self.prepare(device)?;
        let result = self
            .exchange(self.ctx.transport.set_key_expiration_alarm(&material, time))
            .await;
        self.settle("setKeyExpirationAlarmTime", device, Link::Keep, result).await
    }

    pub async fn nb_iot_info(&self, device: &MacAddress) -> Result<NbIotInfo, CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.nb_iot_info(&material)).await;
        self.settle("getNBIoTInfo", device, Link::Keep, result).await
    }

    pub async fn cat1_info(&self, device: &MacAddress) -> Result<Cat1Info, CoreError> {
        let material = self.prepare(device)?;
        let result = self.exchange(self.ctx.transport.cat1_info(&material)).await;
        self.settle("getCat1Info", device, Link::Keep, result).await
    }

    /// Read one journal window. The link stays up so the host can ask for
    /// the next one.
    pub async fn read_records(
        &self,
        device: &MacAddress,
        log_version: LogVersion,
        start: usize,
        count: usize,
    ) -> Result<RecordWindow, CoreError> {
        if count == 0 {
            return Err(CoreError::invalid("readCnt", "must be greater than zero"));
        }
        let material = self.prepare(device)?;
        let query = RecordQuery {
            start,
            count,
            log_version,
        };
        let result = async {
            let total = self.exchange(self.ctx.transport.record_count(&material)).await?;
            let page = self
                .exchange(self.ctx.transport.read_records(&material, &query))
                .await?;
            Ok(RecordWindow::new(query, total, page))
        }
        .await;
        self.settle("syncLockRecordsPage", device, Link::Keep, result).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn prepare(&self, device: &MacAddress) -> Result<Arc<AuthMaterial>, CoreError> {
        let material = self.ctx.material(device)?;
        self.ctx.radio.ensure_ready()?;
        Ok(material)
    }

    async fn exchange<T>(
        &self,
        request: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, CoreError> {
        exchange(Operation::LockCommand, self.ctx.config.ack_timeout, request).await
    }

    async fn settle<T>(
        &self,
        command: &'static str,
        device: &MacAddress,
        link: Link,
        result: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        if link == Link::Release {
            self.ctx.transport.disconnect(device).await;
        }
        match &result {
            Ok(_) => debug!(command, %device, "lock command acknowledged"),
            Err(e) => warn!(command, %device, code = e.kind().code(), error = %e, "lock command failed"),
        }
        result
    }
}
