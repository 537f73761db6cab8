// ── Domain model ──
//
// Types shared by the orchestrators, the transport boundary and the host
// surface.

pub mod auth;
pub mod cellular;
pub mod device;
pub mod key;
pub mod mac;
pub mod record;

pub use auth::{AuthMaterial, DEFAULT_KEY_GROUP_ID, DeviceInfo, DnaInfo, RfModuleType, SysParam};
pub use cellular::{Cat1Info, NbIotInfo};
pub use device::{Device, DeviceType};
pub use key::{EnrolledKey, KEY_GROUP_RANGE, KeyType, KeyValidity};
pub use mac::MacAddress;
pub use record::{
    DEFAULT_RECORD_PAGE_SIZE, LockRecord, LogVersion, RecordPage, RecordQuery, RecordWindow,
};
