// ── Cellular module diagnostics ──
//
// Locks fitted with an NB-IoT or Cat.1 modem answer AT-style status
// queries relayed over the BLE link.

use serde::Serialize;

use super::RfModuleType;

/// Modem identity and signal strength of an NB-IoT module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NbIotInfo {
    pub rssi: i32,
    pub imsi: String,
    pub imei: String,
}

/// Modem identity and radio quality of a Cat.1 module.
///
/// The modem reports signal figures as text and they are passed on
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cat1Info {
    pub iccid: String,
    pub imei: String,
    pub imsi: String,
    pub rssi: String,
    pub rsrp: String,
    pub sinr: String,
}

impl RfModuleType {
    pub const fn is_nb_iot(self) -> bool {
        matches!(self, Self::NbIot | Self::NbMqtt | Self::NbLwm2m)
    }
}
