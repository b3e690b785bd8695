//! Wire models for the Intune device directory

use serde::{Deserialize, Serialize};

/// Compliance evaluation of a managed device.
///
/// Graph reports more granular states (conflict, error, inGracePeriod, ...);
/// everything outside compliant/noncompliant collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceState {
    Compliant,
    Noncompliant,
    #[serde(other)]
    Other,
}

impl ComplianceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceState::Compliant => "compliant",
            ComplianceState::Noncompliant => "noncompliant",
            ComplianceState::Other => "other",
        }
    }
}

/// An Intune managedDevice entry. Immutable once fetched; `id` is unique
/// within a fetched set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub device_name: Option<String>,
    pub serial_number: Option<String>,
    pub operating_system: Option<String>,
    pub os_version: Option<String>,
    pub compliance_state: Option<ComplianceState>,
    pub last_sync_date_time: Option<String>,
    pub device_type: Option<String>,
    pub user_principal_name: Option<String>,
    pub device_registration_state: Option<String>,
    pub management_state: Option<String>,
    pub enrolled_date_time: Option<String>,
    pub device_enrollment_type: Option<String>,
    pub management_agent: Option<String>,
    pub owner_type: Option<String>,
}

impl Device {
    /// Display label: device name, falling back to the directory id.
    pub fn label(&self) -> &str {
        self.device_name.as_deref().unwrap_or(&self.id)
    }
}

/// Envelope for Graph list endpoints: a `value` array plus an optional
/// continuation link.
#[derive(Debug, Deserialize)]
pub struct GraphListResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}
