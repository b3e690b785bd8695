//! Intune device directory: macOS device listing and on-demand remediation

use super::client::ApiClient;
use super::ApiError;
use crate::models::{Device, GraphListResponse};

const DEVICE_FILTER: &str = "((deviceType eq 'macMDM') or (deviceType eq 'mac'))";
const DEVICE_FIELDS: &str = "deviceName,serialNumber,managementAgent,ownerType,complianceState,\
deviceType,operatingSystem,osVersion,lastSyncDateTime,userPrincipalName,id,\
deviceRegistrationState,managementState,enrolledDateTime,deviceEnrollmentType";

/// Hard stop when following continuation links.
const MAX_PAGES: usize = 16;

fn device_list_path() -> String {
    format!(
        "/deviceManagement/managedDevices?$filter={}&$select={}&$orderby=deviceName asc",
        DEVICE_FILTER, DEVICE_FIELDS
    )
}

/// Fetch all Intune-managed macOS devices, following continuation links and
/// sorting by display name. A later fetch replaces, never merges.
pub async fn list_devices(client: &ApiClient) -> Result<Vec<Device>, ApiError> {
    let resp = client.graph_get(&device_list_path()).await?;
    let mut page: GraphListResponse<Device> = resp.json().await.map_err(ApiError::Decode)?;

    let mut devices = std::mem::take(&mut page.value);
    let mut fetched_pages = 1;

    while let Some(link) = page.next_link.take() {
        if fetched_pages >= MAX_PAGES {
            tracing::warn!("stopping device fetch after {} pages", MAX_PAGES);
            break;
        }
        tracing::debug!("following device continuation link");
        let resp = client.graph_get_url(&link).await?;
        page = resp.json().await.map_err(ApiError::Decode)?;
        devices.append(&mut page.value);
        fetched_pages += 1;
    }

    // The server orders by deviceName; sort again locally so consumers can
    // rely on it even when pages interleave.
    devices.sort_by(|a, b| {
        a.device_name
            .as_deref()
            .unwrap_or("")
            .cmp(b.device_name.as_deref().unwrap_or(""))
    });

    tracing::debug!("fetched {} devices", devices.len());
    Ok(devices)
}

/// Trigger the MDM-deployed remediation script on one device. The full error
/// taxonomy is preserved up to the caller; only the UI flattens it.
pub async fn run_remediation(
    client: &ApiClient,
    device_id: &str,
    script_policy_id: &str,
) -> Result<(), ApiError> {
    let path = format!(
        "/deviceManagement/managedDevices/{}/initiateOnDemandProactiveRemediation",
        device_id
    );
    let body = serde_json::json!({ "scriptPolicyId": script_policy_id });

    client.graph_post(&path, &body).await?;
    tracing::info!("remediation triggered on {}", device_id);
    Ok(())
}
