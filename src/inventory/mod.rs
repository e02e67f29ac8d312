use crate::auth::Session;
use crate::dnac::types::NetworkDevice;
use crate::dnac::Controller;
use crate::error::{Error, Result};
use crate::models::{Device, Reachability};

/// Result of classifying the inventory against a device-type allow-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Allowed type and reachable, in inventory order
    pub eligible: Vec<Device>,
    /// Allowed type but unreachable or of unknown reachability
    pub ineligible: Vec<Device>,
    /// Type not in the allow-list
    pub skipped: Vec<Device>,
}

/// Partition `all` by device type and reachability, preserving source order
pub fn classify(all: &[NetworkDevice], allowed_types: &[String]) -> Result<Classification> {
    let mut out = Classification::default();

    for raw in all {
        let device = to_device(raw)?;
        if !allowed_types.iter().any(|t| *t == device.device_type) {
            out.skipped.push(device);
        } else if device.is_reachable() {
            out.eligible.push(device);
        } else {
            out.ineligible.push(device);
        }
    }

    Ok(out)
}

pub fn to_device(raw: &NetworkDevice) -> Result<Device> {
    let hostname = raw
        .hostname
        .clone()
        .ok_or_else(|| Error::data_shape(format!("device {:?} has no hostname", raw.id)))?;
    let device_type = raw
        .device_type
        .clone()
        .ok_or_else(|| Error::data_shape(format!("device {} has no type", hostname)))?;
    let reachability = raw
        .reachability_status
        .as_deref()
        .map(Reachability::from_status)
        .ok_or_else(|| Error::data_shape(format!("device {} has no reachabilityStatus", hostname)))?;

    Ok(Device {
        id: raw.id.clone().unwrap_or_default(),
        hostname,
        device_type,
        reachability,
    })
}

/// Fetch the whole inventory, page by page, until a short page comes back
pub async fn fetch_all<C: Controller>(session: &Session<C>, page_size: u32) -> Result<Vec<NetworkDevice>> {
    let page_size = page_size.max(1);
    let mut devices = Vec::new();
    let mut offset = 1;

    loop {
        let page = session
            .controller()
            .list_devices(session.token()?, offset, page_size)
            .await?;
        let len = page.len() as u32;
        devices.extend(page);
        if len < page_size {
            break;
        }
        offset += page_size;
    }

    tracing::info!("Fetched {} devices from inventory", devices.len());
    Ok(devices)
}
