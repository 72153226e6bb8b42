use scout_logging::scout_info;
use uuid::Uuid;

use crate::store::{DurableState, StoreError, StoreKey};

/// Returns the persisted device id, generating one on first use.
pub fn ensure_device_id(state: &DurableState) -> Result<String, StoreError> {
    let mut generated = false;
    let device_id = state.modify(StoreKey::DeviceId, |existing: Option<String>| {
        Some(existing.unwrap_or_else(|| {
            generated = true;
            Uuid::new_v4().to_string()
        }))
    })?;
    let device_id = device_id.unwrap_or_default();
    if generated {
        scout_info!("Generated device id {}", device_id);
    }
    Ok(device_id)
}
