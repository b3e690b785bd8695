//! Console state container
//!
//! Mutated only by the coordinating task; consumers read snapshots. Holds
//! the fetched device collection, per-device passwords for display, and an
//! in-flight guard that coalesces duplicate invocations of the same
//! operation. Terminal consumer of the error taxonomy: failures become
//! human-readable messages here.

use std::collections::{HashMap, HashSet};

use crate::api::ApiError;
use crate::models::Device;

#[derive(Default)]
pub struct ConsoleState {
    devices: Vec<Device>,
    passwords: HashMap<String, String>,
    in_flight: HashSet<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ConsoleState {
    /// Mark an operation as running. Returns false if the same operation is
    /// already in flight, in which case the caller must not start it again.
    pub fn begin(&mut self, op: &str) -> bool {
        if !self.in_flight.insert(op.to_string()) {
            tracing::debug!("operation already in flight: {}", op);
            return false;
        }
        self.message = None;
        self.error = None;
        true
    }

    pub fn finish(&mut self, op: &str) {
        self.in_flight.remove(op);
    }

    /// Apply a device fetch result. On failure the previously fetched
    /// collection stays as it was.
    pub fn apply_device_list(&mut self, result: Result<Vec<Device>, ApiError>) {
        match result {
            Ok(devices) => {
                self.message = Some(format!("Fetched {} devices.", devices.len()));
                self.devices = devices;
            }
            Err(e) => self.error = Some(format!("Failed to fetch devices: {e}")),
        }
    }

    /// Apply a password retrieve/rotate result for one device key.
    pub fn apply_password(&mut self, device_key: &str, result: Result<String, ApiError>) {
        match result {
            Ok(password) => {
                self.passwords.insert(device_key.to_string(), password);
                self.message = Some(format!("Password ready for {device_key}."));
            }
            Err(e) => self.error = Some(format!("Password operation failed: {e}")),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn password(&self, device_key: &str) -> Option<&str> {
        self.passwords.get(device_key).map(String::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
