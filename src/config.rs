//! Execution configuration consulted by every ledger operation.
//!
//! The ledger never reads ambient global state. Instead, callers pass a [`LedgerConfig`]
//! describing whether memory management is active, whether a device is present and initialized,
//! and where the next consuming operation will execute.
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Where the next consuming operation executes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Host,
    Device,
}

/// Availability of accelerator support.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSupport {
    /// No device support. The ledger is a pass-through.
    Unavailable,
    /// A device exists but has never been enabled. Registrations are recorded, but
    /// pointers resolve to themselves.
    Available,
    /// The device has been enabled at least once.
    Initialized,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Whether allocations are placed under management at all.
    pub managed: bool,
    pub device: DeviceSupport,
    pub mode: ExecutionMode,
    /// Enables mode logging and invariant checks after every mutating operation.
    pub debug: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::host_only()
    }
}

impl LedgerConfig {
    /// Managed, with an initialized device, but executing on the host.
    pub const fn host_only() -> Self {
        Self {
            managed: true,
            device: DeviceSupport::Initialized,
            mode: ExecutionMode::Host,
            debug: false,
        }
    }

    /// Managed and executing on an initialized device.
    pub const fn device() -> Self {
        Self {
            mode: ExecutionMode::Device,
            ..Self::host_only()
        }
    }

    /// No memory management. Every operation is a pass-through.
    pub const fn unmanaged() -> Self {
        Self {
            managed: false,
            device: DeviceSupport::Unavailable,
            mode: ExecutionMode::Host,
            debug: false,
        }
    }

    pub fn with_mode(self, mode: ExecutionMode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_device(self, device: DeviceSupport) -> Self {
        Self { device, ..self }
    }

    pub fn with_managed(self, managed: bool) -> Self {
        Self { managed, ..self }
    }

    pub fn with_debug(self, debug: bool) -> Self {
        Self { debug, ..self }
    }

    pub fn executes_on_device(&self) -> bool {
        self.mode == ExecutionMode::Device
    }

    /// Whether registration and deregistration are pass-through.
    pub fn bypasses_registration(&self) -> bool {
        !self.managed || self.device == DeviceSupport::Unavailable
    }

    /// Whether pointer resolution and explicit transfers are pass-through.
    ///
    /// This is the case whenever registration is bypassed, and additionally while the device
    /// has never been initialized.
    pub fn bypasses_resolution(&self) -> bool {
        self.bypasses_registration() || self.device != DeviceSupport::Initialized
    }

    /// Compact bit representation of the configuration, used for mode logging.
    pub fn flags(&self) -> u8 {
        let bits = [
            self.managed,
            self.device == DeviceSupport::Initialized,
            self.device != DeviceSupport::Unavailable,
            self.device == DeviceSupport::Unavailable,
            self.mode == ExecutionMode::Host,
            self.mode == ExecutionMode::Device,
            self.debug,
        ];
        bits.iter()
            .enumerate()
            .fold(0, |acc, (i, &set)| if set { acc | (1 << i) } else { acc })
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.mode == ExecutionMode::Device && self.device != DeviceSupport::Initialized {
            return Err(LedgerError::InvalidConfig(format!(
                "device execution requires an initialized device, but device support is {:?}",
                self.device
            )));
        }
        Ok(())
    }

    /// Reads the configuration from the process environment.
    ///
    /// See [`LedgerConfig::from_lookup`] for the recognized variables.
    pub fn from_env() -> Result<Self, LedgerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from a key lookup, starting from [`LedgerConfig::host_only`].
    ///
    /// Recognized keys:
    ///
    /// - `FENRIS_MM`: `0`/`1`, whether memory management is enabled.
    /// - `FENRIS_MM_DEVICE`: `unavailable`, `available` or `initialized`.
    /// - `FENRIS_MM_MODE`: `host` or `device`.
    /// - `FENRIS_MM_DEBUG`: `0`/`1`.
    ///
    /// The resulting configuration is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::host_only();
        if let Some(value) = lookup("FENRIS_MM") {
            config.managed = parse_flag("FENRIS_MM", &value)?;
        }
        if let Some(value) = lookup("FENRIS_MM_DEVICE") {
            config.device = match value.trim().to_ascii_lowercase().as_str() {
                "unavailable" => DeviceSupport::Unavailable,
                "available" => DeviceSupport::Available,
                "initialized" => DeviceSupport::Initialized,
                other => return Err(invalid_value("FENRIS_MM_DEVICE", other)),
            };
        }
        if let Some(value) = lookup("FENRIS_MM_MODE") {
            config.mode = match value.trim().to_ascii_lowercase().as_str() {
                "host" | "cpu" => ExecutionMode::Host,
                "device" | "gpu" => ExecutionMode::Device,
                other => return Err(invalid_value("FENRIS_MM_MODE", other)),
            };
        }
        if let Some(value) = lookup("FENRIS_MM_DEBUG") {
            config.debug = parse_flag("FENRIS_MM_DEBUG", &value)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, LedgerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(invalid_value(key, other)),
    }
}

fn invalid_value(key: &str, value: &str) -> LedgerError {
    LedgerError::InvalidConfig(format!("unrecognized value '{}' for {}", value, key))
}

impl fmt::Display for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = |set: bool| if set { '+' } else { '-' };
        write!(
            f,
            "[{:#04x}] {}MM {}Initialized {}Available {}Unavailable {}Host {}Device {}Debug",
            self.flags(),
            sign(self.managed),
            sign(self.device == DeviceSupport::Initialized),
            sign(self.device != DeviceSupport::Unavailable),
            sign(self.device == DeviceSupport::Unavailable),
            sign(self.mode == ExecutionMode::Host),
            sign(self.mode == ExecutionMode::Device),
            sign(self.debug)
        )
    }
}
