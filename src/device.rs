//! Device identity and port descriptions.
//!
//! A device effect is keyed by the physical device it follows, not by the
//! port the routing engine happens to use for it right now. [`DeviceKey`]
//! is that identity; [`PortConfig`] is a routing-engine endpoint that
//! carries one.
//!
//! # Example
//!
//! ```
//! use devfx::{DeviceKey, DeviceType, PortConfig, PortId};
//!
//! let key = DeviceKey::new(DeviceType::Bus, "bus0");
//! let port = PortConfig::new(PortId(3), key.clone());
//! assert!(port.matches(&key));
//! assert!(!port.matches(&DeviceKey::new(DeviceType::Bus, "bus1")));
//! ```

use core::fmt;

/// Kind of physical device.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum DeviceType {
    Speaker,
    Earpiece,
    WiredHeadset,
    WiredHeadphone,
    BluetoothA2dp,
    BluetoothSco,
    Hdmi,
    UsbDevice,
    UsbHeadset,
    Bus,
    Telephony,
    BuiltinMic,
    BackMic,
    WiredHeadsetMic,
    UsbMic,
    BusInput,
}

impl DeviceType {
    /// Whether this is a capture device. Patches route to capture devices
    /// through their sources rather than their sinks.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            DeviceType::BuiltinMic
                | DeviceType::BackMic
                | DeviceType::WiredHeadsetMic
                | DeviceType::UsbMic
                | DeviceType::BusInput
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::Speaker => "SPEAKER",
            DeviceType::Earpiece => "EARPIECE",
            DeviceType::WiredHeadset => "WIRED_HEADSET",
            DeviceType::WiredHeadphone => "WIRED_HEADPHONE",
            DeviceType::BluetoothA2dp => "BLUETOOTH_A2DP",
            DeviceType::BluetoothSco => "BLUETOOTH_SCO",
            DeviceType::Hdmi => "HDMI",
            DeviceType::UsbDevice => "USB_DEVICE",
            DeviceType::UsbHeadset => "USB_HEADSET",
            DeviceType::Bus => "BUS",
            DeviceType::Telephony => "TELEPHONY_TX",
            DeviceType::BuiltinMic => "BUILTIN_MIC",
            DeviceType::BackMic => "BACK_MIC",
            DeviceType::WiredHeadsetMic => "WIRED_HEADSET_MIC",
            DeviceType::UsbMic => "USB_MIC",
            DeviceType::BusInput => "BUS_IN",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a physical device: its type plus an address.
///
/// Two keys are equal only if both the type and the address match exactly.
/// Most built-in devices have an empty address; bus and USB devices carry one.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeviceKey {
    device_type: DeviceType,
    address: String,
}

impl DeviceKey {
    pub fn new(device_type: DeviceType, address: impl Into<String>) -> Self {
        Self {
            device_type,
            address: address.into(),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} address {:?}", self.device_type, self.address)
    }
}

/// Routing-engine port identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PortId(pub i32);

/// A device endpoint of a patch.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PortConfig {
    id: PortId,
    device: DeviceKey,
}

impl PortConfig {
    pub fn new(id: PortId, device: DeviceKey) -> Self {
        Self { id, device }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn device(&self) -> &DeviceKey {
        &self.device
    }

    /// Whether this endpoint is the given device.
    pub fn matches(&self, key: &DeviceKey) -> bool {
        &self.device == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_type_and_address() {
        let a = DeviceKey::new(DeviceType::Bus, "bus0");
        assert_eq!(a, DeviceKey::new(DeviceType::Bus, "bus0"));
        assert_ne!(a, DeviceKey::new(DeviceType::Bus, "bus1"));
        assert_ne!(a, DeviceKey::new(DeviceType::BusInput, "bus0"));
    }

    #[test]
    fn input_devices() {
        assert!(DeviceType::BuiltinMic.is_input());
        assert!(!DeviceType::Speaker.is_input());
    }

    #[test]
    fn display() {
        let key = DeviceKey::new(DeviceType::Bus, "bus0");
        assert_eq!(key.to_string(), "BUS address \"bus0\"");
    }
}
