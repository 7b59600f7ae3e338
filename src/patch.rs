//! Audio patches as reported by the routing engine

use std::collections::BTreeMap;

use crate::device::{DeviceKey, PortConfig};

/// Routing-engine handle of a patch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PatchHandle(pub i32);

/// Hardware binding handle of a patch, as assigned by the HAL.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HalPatchHandle(pub i32);

/// One active physical route.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AudioPatch {
    pub hal_handle: HalPatchHandle,
    pub sources: Vec<PortConfig>,
    pub sinks: Vec<PortConfig>,
}

impl AudioPatch {
    pub fn new(hal_handle: HalPatchHandle) -> Self {
        Self {
            hal_handle,
            sources: Vec::new(),
            sinks: Vec::new(),
        }
    }

    pub fn with_source(mut self, port: PortConfig) -> Self {
        self.sources.push(port);
        self
    }

    pub fn with_sink(mut self, port: PortConfig) -> Self {
        self.sinks.push(port);
        self
    }

    /// The endpoint that routes to `key`, if any.
    ///
    /// Output devices are looked up among the sinks, capture devices among
    /// the sources.
    pub fn endpoint_for(&self, key: &DeviceKey) -> Option<&PortConfig> {
        let ports = if key.device_type().is_input() {
            &self.sources
        } else {
            &self.sinks
        };
        ports.iter().find(|port| port.matches(key))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.sinks.is_empty()
    }
}

/// Currently known patches, ordered by handle.
pub type PatchSnapshot = BTreeMap<PatchHandle, AudioPatch>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceType, PortId};

    #[test]
    fn capture_devices_match_sources() {
        let mic = DeviceKey::new(DeviceType::BuiltinMic, "");
        let patch = AudioPatch::new(HalPatchHandle(1))
            .with_source(PortConfig::new(PortId(4), mic.clone()))
            .with_sink(PortConfig::new(PortId(5), DeviceKey::new(DeviceType::Speaker, "")));

        assert_eq!(patch.endpoint_for(&mic).map(|p| p.id()), Some(PortId(4)));

        let speaker = DeviceKey::new(DeviceType::Speaker, "");
        assert_eq!(patch.endpoint_for(&speaker).map(|p| p.id()), Some(PortId(5)));
    }

    #[test]
    fn output_devices_ignore_sources() {
        let bus = DeviceKey::new(DeviceType::Bus, "bus0");
        let patch = AudioPatch::new(HalPatchHandle(1)).with_source(PortConfig::new(PortId(1), bus.clone()));
        assert!(patch.endpoint_for(&bus).is_none());
    }
}
