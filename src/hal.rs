//! Collaborator interfaces: the effect HAL and the host process.
//!
//! Nothing in this module is implemented by the crate itself except
//! [`PatchListener`], which [`DeviceEffectManager`](crate::DeviceEffectManager)
//! implements and hands to the host at construction.

use core::fmt;
use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::device::{PortConfig, PortId};
use crate::effect::EffectId;
use crate::error::EffectResult;
use crate::patch::{AudioPatch, PatchHandle};

/// HAL binding flavour. Later variants compare greater.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum HalType {
    Hidl,
    Aidl,
}

/// HAL capability version.
///
/// Ordering is lexicographic on (type, major, minor), which the derive
/// provides as long as the fields stay in this order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HalVersion {
    pub hal_type: HalType,
    pub major: u16,
    pub minor: u16,
}

impl HalVersion {
    pub const fn new(hal_type: HalType, major: u16, minor: u16) -> Self {
        Self {
            hal_type,
            major,
            minor,
        }
    }

    pub const fn hidl(major: u16, minor: u16) -> Self {
        Self::new(HalType::Hidl, major, minor)
    }

    pub const fn aidl(major: u16, minor: u16) -> Self {
        Self::new(HalType::Aidl, major, minor)
    }
}

impl fmt::Display for HalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.hal_type {
            HalType::Hidl => "HIDL",
            HalType::Aidl => "AIDL",
        };
        write!(f, "{}:{}.{}", name, self.major, self.minor)
    }
}

/// Audio session an effect is created in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SessionId(pub i32);

impl SessionId {
    /// The pseudo-session all device effects live in
    pub const DEVICE: SessionId = SessionId(-2);
}

/// I/O stream handle; device effects are not attached to one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IoHandle(pub i32);

impl IoHandle {
    pub const NONE: IoHandle = IoHandle(0);
}

/// A concrete effect instance living in the HAL.
pub trait HalEffect: Send + Sync {
    /// HAL-assigned identifier, for diagnostics
    fn id(&self) -> u64;

    fn set_enabled(&self, enabled: bool) -> EffectResult<()>;
}

/// Factory for HAL effect instances.
pub trait EffectsFactory: Send + Sync {
    /// Capability version of the HAL behind this factory.
    fn version(&self) -> HalVersion;

    fn create_effect(
        &self,
        uuid: &Uuid,
        session: SessionId,
        io: IoHandle,
        device_port: PortId,
    ) -> EffectResult<Arc<dyn HalEffect>>;
}

/// Receives patch create/release events from the routing engine.
pub trait PatchListener: Send + Sync {
    fn on_create_audio_patch(&self, handle: PatchHandle, patch: &AudioPatch);

    fn on_release_audio_patch(&self, handle: PatchHandle);
}

/// Services the owning process provides to the device effect manager.
pub trait DeviceEffectHost: Send + Sync {
    /// The effect factory, or `None` when no effect HAL is present.
    fn effects_factory(&self) -> Option<Arc<dyn EffectsFactory>>;

    /// Attach an effect to the hardware port of a patch.
    fn add_effect_to_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

    /// Detach an effect from the hardware port it was attached to.
    fn remove_effect_from_hal(&self, port: &PortConfig, effect: &Arc<dyn HalEffect>) -> EffectResult<()>;

    /// Re-evaluate effects suspended on behalf of `effect_id` after its
    /// enabled state changed.
    fn check_suspend_on_effect_enabled(&self, effect_id: EffectId, enabled: bool, thread_locked: bool);

    fn is_audio_policy_ready(&self) -> bool {
        true
    }

    /// Called once when a manager is constructed.
    fn register_patch_listener(&self, _listener: Weak<dyn PatchListener>) {}
}
