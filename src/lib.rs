//! Device-scoped audio effects.
//!
//! Some effects belong to a physical device rather than to a track or session:
//! echo cancellation on a microphone, equalization on a car's amplifier bus.
//! They have to follow the device no matter which session is playing, and
//! survive the routing engine moving the device from one hardware patch to
//! another.
//!
//! [`DeviceEffectManager`] keeps one [`DeviceEffectProxy`] per device, hands out
//! an [`EffectHandle`] per client, rebinds the proxy's HAL effect as patches
//! come and go, and destroys it when the last handle disconnects.
//!
//! The host process plugs in through [`DeviceEffectHost`] (HAL attach/detach,
//! the [`EffectsFactory`]) and forwards routing events through
//! [`PatchListener`].

mod descriptor;
mod device;
mod effect;
mod error;
mod gate;
mod hal;
mod handle;
mod manager;
mod patch;
mod proxy;
mod registry;

pub use descriptor::{EffectDescriptor, EffectFlags, EffectType};
pub use device::{DeviceKey, DeviceType, PortConfig, PortId};
pub use effect::{
    ClientId, DeviceEffectCallback, EffectClient, EffectEvent, EffectEvents, EffectId, EffectTarget,
    HandleId, ProxyToken,
};
pub use error::{EffectError, EffectResult};
pub use gate::{check_compatibility, MIN_DEVICE_EFFECT_HAL_VERSION};
pub use hal::{
    DeviceEffectHost, EffectsFactory, HalEffect, HalType, HalVersion, IoHandle, PatchListener, SessionId,
};
pub use handle::EffectHandle;
pub use manager::{CreateEffectRequest, CreatedEffect, DeviceEffectManager, ManagerConfig};
pub use patch::{AudioPatch, HalPatchHandle, PatchHandle, PatchSnapshot};
pub use proxy::{BindingInfo, DeviceEffectProxy};
pub use registry::{DeviceEffectMap, DeviceEffectMapGuard};
