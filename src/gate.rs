//! Device effect compatibility check.

use tracing::warn;

use crate::descriptor::EffectDescriptor;
use crate::error::{EffectError, EffectResult};
use crate::hal::{EffectsFactory, HalVersion};

/// Oldest HAL able to host device effects.
pub const MIN_DEVICE_EFFECT_HAL_VERSION: HalVersion = HalVersion::hidl(6, 0);

/// Decide whether `descriptor` may be instantiated as a device effect.
///
/// Fails with [`EffectError::Unavailable`] when there is no factory at all,
/// and with [`EffectError::IncompatibleEffect`] when the effect is not strictly
/// pre- or post-processing or the factory's HAL is older than `floor`.
pub fn check_compatibility(
    factory: Option<&dyn EffectsFactory>,
    descriptor: &EffectDescriptor,
    floor: HalVersion,
) -> EffectResult<()> {
    let factory = factory.ok_or(EffectError::Unavailable)?;
    let version = factory.version();

    if !descriptor.flags.is_device_processing() || version < floor {
        warn!(
            effect = %descriptor.name,
            effect_type = ?descriptor.flags.effect_type(),
            hal = %version,
            "non pre/post processing device effect or incompatible API version"
        );
        return Err(EffectError::IncompatibleEffect(format!(
            "{} ({:?}) on HAL {}",
            descriptor.name,
            descriptor.flags.effect_type(),
            version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use uuid::Uuid;

    use crate::descriptor::{EffectFlags, EffectType};
    use crate::device::PortId;
    use crate::hal::{HalEffect, IoHandle, SessionId};

    struct VersionOnly(HalVersion);

    impl EffectsFactory for VersionOnly {
        fn version(&self) -> HalVersion {
            self.0
        }

        fn create_effect(&self, _: &Uuid, _: SessionId, _: IoHandle, _: PortId) -> EffectResult<Arc<dyn HalEffect>> {
            Err(EffectError::Hal("not a real factory".into()))
        }
    }

    fn descriptor(effect_type: EffectType) -> EffectDescriptor {
        EffectDescriptor::new(Uuid::from_u128(1), EffectFlags::from_type(effect_type).unwrap(), "test")
    }

    #[test]
    fn accepts_pre_and_post_processing_at_floor() {
        let factory = VersionOnly(HalVersion::hidl(6, 0));
        for t in [EffectType::PreProcessing, EffectType::PostProcessing].iter() {
            assert_eq!(
                check_compatibility(Some(&factory as &dyn EffectsFactory), &descriptor(*t), MIN_DEVICE_EFFECT_HAL_VERSION),
                Ok(())
            );
        }
    }

    #[test]
    fn rejects_session_effects_on_any_version() {
        for version in [HalVersion::hidl(5, 0), HalVersion::hidl(7, 1), HalVersion::aidl(2, 0)].iter() {
            let factory = VersionOnly(*version);
            let result = check_compatibility(Some(&factory as &dyn EffectsFactory), &descriptor(EffectType::Insert), MIN_DEVICE_EFFECT_HAL_VERSION);
            assert!(matches!(result, Err(EffectError::IncompatibleEffect(_))), "{}", version);
        }
    }

    #[test]
    fn rejects_old_hal() {
        let factory = VersionOnly(HalVersion::hidl(5, 9));
        let result = check_compatibility(Some(&factory as &dyn EffectsFactory), &descriptor(EffectType::PostProcessing), MIN_DEVICE_EFFECT_HAL_VERSION);
        assert!(matches!(result, Err(EffectError::IncompatibleEffect(_))));
    }

    #[test]
    fn aidl_is_newer_than_any_hidl() {
        let factory = VersionOnly(HalVersion::aidl(1, 0));
        let result = check_compatibility(Some(&factory as &dyn EffectsFactory), &descriptor(EffectType::PreProcessing), MIN_DEVICE_EFFECT_HAL_VERSION);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn missing_factory_is_unavailable() {
        let result = check_compatibility(None, &descriptor(EffectType::PostProcessing), MIN_DEVICE_EFFECT_HAL_VERSION);
        assert_eq!(result, Err(EffectError::Unavailable));
    }
}
