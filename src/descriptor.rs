//! Static effect descriptions.

use core::fmt;

use uuid::Uuid;

use crate::error::{EffectError, EffectResult};

/// Category encoded in the type field of [`EffectFlags`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectType {
    Insert,
    Auxiliary,
    Replace,
    PreProcessing,
    PostProcessing,
    /// A type field value with no named category (5 to 7). Values that alias
    /// a named category are rejected by [`EffectFlags::from_type`].
    Other(u32),
}

/// Effect capability flags.
///
/// Only the type field (the low three bits) is interpreted here; the remaining
/// bits are carried through untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct EffectFlags(pub u32);

impl EffectFlags {
    pub const TYPE_MASK: u32 = 0x7;
    pub const TYPE_INSERT: u32 = 0;
    pub const TYPE_AUXILIARY: u32 = 1;
    pub const TYPE_REPLACE: u32 = 2;
    pub const TYPE_PRE_PROC: u32 = 3;
    pub const TYPE_POST_PROC: u32 = 4;

    /// Flags carrying only the given type.
    ///
    /// `Other` must hold an unnamed type field value: anything that would
    /// alias a named category or overflow [`Self::TYPE_MASK`] is `BadValue`.
    pub fn from_type(effect_type: EffectType) -> EffectResult<Self> {
        let bits = match effect_type {
            EffectType::Insert => Self::TYPE_INSERT,
            EffectType::Auxiliary => Self::TYPE_AUXILIARY,
            EffectType::Replace => Self::TYPE_REPLACE,
            EffectType::PreProcessing => Self::TYPE_PRE_PROC,
            EffectType::PostProcessing => Self::TYPE_POST_PROC,
            EffectType::Other(bits) if bits > Self::TYPE_POST_PROC && bits <= Self::TYPE_MASK => bits,
            EffectType::Other(bits) => {
                return Err(EffectError::BadValue(format!("effect type {} is not an unnamed type value", bits)))
            }
        };
        Ok(Self(bits))
    }

    pub fn effect_type(&self) -> EffectType {
        match self.0 & Self::TYPE_MASK {
            Self::TYPE_INSERT => EffectType::Insert,
            Self::TYPE_AUXILIARY => EffectType::Auxiliary,
            Self::TYPE_REPLACE => EffectType::Replace,
            Self::TYPE_PRE_PROC => EffectType::PreProcessing,
            Self::TYPE_POST_PROC => EffectType::PostProcessing,
            other => EffectType::Other(other),
        }
    }

    /// Strictly pre- or post-processing.
    pub fn is_device_processing(&self) -> bool {
        matches!(
            self.effect_type(),
            EffectType::PreProcessing | EffectType::PostProcessing
        )
    }
}

/// Immutable description of an effect implementation, as reported by the factory.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EffectDescriptor {
    /// Effect type (e.g. "acoustic echo canceler"), shared by implementations
    pub type_uuid: Uuid,
    /// This implementation
    pub uuid: Uuid,
    pub flags: EffectFlags,
    pub name: String,
    pub implementor: String,
}

impl EffectDescriptor {
    pub fn new(uuid: Uuid, flags: EffectFlags, name: impl Into<String>) -> Self {
        Self {
            type_uuid: Uuid::nil(),
            uuid,
            flags,
            name: name.into(),
            implementor: String::new(),
        }
    }

    pub fn with_type_uuid(mut self, type_uuid: Uuid) -> Self {
        self.type_uuid = type_uuid;
        self
    }

    pub fn with_implementor(mut self, implementor: impl Into<String>) -> Self {
        self.implementor = implementor.into();
        self
    }
}

impl fmt::Display for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} uuid {} flags {:#010x} ({:?})",
            self.name,
            self.uuid,
            self.flags.0,
            self.flags.effect_type()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_ignores_other_bits() {
        let flags = EffectFlags(0x0200_0000 | EffectFlags::TYPE_POST_PROC);
        assert_eq!(flags.effect_type(), EffectType::PostProcessing);
        assert!(flags.is_device_processing());
    }

    #[test]
    fn session_types_are_not_device_processing() {
        for t in [EffectType::Insert, EffectType::Auxiliary, EffectType::Replace, EffectType::Other(7)].iter() {
            assert!(!EffectFlags::from_type(*t).unwrap().is_device_processing(), "{:?}", t);
        }
    }

    #[test]
    fn other_type_cannot_alias_a_named_category() {
        for bits in 0..=EffectFlags::TYPE_POST_PROC {
            assert!(matches!(
                EffectFlags::from_type(EffectType::Other(bits)),
                Err(EffectError::BadValue(_))
            ));
        }
        assert!(EffectFlags::from_type(EffectType::Other(8)).is_err());

        let flags = EffectFlags::from_type(EffectType::Other(5)).unwrap();
        assert_eq!(flags.effect_type(), EffectType::Other(5));
        assert!(!flags.is_device_processing());
    }
}
