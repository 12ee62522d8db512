use bitflags::bitflags;

bitflags! {
    /// Per-instance flag byte: bit 0 marks a live slot, bits 1-7 carry the
    /// GPU bone an attachment follows.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct InstanceFlags: u8 {
        const ALIVE      = 1 << 0;
        const BONE_INDEX = 0b1111_1110;
    }
}

impl InstanceFlags {
    /// Largest bone index that fits in the flag byte.
    pub const MAX_BONE_INDEX: u8 = 0x7F;

    #[must_use]
    pub fn alive(bone_index: u8) -> Self {
        Self::from_bits_retain(Self::ALIVE.bits() | (bone_index.min(Self::MAX_BONE_INDEX) << 1))
    }

    #[must_use]
    pub fn is_alive(self) -> bool {
        self.contains(Self::ALIVE)
    }

    #[must_use]
    pub fn bone_index(self) -> u8 {
        self.bits() >> 1
    }
}

bitflags! {
    /// Fields of a render store that changed since the last flush.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFields: u8 {
        const POSITION       = 1 << 0;
        const ROTATION       = 1 << 1;
        const SCALE          = 1 << 2;
        const FLAGS          = 1 << 3;
        const CUSTOM_DATA    = 1 << 4;
        const SKELETON_INDEX = 1 << 5;
        /// The instance count grew; every field is re-sent
        const SIZE           = 1 << 6;
    }
}
