use slotmap::new_key_type;

// Strongly-typed handles
new_key_type! {
    pub struct AssetHandle;
    pub struct InstanceHandle;
    pub struct AttachmentHandle;
}

/// Owner of a render store slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKey {
    Instance(InstanceHandle),
    Attachment(AttachmentHandle),
}
