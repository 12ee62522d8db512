use xxhash_rust::xxh3::Xxh3;

/// Identity of a visual renderer: instances sharing it are drawn together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderHandle(pub u64);

/// Everything that splits instances into separate renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderHandleDesc {
    pub mesh: String,
    /// Override materials, in slot order
    pub materials: Vec<String>,
    /// Name of the external instance rendering system
    pub system: String,
    pub receives_decals: bool,
    pub custom_depth: bool,
    pub stencil_value: u8,
}

impl RenderHandleDesc {
    #[must_use]
    pub fn new(mesh: &str) -> Self {
        Self {
            mesh: mesh.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_material(mut self, material: &str) -> Self {
        self.materials.push(material.to_string());
        self
    }

    #[must_use]
    pub fn handle(&self) -> RenderHandle {
        let mut hasher = Xxh3::new();
        hasher.update(self.mesh.as_bytes());
        for material in &self.materials {
            hasher.update(&[0xFF]);
            hasher.update(material.as_bytes());
        }
        hasher.update(&[0xFE]);
        hasher.update(self.system.as_bytes());
        hasher.update(&[
            u8::from(self.receives_decals),
            u8::from(self.custom_depth),
            self.stencil_value,
        ]);
        RenderHandle(hasher.digest())
    }
}
