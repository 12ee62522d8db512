use glam::Affine3A;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

use crate::errors::{CrowdError, Result};
use crate::math::BoneTransform;
use crate::utils::interner::{self, Symbol};

/// One entry of a reference skeleton.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: Symbol,
    /// `None` for roots
    pub parent: Option<usize>,
    /// Local transform relative to the parent
    pub rest_pose: BoneTransform,
}

impl Bone {
    #[must_use]
    pub fn new(name: &str, parent: Option<usize>, rest_pose: BoneTransform) -> Self {
        Self {
            name: interner::intern(name),
            parent,
            rest_pose,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.name)
    }
}

/// Read-only bone hierarchy shared by every asset built on it.
///
/// Parents are not required to precede their children, but every parent chain
/// must terminate; [`ReferenceSkeleton::new`] rejects cycles.
#[derive(Debug, Clone)]
pub struct ReferenceSkeleton {
    id: u64,
    name: String,
    bones: Vec<Bone>,
    name_to_index: FxHashMap<Symbol, usize>,
}

impl ReferenceSkeleton {
    pub fn new(name: &str, bones: Vec<Bone>) -> Result<Self> {
        if bones.is_empty() {
            return Err(CrowdError::EmptySkeleton(name.to_string()));
        }

        let count = bones.len();
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent
                && (parent >= count || parent == index)
            {
                return Err(CrowdError::InvalidParent {
                    bone: index,
                    parent,
                });
            }
        }

        // Any chain longer than the bone count has revisited a bone.
        for start in 0..count {
            let mut current = bones[start].parent;
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if steps > count {
                    return Err(CrowdError::SkeletonCycle { bone: start });
                }
                current = bones[parent].parent;
            }
        }

        let mut hasher = Xxh3::new();
        hasher.update(name.as_bytes());
        let mut name_to_index = FxHashMap::default();
        for (index, bone) in bones.iter().enumerate() {
            hasher.update(bone.name().as_bytes());
            let parent = bone.parent.map_or(-1_i64, |p| p as i64);
            hasher.update(&parent.to_le_bytes());
            // First bone wins on duplicated names.
            name_to_index.entry(bone.name).or_insert(index);
        }

        Ok(Self {
            id: hasher.digest(),
            name: name.to_string(),
            bones,
            name_to_index,
        })
    }

    /// Identity hash of the hierarchy (names + parents).
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    #[inline]
    #[must_use]
    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.bones.len()
    }

    #[must_use]
    pub fn bone_name(&self, index: usize) -> Option<&'static str> {
        self.bones.get(index).map(Bone::name)
    }

    /// Parent of `index`; `None` for roots and out of range indices.
    #[inline]
    #[must_use]
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|bone| bone.parent)
    }

    #[inline]
    #[must_use]
    pub fn rest_pose(&self, index: usize) -> Option<BoneTransform> {
        self.bones.get(index).map(|bone| bone.rest_pose)
    }

    #[must_use]
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        let symbol = interner::get(name)?;
        self.find_bone_symbol(symbol)
    }

    #[inline]
    #[must_use]
    pub fn find_bone_symbol(&self, name: Symbol) -> Option<usize> {
        self.name_to_index.get(&name).copied()
    }

    /// Ancestors of `index`, nearest first, excluding the bone itself.
    #[must_use]
    pub fn ancestors(&self, index: usize) -> SmallVec<[usize; 16]> {
        let mut chain = SmallVec::new();
        let mut current = self.parent_index(index);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_index(parent);
        }
        chain
    }

    /// Number of parent steps from `bone` up to `ancestor`, `Some(0)` when
    /// they are the same bone and `None` when `ancestor` is not on the chain.
    #[must_use]
    pub fn depth_below(&self, bone: usize, ancestor: usize) -> Option<usize> {
        if !self.is_valid_index(bone) {
            return None;
        }
        let mut depth = 0;
        let mut current = Some(bone);
        while let Some(index) = current {
            if index == ancestor {
                return Some(depth);
            }
            depth += 1;
            current = self.parent_index(index);
        }
        None
    }

    /// Rest pose of `index` in component space, composed through every
    /// ancestor.
    #[must_use]
    pub fn component_rest_matrix(&self, index: usize) -> Affine3A {
        let Some(bone) = self.bones.get(index) else {
            return Affine3A::IDENTITY;
        };
        let mut matrix = bone.rest_pose.to_affine();
        for parent in self.ancestors(index) {
            matrix = self.bones[parent].rest_pose.to_affine() * matrix;
        }
        matrix
    }
}
