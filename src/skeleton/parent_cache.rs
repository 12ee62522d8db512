//! Rolling parent cache for GPU hierarchy evaluation.
//!
//! The GPU stage walks bones in GPU order and composes each local transform
//! with its parent's result. The parent is usually the bone evaluated right
//! before; when it is not, the parent's result must have been written to one
//! of a few cache lines. This module assigns those lines.
//!
//! Encoding, one entry per GPU bone:
//!
//! | value | read                               | write            |
//! |-------|------------------------------------|------------------|
//! | `-2`  | parent not cached, walk the chain  | -                |
//! | `-1`  | no parent, start from identity     | no write         |
//! | `0`   | parent is the previous bone        | -                |
//! | `1..` | read cache line `value - 1`        | write line `value - 1` |
//!
//! Line assignment is first-fit over [`PARENT_CACHE_LINES`] lines. Deep or
//! wide skeletons can run out of lines; affected children fall back to `-2`
//! and the bones are listed in [`ParentCache::overflowed`].

use smallvec::SmallVec;

/// Number of cache lines available to the GPU stage.
pub const PARENT_CACHE_LINES: usize = 5;

/// Read slot of a root bone / write slot of a bone that is not cached.
pub const PARENT_NONE: i32 = -1;
/// Read slot meaning "the parent is the previous bone".
pub const PARENT_PREVIOUS: i32 = 0;
/// Read slot meaning "the parent is not cached".
pub const PARENT_CHAIN: i32 = -2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentCache {
    /// Read slot per GPU bone
    pub read: Vec<i32>,
    /// Write slot per GPU bone
    pub write: Vec<i32>,
    /// Highest number of lines in use at the same time
    pub lines_used: usize,
    /// CPU bones that needed a line but found none
    pub overflowed: SmallVec<[usize; 4]>,
}

impl ParentCache {
    #[must_use]
    pub fn has_overflowed(&self) -> bool {
        !self.overflowed.is_empty()
    }
}

/// Builds the read/write slots for `ordered` CPU bones (GPU order) whose
/// direct parents are given in `parents`.
#[must_use]
pub fn build_parent_cache(ordered: &[usize], parents: &[Option<usize>]) -> ParentCache {
    debug_assert_eq!(ordered.len(), parents.len());
    let count = ordered.len();

    let mut lines: Vec<[Option<usize>; PARENT_CACHE_LINES]> = vec![[None; PARENT_CACHE_LINES]; count];
    let mut cache = ParentCache {
        read: Vec::with_capacity(count),
        write: vec![PARENT_NONE; count],
        ..Default::default()
    };

    for first_use in 0..count {
        let bone = ordered[first_use];
        let Some(last_use) = parents.iter().rposition(|&parent| parent == Some(bone)) else {
            continue;
        };
        // The next bone reads its parent directly from the previous result.
        if last_use <= first_use + 1 {
            continue;
        }

        let free_line = (0..PARENT_CACHE_LINES)
            .find(|&line| lines[first_use..last_use].iter().all(|slots| slots[line].is_none()));

        match free_line {
            Some(line) => {
                for slots in &mut lines[first_use..last_use] {
                    slots[line] = Some(bone);
                }
                cache.write[first_use] = line as i32 + 1;
                cache.lines_used = cache.lines_used.max(line + 1);
            }
            None => {
                log::warn!(
                    "Parent cache exhausted: bone {bone} needed from {first_use} to {last_use}, \
                     children fall back to chain evaluation"
                );
                cache.overflowed.push(bone);
            }
        }
    }

    for (position, parent) in parents.iter().enumerate() {
        let read = match *parent {
            None => PARENT_NONE,
            Some(parent) if position > 0 && ordered[position - 1] == parent => PARENT_PREVIOUS,
            Some(parent) if position > 0 => lines[position - 1]
                .iter()
                .position(|slot| *slot == Some(parent))
                .map_or(PARENT_CHAIN, |line| line as i32 + 1),
            Some(_) => PARENT_CHAIN,
        };
        cache.read.push(read);
    }

    cache
}
