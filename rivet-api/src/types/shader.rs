#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::{RivetShaderStage, STAGE_COUNT};
use fnv::FnvHasher;
use std::hash::{Hash, Hasher};

/// Content hash of compiled shader bytecode
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetShaderHash(pub u64);

impl RivetShaderHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = FnvHasher::default();
        bytes.hash(&mut hasher);
        RivetShaderHash(hasher.finish())
    }
}

/// How many registers of each category a shader declares. Used to size descriptor tables on
/// hardware that requires fully populated tables.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetShaderResourceCounts {
    pub sampler_count: u8,
    pub srv_count: u8,
    pub cb_count: u8,
    pub uav_count: u8,
}

/// An opaque handle to a compiled shader plus the metadata the binding cache needs
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetShader {
    pub hash: RivetShaderHash,
    pub stage: RivetShaderStage,
    pub resource_counts: RivetShaderResourceCounts,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RivetRootLayoutHash(pub u64);

/// The resource-table layout shared by the shaders currently bound. Derived from the per-stage
/// declared resource counts, so two shader sets with identical counts share a layout and
/// switching between them does not force a descriptor rebind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RivetRootLayout {
    pub hash: RivetRootLayoutHash,
    pub stage_counts: [RivetShaderResourceCounts; STAGE_COUNT],
}

impl RivetRootLayout {
    pub fn from_stage_counts(stage_counts: [RivetShaderResourceCounts; STAGE_COUNT]) -> Self {
        let mut hasher = FnvHasher::default();
        stage_counts.hash(&mut hasher);
        RivetRootLayout {
            hash: RivetRootLayoutHash(hasher.finish()),
            stage_counts,
        }
    }

    pub fn counts_for_stage(
        &self,
        stage: RivetShaderStage,
    ) -> &RivetShaderResourceCounts {
        &self.stage_counts[stage.index()]
    }
}

impl Default for RivetRootLayout {
    fn default() -> Self {
        RivetRootLayout::from_stage_counts(Default::default())
    }
}

/// Opaque handle to a built pipeline object. Handles are never invalidated for the lifetime of
/// the cache that produced them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetPipelineHandle(pub u64);
