#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::{RivetFormat, RivetSampleCount};

/// Highest shader register slot per stage, per category. Tables are never larger than these.
pub const MAX_SRV_SLOTS: usize = 22;
pub const MAX_CB_SLOTS: usize = 8;
pub const MAX_SAMPLER_SLOTS: usize = 16;
pub const MAX_UAV_SLOTS: usize = 8;
pub const MAX_RENDER_TARGETS: usize = 8;
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// Value identity of a GPU resource. Two views alias when their resource ids are equal, there is
/// no pointer comparison anywhere in the crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetResourceId(pub u64);

/// Which descriptor table a binding belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RivetDescriptorCategory {
    ShaderResource,
    ConstantBuffer,
    UnorderedAccess,
    Sampler,
}

/// A shader resource view. The sequence number uniquely identifies the view object, two views of
/// the same resource with different sequence numbers are distinct bindings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetShaderResourceView {
    pub resource: RivetResourceId,
    pub sequence: u64,
    /// True when the view reads the depth plane of a depth/stencil resource. Only such views can
    /// conflict with a bound depth target.
    pub targets_depth_plane: bool,
    /// True when the view was created read-only with respect to depth. A read-only view may stay
    /// bound alongside a read-only depth target.
    pub read_only_depth: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetUnorderedAccessView {
    pub resource: RivetResourceId,
    pub sequence: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetConstantBufferBinding {
    pub resource: RivetResourceId,
    pub offset: u64,
    pub size: u64,
    pub sequence: u64,
}

/// An interned sampler state. Id 0 is the default sampler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetSamplerId(pub u16);

impl RivetSamplerId {
    pub const DEFAULT: RivetSamplerId = RivetSamplerId(0);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetRenderTargetView {
    pub resource: RivetResourceId,
    pub format: RivetFormat,
    pub sample_count: RivetSampleCount,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetDepthStencilView {
    pub resource: RivetResourceId,
    pub format: RivetFormat,
    pub sample_count: RivetSampleCount,
    pub read_only_depth: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetVertexBufferBinding {
    pub resource: RivetResourceId,
    pub stride: u32,
    pub offset: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RivetIndexType {
    Uint32,
    Uint16,
}

impl Default for RivetIndexType {
    fn default() -> Self {
        RivetIndexType::Uint32
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetIndexBufferBinding {
    pub resource: RivetResourceId,
    pub index_type: RivetIndexType,
    pub offset: u64,
}

/// The unit copied into descriptor pool slots. `Null` fills slots a shader declares but the
/// caller never populated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RivetDescriptor {
    Null,
    ShaderResource(RivetShaderResourceView),
    ConstantBuffer(RivetConstantBufferBinding),
    UnorderedAccess {
        view: RivetUnorderedAccessView,
        initial_counter_value: Option<u32>,
    },
    Sampler(RivetSamplerId),
}

/// A contiguous run of pool slots, stamped with the pool generation it was reserved under.
/// Rolling the pool over invalidates every table from earlier generations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RivetDescriptorTable {
    pub generation: u64,
    pub first_slot: u32,
    pub count: u32,
}
