#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Shader stages that can bind resources. Graphics stages come first so that per-stage arrays
/// can be walked `0..GRAPHICS_STAGE_COUNT` for draws and `COMPUTE..` for dispatches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetShaderStage {
    Vertex,
    Geometry,
    Pixel,
    Compute,
}

pub const GRAPHICS_STAGE_COUNT: usize = 3;
pub const STAGE_COUNT: usize = 4;

pub const GRAPHICS_STAGES: [RivetShaderStage; GRAPHICS_STAGE_COUNT] = [
    RivetShaderStage::Vertex,
    RivetShaderStage::Geometry,
    RivetShaderStage::Pixel,
];

pub const ALL_STAGES: [RivetShaderStage; STAGE_COUNT] = [
    RivetShaderStage::Vertex,
    RivetShaderStage::Geometry,
    RivetShaderStage::Pixel,
    RivetShaderStage::Compute,
];

impl RivetShaderStage {
    pub fn index(self) -> usize {
        match self {
            RivetShaderStage::Vertex => 0,
            RivetShaderStage::Geometry => 1,
            RivetShaderStage::Pixel => 2,
            RivetShaderStage::Compute => 3,
        }
    }

    pub fn is_compute(self) -> bool {
        self == RivetShaderStage::Compute
    }
}

bitflags::bitflags! {
    pub struct RivetShaderStageFlags: u32 {
        const VERTEX = 1;
        const GEOMETRY = 2;
        const PIXEL = 4;
        const COMPUTE = 8;
        const ALL_GRAPHICS = Self::VERTEX.bits | Self::GEOMETRY.bits | Self::PIXEL.bits;
    }
}

impl From<RivetShaderStage> for RivetShaderStageFlags {
    fn from(stage: RivetShaderStage) -> Self {
        match stage {
            RivetShaderStage::Vertex => RivetShaderStageFlags::VERTEX,
            RivetShaderStage::Geometry => RivetShaderStageFlags::GEOMETRY,
            RivetShaderStage::Pixel => RivetShaderStageFlags::PIXEL,
            RivetShaderStage::Compute => RivetShaderStageFlags::COMPUTE,
        }
    }
}

/// Hardware tier for descriptor table sizing. Tier 1 hardware requires every declared slot of a
/// table to hold a valid descriptor, so tables are sized to the shader's declared maximum. Higher
/// tiers tolerate unbound slots and tables are sized to the highest slot actually populated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetResourceBindingTier {
    Tier1,
    Tier2,
    Tier3,
}

/// Number of MSAA samples to use. 1xMSAA and 4xMSAA are most broadly supported
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetSampleCount {
    SampleCount1,
    SampleCount2,
    SampleCount4,
    SampleCount8,
    SampleCount16,
}

impl Default for RivetSampleCount {
    fn default() -> Self {
        RivetSampleCount::SampleCount1
    }
}

impl RivetSampleCount {
    pub fn as_u32(self) -> u32 {
        match self {
            RivetSampleCount::SampleCount1 => 1,
            RivetSampleCount::SampleCount2 => 2,
            RivetSampleCount::SampleCount4 => 4,
            RivetSampleCount::SampleCount8 => 8,
            RivetSampleCount::SampleCount16 => 16,
        }
    }
}

/// Texel formats, limited to what render target and depth/stencil attachments use
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetFormat {
    Undefined,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    R10G10B10A2Unorm,
    R11G11B10Float,
    R16G16B16A16Float,
    R32G32B32A32Float,
    R32Uint,
    R32Float,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

impl Default for RivetFormat {
    fn default() -> Self {
        RivetFormat::Undefined
    }
}

impl RivetFormat {
    pub fn has_depth(self) -> bool {
        match self {
            RivetFormat::D16Unorm
            | RivetFormat::D24UnormS8Uint
            | RivetFormat::D32Float
            | RivetFormat::D32FloatS8Uint => true,
            _ => false,
        }
    }

    pub fn has_stencil(self) -> bool {
        match self {
            RivetFormat::D24UnormS8Uint | RivetFormat::D32FloatS8Uint => true,
            _ => false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetPrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    PatchList,
}

/// Topology class baked into the pipeline object. Switching between topologies of the same class
/// only re-issues the topology on the encoder, switching classes rebuilds the pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetPrimitiveTopologyClass {
    Point,
    Line,
    Triangle,
    Patch,
}

impl RivetPrimitiveTopology {
    pub fn class(self) -> RivetPrimitiveTopologyClass {
        match self {
            RivetPrimitiveTopology::PointList => RivetPrimitiveTopologyClass::Point,
            RivetPrimitiveTopology::LineList | RivetPrimitiveTopology::LineStrip => {
                RivetPrimitiveTopologyClass::Line
            }
            RivetPrimitiveTopology::TriangleList | RivetPrimitiveTopology::TriangleStrip => {
                RivetPrimitiveTopologyClass::Triangle
            }
            RivetPrimitiveTopology::PatchList => RivetPrimitiveTopologyClass::Patch,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RivetViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RivetScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Init-time configuration for a binding state cache. The tier and pool capacities are fixed for
/// the lifetime of the cache.
#[derive(Debug, Copy, Clone)]
pub struct RivetBindingConfig {
    pub view_pool_capacity: u32,
    pub sampler_pool_capacity: u32,
    pub binding_tier: RivetResourceBindingTier,
}

impl Default for RivetBindingConfig {
    fn default() -> Self {
        RivetBindingConfig {
            view_pool_capacity: 500_000,
            sampler_pool_capacity: 2048,
            binding_tier: RivetResourceBindingTier::Tier1,
        }
    }
}
