#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use std::hash::{Hash, Hasher};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetCompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl Default for RivetCompareOp {
    fn default() -> Self {
        RivetCompareOp::Never
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetStencilOp {
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

impl Default for RivetStencilOp {
    fn default() -> Self {
        RivetStencilOp::Keep
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetCullMode {
    None,
    Back,
    Front,
}

impl Default for RivetCullMode {
    fn default() -> Self {
        RivetCullMode::None
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetFrontFace {
    CounterClockwise,
    Clockwise,
}

impl Default for RivetFrontFace {
    fn default() -> Self {
        RivetFrontFace::CounterClockwise
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetFillMode {
    Solid,
    Wireframe,
}

impl Default for RivetFillMode {
    fn default() -> Self {
        RivetFillMode::Solid
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetBlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
}

impl Default for RivetBlendFactor {
    fn default() -> Self {
        RivetBlendFactor::Zero
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum RivetBlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl Default for RivetBlendOp {
    fn default() -> Self {
        RivetBlendOp::Add
    }
}

bitflags::bitflags! {
    /// Which color channels of a render target can be written by blending
    pub struct RivetColorFlags: u8 {
        const RED = 1;
        const GREEN = 2;
        const BLUE = 4;
        const ALPHA = 8;
        const ALL = 0x0F;
    }
}

impl Default for RivetColorFlags {
    fn default() -> Self {
        RivetColorFlags::ALL
    }
}

/// Affects depth testing and stencil usage. Commonly used to enable "Z-buffering".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetDepthState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: RivetCompareOp,
    pub stencil_test_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_depth_fail_op: RivetStencilOp,
    pub front_stencil_compare_op: RivetCompareOp,
    pub front_stencil_fail_op: RivetStencilOp,
    pub front_stencil_pass_op: RivetStencilOp,
    pub back_depth_fail_op: RivetStencilOp,
    pub back_stencil_compare_op: RivetCompareOp,
    pub back_stencil_fail_op: RivetStencilOp,
    pub back_stencil_pass_op: RivetStencilOp,
}

impl Default for RivetDepthState {
    fn default() -> Self {
        RivetDepthState {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: RivetCompareOp::LessOrEqual,
            stencil_test_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_depth_fail_op: Default::default(),
            front_stencil_compare_op: RivetCompareOp::Always,
            front_stencil_fail_op: Default::default(),
            front_stencil_pass_op: Default::default(),
            back_depth_fail_op: Default::default(),
            back_stencil_compare_op: RivetCompareOp::Always,
            back_stencil_fail_op: Default::default(),
            back_stencil_pass_op: Default::default(),
        }
    }
}

/// Affects rasterization, commonly used to enable backface culling or wireframe rendering
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct RivetRasterizerState {
    pub cull_mode: RivetCullMode,
    pub front_face: RivetFrontFace,
    pub fill_mode: RivetFillMode,
    pub depth_bias: i32,
    pub depth_bias_slope_scaled: f32,
    pub depth_clamp_enable: bool,
    pub multisample: bool,
    // Hash implemented manually below, don't forget to update it!
}

impl Eq for RivetRasterizerState {}

impl Hash for RivetRasterizerState {
    fn hash<H: Hasher>(
        &self,
        mut state: &mut H,
    ) {
        self.cull_mode.hash(&mut state);
        self.front_face.hash(&mut state);
        self.fill_mode.hash(&mut state);
        self.depth_bias.hash(&mut state);
        self.depth_bias_slope_scaled.to_bits().hash(&mut state);
        self.depth_clamp_enable.hash(&mut state);
        self.multisample.hash(&mut state);
    }
}

impl Default for RivetRasterizerState {
    fn default() -> Self {
        RivetRasterizerState {
            cull_mode: RivetCullMode::None,
            front_face: Default::default(),
            fill_mode: Default::default(),
            depth_bias: 0,
            depth_bias_slope_scaled: 0.0,
            depth_clamp_enable: false,
            multisample: false,
        }
    }
}

/// Configures blend state for a particular render target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RivetBlendStateRenderTarget {
    pub src_factor: RivetBlendFactor,
    pub dst_factor: RivetBlendFactor,
    pub src_factor_alpha: RivetBlendFactor,
    pub dst_factor_alpha: RivetBlendFactor,
    pub blend_op: RivetBlendOp,
    pub blend_op_alpha: RivetBlendOp,
    pub masks: RivetColorFlags,
}

impl Default for RivetBlendStateRenderTarget {
    fn default() -> Self {
        RivetBlendStateRenderTarget {
            blend_op: RivetBlendOp::Add,
            blend_op_alpha: RivetBlendOp::Add,
            src_factor: RivetBlendFactor::One,
            src_factor_alpha: RivetBlendFactor::One,
            dst_factor: RivetBlendFactor::Zero,
            dst_factor_alpha: RivetBlendFactor::Zero,
            masks: RivetColorFlags::ALL,
        }
    }
}

/// Affects the way the result of the pixel shader is blended into a render target. If
/// `independent_blend` is false, `render_target_blend_states[0]` is applied to every target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RivetBlendState {
    pub independent_blend: bool,
    pub render_target_blend_states: Vec<RivetBlendStateRenderTarget>,
}

impl Default for RivetBlendState {
    fn default() -> Self {
        RivetBlendState {
            independent_blend: false,
            render_target_blend_states: vec![RivetBlendStateRenderTarget::default()],
        }
    }
}
