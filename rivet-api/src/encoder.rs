use crate::{
    RivetDepthStencilView, RivetDescriptorCategory, RivetDescriptorTable, RivetIndexBufferBinding,
    RivetPipelineHandle, RivetPrimitiveTopology, RivetRenderTargetView, RivetResult,
    RivetRootLayout, RivetScissorRect, RivetShaderStage, RivetVertexBufferBinding, RivetViewport,
};

/// The sink that recorded state is flushed into. A backend implements this over its raw command
/// list. The binding cache only calls these for state that actually changed since the previous
/// flush, implementations do not need their own redundancy filtering.
pub trait RivetCommandEncoder {
    fn cmd_bind_pipeline(
        &mut self,
        pipeline: RivetPipelineHandle,
    ) -> RivetResult<()>;

    fn cmd_bind_root_layout(
        &mut self,
        layout: &RivetRootLayout,
        is_compute: bool,
    ) -> RivetResult<()>;

    /// Bind a descriptor table for one stage and category. The table was reserved and written in
    /// the pool this cache was created with.
    fn cmd_bind_descriptor_table(
        &mut self,
        stage: RivetShaderStage,
        category: RivetDescriptorCategory,
        table: RivetDescriptorTable,
    ) -> RivetResult<()>;

    fn cmd_set_viewports(
        &mut self,
        viewports: &[RivetViewport],
    ) -> RivetResult<()>;

    fn cmd_set_scissor_rects(
        &mut self,
        rects: &[RivetScissorRect],
    ) -> RivetResult<()>;

    fn cmd_set_blend_factor(
        &mut self,
        blend_factor: [f32; 4],
    ) -> RivetResult<()>;

    fn cmd_set_stencil_reference_value(
        &mut self,
        value: u32,
    ) -> RivetResult<()>;

    fn cmd_set_primitive_topology(
        &mut self,
        topology: RivetPrimitiveTopology,
    ) -> RivetResult<()>;

    /// Bindings are the full populated range starting at slot 0, `None` entries unbind.
    fn cmd_bind_vertex_buffers(
        &mut self,
        bindings: &[Option<RivetVertexBufferBinding>],
    ) -> RivetResult<()>;

    fn cmd_bind_index_buffer(
        &mut self,
        binding: Option<RivetIndexBufferBinding>,
    ) -> RivetResult<()>;

    /// Color targets are the full populated range starting at slot 0, `None` entries unbind.
    fn cmd_bind_render_targets(
        &mut self,
        color_targets: &[Option<RivetRenderTargetView>],
        depth_target: Option<RivetDepthStencilView>,
    ) -> RivetResult<()>;
}
