use crate::{
    BindingSlotArray, ComputePipelineKey, DescriptorPool, GraphicsPipelineKey, PipelineCache,
    PipelineCompiler, SamplerTableCache, SamplerTableKey, SharedDescriptorPool,
};
use rivet_api::{
    RivetBindingConfig, RivetBlendState, RivetCommandEncoder, RivetConstantBufferBinding,
    RivetDepthStencilView, RivetDepthState, RivetDescriptor, RivetDescriptorCategory, RivetError,
    RivetFormat, RivetIndexBufferBinding, RivetPipelineHandle, RivetPrimitiveTopology,
    RivetRasterizerState, RivetRenderTargetView, RivetResidencyHook, RivetResourceBindingTier,
    RivetResourceId, RivetResult, RivetRootLayout, RivetSampleCount, RivetScissorRect,
    RivetShader, RivetShaderResourceCounts, RivetShaderResourceView, RivetShaderStage,
    RivetSamplerId, RivetUnorderedAccessView, RivetVertexBufferBinding, RivetViewport,
    ALL_STAGES, GRAPHICS_STAGES, MAX_CB_SLOTS, MAX_RENDER_TARGETS, MAX_SAMPLER_SLOTS,
    MAX_SRV_SLOTS, MAX_UAV_SLOTS, MAX_VERTEX_BUFFERS, STAGE_COUNT,
};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq)]
struct UavBinding {
    view: RivetUnorderedAccessView,
    initial_counter_value: Option<u32>,
}

/// Per-stage binding slots and their dirty bits. A dirty bit means the table bound on the
/// encoder no longer reflects the slots and must be rewritten on the next flush.
#[derive(Default)]
struct StageBindings {
    srvs: BindingSlotArray<RivetShaderResourceView, MAX_SRV_SLOTS>,
    srvs_dirty: bool,
    /// Size of the table last bound on the encoder. When every slot is unbound the flush must
    /// still replace a live non-empty table with a zero-count one.
    bound_srv_count: u32,
    /// Bound views that read the depth plane of their resource. Zero means depth target changes
    /// can skip the conflict scan for this stage.
    depth_plane_srv_count: u32,
    cbs: BindingSlotArray<RivetConstantBufferBinding, MAX_CB_SLOTS>,
    cbs_dirty: bool,
    bound_cb_count: u32,
    uavs: BindingSlotArray<UavBinding, MAX_UAV_SLOTS>,
    uavs_dirty: bool,
    bound_uav_count: u32,
    samplers: BindingSlotArray<RivetSamplerId, MAX_SAMPLER_SLOTS>,
    samplers_dirty: bool,
    bound_sampler_count: u32,
}

impl StageBindings {
    fn mark_view_tables_dirty(&mut self) {
        self.srvs_dirty = true;
        self.cbs_dirty = true;
        self.uavs_dirty = true;
    }

    fn mark_all_tables_dirty(&mut self) {
        self.mark_view_tables_dirty();
        self.samplers_dirty = true;
    }
}

struct GraphicsState {
    shaders: [Option<RivetShader>; rivet_api::GRAPHICS_STAGE_COUNT],
    root_layout: RivetRootLayout,
    needs_pipeline_rebuild: bool,
    needs_root_layout_rebind: bool,

    blend_state: RivetBlendState,
    depth_state: RivetDepthState,
    rasterizer_state: RivetRasterizerState,

    color_targets: BindingSlotArray<RivetRenderTargetView, MAX_RENDER_TARGETS>,
    depth_target: Option<RivetDepthStencilView>,
    render_targets_dirty: bool,

    viewports: Vec<RivetViewport>,
    viewports_dirty: bool,
    scissor_rects: Vec<RivetScissorRect>,
    scissor_rects_dirty: bool,
    blend_factor: [f32; 4],
    blend_factor_dirty: bool,
    stencil_reference_value: u32,
    stencil_reference_value_dirty: bool,
    topology: RivetPrimitiveTopology,
    topology_dirty: bool,

    vertex_buffers: BindingSlotArray<RivetVertexBufferBinding, MAX_VERTEX_BUFFERS>,
    vertex_buffers_dirty: bool,
    index_buffer: Option<RivetIndexBufferBinding>,
    index_buffer_dirty: bool,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            shaders: Default::default(),
            root_layout: Default::default(),
            needs_pipeline_rebuild: false,
            needs_root_layout_rebind: false,
            blend_state: Default::default(),
            depth_state: Default::default(),
            rasterizer_state: Default::default(),
            color_targets: Default::default(),
            depth_target: None,
            render_targets_dirty: false,
            viewports: Vec::new(),
            viewports_dirty: false,
            scissor_rects: Vec::new(),
            scissor_rects_dirty: false,
            blend_factor: [1.0, 1.0, 1.0, 1.0],
            blend_factor_dirty: false,
            stencil_reference_value: 0,
            stencil_reference_value_dirty: false,
            topology: RivetPrimitiveTopology::TriangleList,
            topology_dirty: false,
            vertex_buffers: Default::default(),
            vertex_buffers_dirty: false,
            index_buffer: None,
            index_buffer_dirty: false,
        }
    }
}

#[derive(Default)]
struct ComputeState {
    shader: Option<RivetShader>,
    root_layout: RivetRootLayout,
    needs_pipeline_rebuild: bool,
    needs_root_layout_rebind: bool,
}

// View tables are flushed in this order for each stage
const VIEW_CATEGORY_COUNT: usize = 3;

/// Declared register counts drive table sizing, so counts beyond the fixed slot maxima would
/// index past the slot arrays. Such shaders are malformed, their tables cover the maxima.
fn clamp_declared_counts(counts: RivetShaderResourceCounts) -> RivetShaderResourceCounts {
    let clamped = RivetShaderResourceCounts {
        sampler_count: counts.sampler_count.min(MAX_SAMPLER_SLOTS as u8),
        srv_count: counts.srv_count.min(MAX_SRV_SLOTS as u8),
        cb_count: counts.cb_count.min(MAX_CB_SLOTS as u8),
        uav_count: counts.uav_count.min(MAX_UAV_SLOTS as u8),
    };
    if clamped != counts {
        log::warn!(
            "shader declares more resource registers than the slot maxima, clamping {:?}",
            counts
        );
    }
    clamped
}

/// Tracks all binding state for one recording context and flushes only what changed. Redundant
/// `set_*` calls are filtered here so backends never see them, and descriptor tables are built
/// lazily at `apply` time out of a bump-allocated pool.
///
/// Single threaded by design, one instance per recording context. The sampler pool, sampler
/// table cache and pipeline cache are shared between contexts.
pub struct BindingStateCache {
    binding_tier: RivetResourceBindingTier,
    view_pool: DescriptorPool,
    sampler_pool: SharedDescriptorPool,
    sampler_tables: Arc<SamplerTableCache>,
    pipeline_cache: Arc<PipelineCache>,
    pipeline_compiler: Arc<dyn PipelineCompiler>,
    residency: Arc<dyn RivetResidencyHook>,

    stages: [StageBindings; STAGE_COUNT],
    graphics: GraphicsState,
    compute: ComputeState,

    current_pipeline: Option<RivetPipelineHandle>,
    pipeline_dirty: bool,

    /// Sampler pool generation seen at the last flush. Another context rolling the shared pool
    /// over invalidates our bound sampler tables, compare-and-redirty catches that.
    observed_sampler_generation: u64,
}

impl BindingStateCache {
    pub fn new(
        config: &RivetBindingConfig,
        sampler_pool: SharedDescriptorPool,
        sampler_tables: Arc<SamplerTableCache>,
        pipeline_cache: Arc<PipelineCache>,
        pipeline_compiler: Arc<dyn PipelineCompiler>,
        residency: Arc<dyn RivetResidencyHook>,
    ) -> Self {
        let observed_sampler_generation = sampler_pool.generation();
        BindingStateCache {
            binding_tier: config.binding_tier,
            view_pool: DescriptorPool::new(config.view_pool_capacity),
            sampler_pool,
            sampler_tables,
            pipeline_cache,
            pipeline_compiler,
            residency,
            stages: Default::default(),
            graphics: Default::default(),
            compute: Default::default(),
            current_pipeline: None,
            pipeline_dirty: false,
            observed_sampler_generation,
        }
    }

    pub fn binding_tier(&self) -> RivetResourceBindingTier {
        self.binding_tier
    }

    pub fn view_pool(&self) -> &DescriptorPool {
        &self.view_pool
    }

    //
    // Shaders and pipeline-affecting state
    //

    pub fn set_shader(
        &mut self,
        stage: RivetShaderStage,
        shader: Option<RivetShader>,
    ) {
        debug_assert!(!stage.is_compute(), "use set_compute_shader for compute");
        debug_assert!(shader.map_or(true, |s| s.stage == stage));
        let index = stage.index();
        if self.graphics.shaders[index] == shader {
            return;
        }

        self.graphics.shaders[index] = shader;
        self.graphics.needs_pipeline_rebuild = true;
        self.refresh_graphics_root_layout();
    }

    pub fn set_compute_shader(
        &mut self,
        shader: Option<RivetShader>,
    ) {
        debug_assert!(shader.map_or(true, |s| s.stage.is_compute()));
        if self.compute.shader == shader {
            return;
        }

        self.compute.shader = shader;
        self.compute.needs_pipeline_rebuild = true;

        let mut stage_counts: [RivetShaderResourceCounts; STAGE_COUNT] = Default::default();
        if let Some(shader) = shader {
            stage_counts[RivetShaderStage::Compute.index()] =
                clamp_declared_counts(shader.resource_counts);
        }
        let layout = RivetRootLayout::from_stage_counts(stage_counts);
        if layout.hash != self.compute.root_layout.hash {
            self.compute.root_layout = layout;
            self.compute.needs_root_layout_rebind = true;
            self.stages[RivetShaderStage::Compute.index()].mark_all_tables_dirty();
        }
    }

    fn refresh_graphics_root_layout(&mut self) {
        let mut stage_counts: [RivetShaderResourceCounts; STAGE_COUNT] = Default::default();
        for stage in GRAPHICS_STAGES.iter() {
            if let Some(shader) = self.graphics.shaders[stage.index()] {
                stage_counts[stage.index()] = clamp_declared_counts(shader.resource_counts);
            }
        }

        let layout = RivetRootLayout::from_stage_counts(stage_counts);
        if layout.hash != self.graphics.root_layout.hash {
            self.graphics.root_layout = layout;
            self.graphics.needs_root_layout_rebind = true;
            // A new table layout invalidates every table bound under the old one
            for stage in GRAPHICS_STAGES.iter() {
                self.stages[stage.index()].mark_all_tables_dirty();
            }
        }
    }

    pub fn set_blend_state(
        &mut self,
        blend_state: &RivetBlendState,
    ) {
        if self.graphics.blend_state != *blend_state {
            self.graphics.blend_state = blend_state.clone();
            self.graphics.needs_pipeline_rebuild = true;
        }
    }

    pub fn set_depth_state(
        &mut self,
        depth_state: &RivetDepthState,
    ) {
        if self.graphics.depth_state != *depth_state {
            self.graphics.depth_state = depth_state.clone();
            self.graphics.needs_pipeline_rebuild = true;
        }
    }

    pub fn set_rasterizer_state(
        &mut self,
        rasterizer_state: &RivetRasterizerState,
    ) {
        if self.graphics.rasterizer_state != *rasterizer_state {
            self.graphics.rasterizer_state = rasterizer_state.clone();
            self.graphics.needs_pipeline_rebuild = true;
        }
    }

    //
    // Render targets
    //

    pub fn set_render_targets(
        &mut self,
        color_targets: &[RivetRenderTargetView],
    ) {
        debug_assert!(color_targets.len() <= MAX_RENDER_TARGETS);
        let old_formats = self.color_formats();

        let mut changed = false;
        for slot in 0..MAX_RENDER_TARGETS {
            changed |= self
                .graphics
                .color_targets
                .set(slot, color_targets.get(slot).copied());
        }

        if changed {
            self.graphics.render_targets_dirty = true;
            if self.color_formats() != old_formats {
                self.graphics.needs_pipeline_rebuild = true;
            }
        }
    }

    pub fn set_depth_stencil_target(
        &mut self,
        depth_target: Option<RivetDepthStencilView>,
    ) {
        if self.graphics.depth_target == depth_target {
            return;
        }

        // Views of this resource's depth plane may no longer stay bound. Read-only views paired
        // with a read-only depth target are the one permitted overlap.
        if let Some(depth) = depth_target {
            for index in 0..STAGE_COUNT {
                if self.stages[index].depth_plane_srv_count == 0 {
                    continue;
                }
                let populated = self.stages[index].srvs.populated_count() as usize;
                for slot in 0..populated {
                    if let Some(view) = self.stages[index].srvs.get(slot) {
                        if view.targets_depth_plane
                            && view.resource == depth.resource
                            && !(view.read_only_depth && depth.read_only_depth)
                        {
                            self.stages[index].srvs.set(slot, None);
                            self.stages[index].srvs_dirty = true;
                            self.stages[index].depth_plane_srv_count -= 1;
                        }
                    }
                }
            }
        }

        let format_changed = self.graphics.depth_target.map(|d| (d.format, d.sample_count))
            != depth_target.map(|d| (d.format, d.sample_count));
        self.graphics.depth_target = depth_target;
        self.graphics.render_targets_dirty = true;
        if format_changed {
            self.graphics.needs_pipeline_rebuild = true;
        }
    }

    //
    // Shader resource bindings
    //

    pub fn set_shader_resource_view(
        &mut self,
        stage: RivetShaderStage,
        slot: usize,
        view: Option<RivetShaderResourceView>,
    ) {
        debug_assert!(slot < MAX_SRV_SLOTS);

        // Hazard: binding a view of the depth plane while the same resource is the writable
        // depth target. The view wins and the depth target is unbound.
        if let Some(view) = view {
            if view.targets_depth_plane {
                if let Some(depth) = self.graphics.depth_target {
                    if depth.resource == view.resource
                        && !(view.read_only_depth && depth.read_only_depth)
                    {
                        log::trace!(
                            "depth target {:?} unbound by conflicting shader resource view",
                            depth.resource
                        );
                        self.set_depth_stencil_target(None);
                    }
                }
            }
        }

        let bindings = &mut self.stages[stage.index()];
        let old = bindings.srvs.get(slot);
        if bindings.srvs.set(slot, view) {
            bindings.srvs_dirty = true;
            if old.map_or(false, |v| v.targets_depth_plane) {
                bindings.depth_plane_srv_count -= 1;
            }
            if view.map_or(false, |v| v.targets_depth_plane) {
                bindings.depth_plane_srv_count += 1;
            }
        }
    }

    /// Unbind every shader resource view of `resource` across all stages. Used when a resource
    /// is about to transition to a state incompatible with shader reads.
    pub fn clear_shader_resource_views(
        &mut self,
        resource: RivetResourceId,
    ) {
        for index in 0..STAGE_COUNT {
            let bindings = &mut self.stages[index];
            let populated = bindings.srvs.populated_count() as usize;
            for slot in 0..populated {
                if let Some(view) = bindings.srvs.get(slot) {
                    if view.resource == resource {
                        bindings.srvs.set(slot, None);
                        bindings.srvs_dirty = true;
                        if view.targets_depth_plane {
                            bindings.depth_plane_srv_count -= 1;
                        }
                    }
                }
            }
        }
    }

    pub fn set_constant_buffer(
        &mut self,
        stage: RivetShaderStage,
        slot: usize,
        binding: Option<RivetConstantBufferBinding>,
    ) {
        debug_assert!(slot < MAX_CB_SLOTS);
        let bindings = &mut self.stages[stage.index()];
        if bindings.cbs.set(slot, binding) {
            bindings.cbs_dirty = true;
        }
    }

    pub fn set_unordered_access_view(
        &mut self,
        stage: RivetShaderStage,
        slot: usize,
        view: Option<RivetUnorderedAccessView>,
        initial_counter_value: Option<u32>,
    ) {
        debug_assert!(slot < MAX_UAV_SLOTS);
        let value = view.map(|view| UavBinding {
            view,
            initial_counter_value,
        });
        let bindings = &mut self.stages[stage.index()];
        if bindings.uavs.set(slot, value) {
            bindings.uavs_dirty = true;
        }
    }

    pub fn set_sampler(
        &mut self,
        stage: RivetShaderStage,
        slot: usize,
        sampler: Option<RivetSamplerId>,
    ) {
        debug_assert!(slot < MAX_SAMPLER_SLOTS);
        let bindings = &mut self.stages[stage.index()];
        if bindings.samplers.set(slot, sampler) {
            bindings.samplers_dirty = true;
        }
    }

    //
    // Input assembly
    //

    pub fn set_vertex_buffer(
        &mut self,
        slot: usize,
        binding: Option<RivetVertexBufferBinding>,
    ) {
        debug_assert!(slot < MAX_VERTEX_BUFFERS);
        if self.graphics.vertex_buffers.set(slot, binding) {
            self.graphics.vertex_buffers_dirty = true;
        }
    }

    pub fn set_index_buffer(
        &mut self,
        binding: Option<RivetIndexBufferBinding>,
    ) {
        if self.graphics.index_buffer != binding {
            self.graphics.index_buffer = binding;
            self.graphics.index_buffer_dirty = true;
        }
    }

    pub fn set_primitive_topology(
        &mut self,
        topology: RivetPrimitiveTopology,
    ) {
        if self.graphics.topology == topology {
            return;
        }

        if self.graphics.topology.class() != topology.class() {
            self.graphics.needs_pipeline_rebuild = true;
        }
        self.graphics.topology = topology;
        self.graphics.topology_dirty = true;
    }

    //
    // Simple value state
    //

    pub fn set_viewports(
        &mut self,
        viewports: &[RivetViewport],
    ) {
        if self.graphics.viewports != viewports {
            self.graphics.viewports = viewports.to_vec();
            self.graphics.viewports_dirty = true;
        }
    }

    pub fn set_scissor_rects(
        &mut self,
        rects: &[RivetScissorRect],
    ) {
        if self.graphics.scissor_rects != rects {
            self.graphics.scissor_rects = rects.to_vec();
            self.graphics.scissor_rects_dirty = true;
        }
    }

    pub fn set_blend_factor(
        &mut self,
        blend_factor: [f32; 4],
    ) {
        if self.graphics.blend_factor != blend_factor {
            self.graphics.blend_factor = blend_factor;
            self.graphics.blend_factor_dirty = true;
        }
    }

    pub fn set_stencil_reference_value(
        &mut self,
        value: u32,
    ) {
        if self.graphics.stencil_reference_value != value {
            self.graphics.stencil_reference_value = value;
            self.graphics.stencil_reference_value_dirty = true;
        }
    }

    //
    // Bulk state transitions
    //

    /// Reset every binding to its default. The next flush re-emits the defaults.
    pub fn clear_state(&mut self) {
        self.stages = Default::default();
        self.graphics = Default::default();
        self.compute = Default::default();
        self.current_pipeline = None;
        self.pipeline_dirty = false;
        self.mark_all_dirty();
    }

    /// Redirty everything that was already set, for resuming recorded state onto a fresh
    /// encoder. Pipeline objects stay valid, they just need re-binding.
    pub fn mark_all_dirty(&mut self) {
        for bindings in self.stages.iter_mut() {
            bindings.mark_all_tables_dirty();
        }

        self.graphics.needs_root_layout_rebind = true;
        self.compute.needs_root_layout_rebind = true;
        self.pipeline_dirty = self.current_pipeline.is_some();

        self.graphics.render_targets_dirty = true;
        self.graphics.viewports_dirty = !self.graphics.viewports.is_empty();
        self.graphics.scissor_rects_dirty = !self.graphics.scissor_rects.is_empty();
        self.graphics.blend_factor_dirty = true;
        self.graphics.stencil_reference_value_dirty = true;
        self.graphics.topology_dirty = true;
        self.graphics.vertex_buffers_dirty = true;
        self.graphics.index_buffer_dirty = true;
    }

    //
    // Flush
    //

    /// Flush every pending change to the encoder. Called once per draw or dispatch, before the
    /// draw itself is recorded. Only state that changed since the last flush reaches the
    /// encoder. Fails only for pipeline compilation errors and impossible pool reservations,
    /// both of which abort the draw.
    #[profiling::function]
    pub fn apply(
        &mut self,
        encoder: &mut dyn RivetCommandEncoder,
        is_compute: bool,
    ) -> RivetResult<()> {
        // 1. Pipeline object. Rebuild the key and hit the shared cache only when some input
        //    actually changed.
        self.refresh_pipeline(is_compute)?;

        // 2. Table layout, before any descriptor tables are bound against it
        if is_compute {
            if self.compute.needs_root_layout_rebind {
                encoder.cmd_bind_root_layout(&self.compute.root_layout, true)?;
                self.compute.needs_root_layout_rebind = false;
            }
        } else if self.graphics.needs_root_layout_rebind {
            encoder.cmd_bind_root_layout(&self.graphics.root_layout, false)?;
            self.graphics.needs_root_layout_rebind = false;
        }

        // 3. Pipeline bind
        if self.pipeline_dirty {
            if let Some(pipeline) = self.current_pipeline {
                encoder.cmd_bind_pipeline(pipeline)?;
            }
            self.pipeline_dirty = false;
        }

        // 4. Graphics fixed function
        if !is_compute {
            self.flush_fixed_function(encoder)?;
        }

        let stage_indices: &[usize] = if is_compute {
            &[3]
        } else {
            &[0, 1, 2]
        };

        // 5. View tables (UAV/SRV/CB), one contiguous reservation for everything dirty
        self.flush_view_tables(encoder, stage_indices)?;

        // 6. Sampler tables, interned in the shared pool
        self.flush_sampler_tables(encoder, stage_indices)?;

        Ok(())
    }

    fn refresh_pipeline(
        &mut self,
        is_compute: bool,
    ) -> RivetResult<()> {
        if is_compute {
            if !self.compute.needs_pipeline_rebuild {
                return Ok(());
            }

            let shader = self
                .compute
                .shader
                .ok_or_else(|| RivetError::from("dispatch issued with no compute shader bound"))?;
            let key = ComputePipelineKey {
                compute_shader: shader.hash,
                root_layout: self.compute.root_layout.hash,
            };
            let handle = self
                .pipeline_cache
                .get_or_create_compute(&key, &*self.pipeline_compiler)?;
            self.compute.needs_pipeline_rebuild = false;
            if self.current_pipeline != Some(handle) {
                self.current_pipeline = Some(handle);
                self.pipeline_dirty = true;
            }
        } else {
            if !self.graphics.needs_pipeline_rebuild {
                return Ok(());
            }

            let key = self.graphics_pipeline_key()?;
            let handle = self
                .pipeline_cache
                .get_or_create_graphics(&key, &*self.pipeline_compiler)?;
            self.graphics.needs_pipeline_rebuild = false;
            if self.current_pipeline != Some(handle) {
                self.current_pipeline = Some(handle);
                self.pipeline_dirty = true;
            }
        }

        Ok(())
    }

    fn graphics_pipeline_key(&self) -> RivetResult<GraphicsPipelineKey> {
        let vertex = self.graphics.shaders[RivetShaderStage::Vertex.index()]
            .ok_or_else(|| RivetError::from("draw issued with no vertex shader bound"))?;

        Ok(GraphicsPipelineKey {
            vertex_shader: vertex.hash,
            geometry_shader: self.graphics.shaders[RivetShaderStage::Geometry.index()]
                .map(|s| s.hash),
            pixel_shader: self.graphics.shaders[RivetShaderStage::Pixel.index()].map(|s| s.hash),
            root_layout: self.graphics.root_layout.hash,
            blend_state: self.graphics.blend_state.clone(),
            depth_state: self.graphics.depth_state.clone(),
            rasterizer_state: self.graphics.rasterizer_state.clone(),
            color_formats: self.color_formats(),
            depth_format: self.graphics.depth_target.map(|d| d.format),
            sample_count: self.sample_count(),
            topology_class: self.graphics.topology.class(),
        })
    }

    fn color_formats(&self) -> Vec<RivetFormat> {
        self.graphics
            .color_targets
            .populated_slice()
            .iter()
            .map(|t| t.map_or(RivetFormat::Undefined, |t| t.format))
            .collect()
    }

    fn sample_count(&self) -> RivetSampleCount {
        for target in self.graphics.color_targets.populated_slice() {
            if let Some(target) = target {
                return target.sample_count;
            }
        }
        self.graphics
            .depth_target
            .map_or(Default::default(), |d| d.sample_count)
    }

    fn flush_fixed_function(
        &mut self,
        encoder: &mut dyn RivetCommandEncoder,
    ) -> RivetResult<()> {
        if self.graphics.render_targets_dirty {
            let color_targets = self.graphics.color_targets.populated_slice();
            for target in color_targets.iter().flatten() {
                self.residency.mark_used(target.resource);
            }
            if let Some(depth) = self.graphics.depth_target {
                self.residency.mark_used(depth.resource);
            }
            encoder.cmd_bind_render_targets(color_targets, self.graphics.depth_target)?;
            self.graphics.render_targets_dirty = false;
        }

        if self.graphics.viewports_dirty {
            if !self.graphics.viewports.is_empty() {
                encoder.cmd_set_viewports(&self.graphics.viewports)?;
            }
            self.graphics.viewports_dirty = false;
        }

        if self.graphics.scissor_rects_dirty {
            if !self.graphics.scissor_rects.is_empty() {
                encoder.cmd_set_scissor_rects(&self.graphics.scissor_rects)?;
            }
            self.graphics.scissor_rects_dirty = false;
        }

        if self.graphics.blend_factor_dirty {
            encoder.cmd_set_blend_factor(self.graphics.blend_factor)?;
            self.graphics.blend_factor_dirty = false;
        }

        if self.graphics.stencil_reference_value_dirty {
            encoder.cmd_set_stencil_reference_value(self.graphics.stencil_reference_value)?;
            self.graphics.stencil_reference_value_dirty = false;
        }

        if self.graphics.topology_dirty {
            encoder.cmd_set_primitive_topology(self.graphics.topology)?;
            self.graphics.topology_dirty = false;
        }

        if self.graphics.vertex_buffers_dirty {
            let bindings = self.graphics.vertex_buffers.populated_slice();
            for binding in bindings.iter().flatten() {
                self.residency.mark_used(binding.resource);
            }
            encoder.cmd_bind_vertex_buffers(bindings)?;
            self.graphics.vertex_buffers_dirty = false;
        }

        if self.graphics.index_buffer_dirty {
            if let Some(binding) = self.graphics.index_buffer {
                self.residency.mark_used(binding.resource);
            }
            encoder.cmd_bind_index_buffer(self.graphics.index_buffer)?;
            self.graphics.index_buffer_dirty = false;
        }

        Ok(())
    }

    fn declared_counts(
        &self,
        index: usize,
    ) -> RivetShaderResourceCounts {
        if index == RivetShaderStage::Compute.index() {
            self.compute.root_layout.stage_counts[index]
        } else {
            self.graphics.root_layout.stage_counts[index]
        }
    }

    /// Table size for one stage and category. Tier 1 hardware reads every declared slot, so
    /// tables cover the shader's declared range. Higher tiers only need the populated range.
    fn table_size(
        &self,
        declared: u8,
        populated: u32,
    ) -> u32 {
        match self.binding_tier {
            RivetResourceBindingTier::Tier1 => populated.max(declared as u32),
            RivetResourceBindingTier::Tier2 | RivetResourceBindingTier::Tier3 => populated,
        }
    }

    fn flush_view_tables(
        &mut self,
        encoder: &mut dyn RivetCommandEncoder,
        stage_indices: &[usize],
    ) -> RivetResult<()> {
        let mut sizes = [[0u32; VIEW_CATEGORY_COUNT]; STAGE_COUNT];
        let mut first_slot = 0;
        let mut total = 0;

        // Two attempts: if the pool cannot take the reservation, roll it over once and
        // recompute. The rollover dirties every view table, so the totals must be recomputed
        // from scratch. A total beyond pool capacity can never succeed and fails instead of
        // rolling again.
        for attempt in 0..2 {
            total = 0;
            for &index in stage_indices {
                let declared = self.declared_counts(index);
                let stage = &self.stages[index];
                sizes[index][0] = if stage.uavs_dirty {
                    self.table_size(declared.uav_count, stage.uavs.populated_count())
                } else {
                    0
                };
                sizes[index][1] = if stage.srvs_dirty {
                    self.table_size(declared.srv_count, stage.srvs.populated_count())
                } else {
                    0
                };
                sizes[index][2] = if stage.cbs_dirty {
                    self.table_size(declared.cb_count, stage.cbs.populated_count())
                } else {
                    0
                };
                total += sizes[index][0] + sizes[index][1] + sizes[index][2];
            }

            if total > self.view_pool.capacity() {
                return Err(RivetError::CapacityExceeded {
                    required: total,
                    capacity: self.view_pool.capacity(),
                });
            }

            if self.view_pool.can_reserve(total) {
                first_slot = self.view_pool.reserve(total)?;
                break;
            }

            debug_assert_eq!(attempt, 0);
            self.view_pool.roll_over();
            // Every live view table came from the old generation
            for bindings in self.stages.iter_mut() {
                bindings.mark_view_tables_dirty();
            }
        }

        let mut cursor = first_slot;
        for &index in stage_indices {
            let stage_enum = ALL_STAGES[index];

            if self.stages[index].uavs_dirty {
                let size = sizes[index][0];
                if size > 0 {
                    self.write_uav_table(index, cursor, size);
                    let table = self.view_pool.table(cursor, size);
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::UnorderedAccess,
                        table,
                    )?;
                    cursor += size;
                    self.stages[index].bound_uav_count = size;
                } else if self.stages[index].bound_uav_count > 0 {
                    // Every slot was unbound, the table on the encoder must not stay live
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::UnorderedAccess,
                        self.view_pool.table(cursor, 0),
                    )?;
                    self.stages[index].bound_uav_count = 0;
                }
                self.stages[index].uavs_dirty = false;
            }

            if self.stages[index].srvs_dirty {
                let size = sizes[index][1];
                if size > 0 {
                    self.write_srv_table(index, cursor, size);
                    let table = self.view_pool.table(cursor, size);
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::ShaderResource,
                        table,
                    )?;
                    cursor += size;
                    self.stages[index].bound_srv_count = size;
                } else if self.stages[index].bound_srv_count > 0 {
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::ShaderResource,
                        self.view_pool.table(cursor, 0),
                    )?;
                    self.stages[index].bound_srv_count = 0;
                }
                self.stages[index].srvs_dirty = false;
            }

            if self.stages[index].cbs_dirty {
                let size = sizes[index][2];
                if size > 0 {
                    self.write_cb_table(index, cursor, size);
                    let table = self.view_pool.table(cursor, size);
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::ConstantBuffer,
                        table,
                    )?;
                    cursor += size;
                    self.stages[index].bound_cb_count = size;
                } else if self.stages[index].bound_cb_count > 0 {
                    encoder.cmd_bind_descriptor_table(
                        stage_enum,
                        RivetDescriptorCategory::ConstantBuffer,
                        self.view_pool.table(cursor, 0),
                    )?;
                    self.stages[index].bound_cb_count = 0;
                }
                self.stages[index].cbs_dirty = false;
            }
        }
        debug_assert_eq!(cursor, first_slot + total);

        Ok(())
    }

    fn write_uav_table(
        &mut self,
        index: usize,
        first_slot: u32,
        size: u32,
    ) {
        let mut descriptors = Vec::with_capacity(size as usize);
        for slot in 0..size as usize {
            let descriptor = match self.stages[index].uavs.get(slot) {
                Some(binding) => {
                    self.residency.mark_used(binding.view.resource);
                    RivetDescriptor::UnorderedAccess {
                        view: binding.view,
                        initial_counter_value: binding.initial_counter_value,
                    }
                }
                None => RivetDescriptor::Null,
            };
            descriptors.push(descriptor);
        }
        self.view_pool.write(first_slot, &descriptors);
    }

    fn write_srv_table(
        &mut self,
        index: usize,
        first_slot: u32,
        size: u32,
    ) {
        let mut descriptors = Vec::with_capacity(size as usize);
        for slot in 0..size as usize {
            let descriptor = match self.stages[index].srvs.get(slot) {
                Some(view) => {
                    self.residency.mark_used(view.resource);
                    RivetDescriptor::ShaderResource(view)
                }
                None => RivetDescriptor::Null,
            };
            descriptors.push(descriptor);
        }
        self.view_pool.write(first_slot, &descriptors);
    }

    fn write_cb_table(
        &mut self,
        index: usize,
        first_slot: u32,
        size: u32,
    ) {
        let mut descriptors = Vec::with_capacity(size as usize);
        for slot in 0..size as usize {
            let descriptor = match self.stages[index].cbs.get(slot) {
                Some(binding) => {
                    self.residency.mark_used(binding.resource);
                    RivetDescriptor::ConstantBuffer(binding)
                }
                None => RivetDescriptor::Null,
            };
            descriptors.push(descriptor);
        }
        self.view_pool.write(first_slot, &descriptors);
    }

    fn sampler_table_size(
        &self,
        index: usize,
    ) -> u32 {
        self.table_size(
            self.declared_counts(index).sampler_count,
            self.stages[index].samplers.populated_count(),
        )
    }

    fn flush_sampler_tables(
        &mut self,
        encoder: &mut dyn RivetCommandEncoder,
        stage_indices: &[usize],
    ) -> RivetResult<()> {
        let mut sampler_sizes = [0u32; STAGE_COUNT];
        let sampler_pool = self.sampler_pool.clone();
        let mut pool = sampler_pool.lock();

        // A rollover of the shared pool by any context invalidates our bound tables. Compared
        // under the lock, a rollover cannot slip in between this check and the flush below.
        if pool.generation() != self.observed_sampler_generation {
            for bindings in self.stages.iter_mut() {
                bindings.samplers_dirty = true;
            }
        }

        for attempt in 0..2 {
            let mut total = 0;
            for &index in stage_indices {
                sampler_sizes[index] = if self.stages[index].samplers_dirty {
                    self.sampler_table_size(index)
                } else {
                    0
                };
                total += sampler_sizes[index];
            }

            if total > pool.capacity() {
                return Err(RivetError::CapacityExceeded {
                    required: total,
                    capacity: pool.capacity(),
                });
            }

            if !pool.can_reserve(total) {
                debug_assert_eq!(attempt, 0);
                pool.roll_over();
                // Tables interned under the old generation are dead, every stage rebinds
                for bindings in self.stages.iter_mut() {
                    bindings.samplers_dirty = true;
                }
                continue;
            }

            // The reservation assumes every table misses the intern cache. Hits hand their
            // share of the reservation back through set_next_slot below.
            let first_slot = pool.reserve(total)?;
            let mut cursor = first_slot;

            for &index in stage_indices {
                if !self.stages[index].samplers_dirty {
                    continue;
                }

                let size = sampler_sizes[index];
                if size > 0 {
                    let mut slots = Vec::with_capacity(size as usize);
                    for slot in 0..size as usize {
                        slots.push(self.stages[index].samplers.get(slot));
                    }
                    let key = SamplerTableKey::from_slots(&slots);

                    let table = match self.sampler_tables.find(&key, pool.generation()) {
                        Some(table) => table,
                        None => {
                            let descriptors: Vec<RivetDescriptor> = key.sampler_ids
                                [..size as usize]
                                .iter()
                                .map(|&id| RivetDescriptor::Sampler(id))
                                .collect();
                            pool.write(cursor, &descriptors);
                            let table = pool.table(cursor, size);
                            cursor += size;
                            self.sampler_tables.insert(&key, table);
                            table
                        }
                    };

                    encoder.cmd_bind_descriptor_table(
                        ALL_STAGES[index],
                        RivetDescriptorCategory::Sampler,
                        table,
                    )?;
                    self.stages[index].bound_sampler_count = size;
                } else if self.stages[index].bound_sampler_count > 0 {
                    // Every sampler was unbound, replace the live table with an empty one
                    encoder.cmd_bind_descriptor_table(
                        ALL_STAGES[index],
                        RivetDescriptorCategory::Sampler,
                        pool.table(cursor, 0),
                    )?;
                    self.stages[index].bound_sampler_count = 0;
                }
                self.stages[index].samplers_dirty = false;
            }

            pool.set_next_slot(cursor);
            break;
        }

        self.observed_sampler_generation = pool.generation();
        Ok(())
    }
}
