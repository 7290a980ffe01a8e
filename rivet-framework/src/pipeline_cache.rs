use fnv::{FnvHashMap, FnvHasher};
use rivet_api::{
    RivetBlendState, RivetDepthState, RivetFormat, RivetPipelineHandle,
    RivetPrimitiveTopologyClass, RivetRasterizerState, RivetResult, RivetRootLayoutHash,
    RivetSampleCount, RivetShaderHash,
};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Everything that contributes to a graphics pipeline object. Two draws with equal keys share
/// one pipeline object no matter which recording context they come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineKey {
    pub vertex_shader: RivetShaderHash,
    pub geometry_shader: Option<RivetShaderHash>,
    pub pixel_shader: Option<RivetShaderHash>,
    pub root_layout: RivetRootLayoutHash,
    pub blend_state: RivetBlendState,
    pub depth_state: RivetDepthState,
    pub rasterizer_state: RivetRasterizerState,
    pub color_formats: Vec<RivetFormat>,
    pub depth_format: Option<RivetFormat>,
    pub sample_count: RivetSampleCount,
    pub topology_class: RivetPrimitiveTopologyClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineKey {
    pub compute_shader: RivetShaderHash,
    pub root_layout: RivetRootLayoutHash,
}

// Hash of a pipeline key
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineHash(u64);

impl GraphicsPipelineHash {
    pub fn from_key(key: &GraphicsPipelineKey) -> GraphicsPipelineHash {
        let mut hasher = FnvHasher::default();
        key.hash(&mut hasher);
        GraphicsPipelineHash(hasher.finish())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineHash(u64);

impl ComputePipelineHash {
    pub fn from_key(key: &ComputePipelineKey) -> ComputePipelineHash {
        let mut hasher = FnvHasher::default();
        key.hash(&mut hasher);
        ComputePipelineHash(hasher.finish())
    }
}

/// Turns pipeline keys into backend pipeline objects. Building is expensive, the cache in front
/// of this is what keeps it off the steady-state path.
pub trait PipelineCompiler {
    fn compile_graphics(
        &self,
        key: &GraphicsPipelineKey,
    ) -> RivetResult<RivetPipelineHandle>;

    fn compile_compute(
        &self,
        key: &ComputePipelineKey,
    ) -> RivetResult<RivetPipelineHandle>;
}

#[derive(Default)]
struct PipelineCacheInner {
    graphics: FnvHashMap<GraphicsPipelineHash, RivetPipelineHandle>,
    compute: FnvHashMap<ComputePipelineHash, RivetPipelineHandle>,
    #[cfg(debug_assertions)]
    graphics_keys: FnvHashMap<GraphicsPipelineHash, GraphicsPipelineKey>,
    #[cfg(debug_assertions)]
    compute_keys: FnvHashMap<ComputePipelineHash, ComputePipelineKey>,
    create_count: u64,
}

/// Keyed cache of built pipeline objects. Handles are never invalidated, entries live as long as
/// the cache. A failed build is not cached, an identical later request compiles again.
//
// One mutex over the map means concurrent first-compiles of the same key serialize. That is the
// desired behavior, compiling the same key twice wastes backend work.
pub struct PipelineCache {
    inner: Mutex<PipelineCacheInner>,
}

#[derive(Debug)]
pub struct PipelineCacheMetrics {
    pub graphics_count: usize,
    pub compute_count: usize,
    pub create_count: u64,
}

impl PipelineCache {
    pub fn new() -> Self {
        PipelineCache {
            inner: Mutex::new(Default::default()),
        }
    }

    pub fn get_or_create_graphics(
        &self,
        key: &GraphicsPipelineKey,
        compiler: &dyn PipelineCompiler,
    ) -> RivetResult<RivetPipelineHandle> {
        let hash = GraphicsPipelineHash::from_key(key);
        let mut guard = self.inner.lock().unwrap();

        if let Some(&handle) = guard.graphics.get(&hash) {
            #[cfg(debug_assertions)]
            debug_assert!(guard.graphics_keys.get(&hash).unwrap() == key);
            return Ok(handle);
        }

        log::trace!("compile graphics pipeline {:?}", hash);
        guard.create_count += 1;
        let handle = compiler.compile_graphics(key)?;
        let old = guard.graphics.insert(hash, handle);
        assert!(old.is_none());

        #[cfg(debug_assertions)]
        guard.graphics_keys.insert(hash, key.clone());

        Ok(handle)
    }

    pub fn get_or_create_compute(
        &self,
        key: &ComputePipelineKey,
        compiler: &dyn PipelineCompiler,
    ) -> RivetResult<RivetPipelineHandle> {
        let hash = ComputePipelineHash::from_key(key);
        let mut guard = self.inner.lock().unwrap();

        if let Some(&handle) = guard.compute.get(&hash) {
            #[cfg(debug_assertions)]
            debug_assert!(guard.compute_keys.get(&hash).unwrap() == key);
            return Ok(handle);
        }

        log::trace!("compile compute pipeline {:?}", hash);
        guard.create_count += 1;
        let handle = compiler.compile_compute(key)?;
        let old = guard.compute.insert(hash, handle);
        assert!(old.is_none());

        #[cfg(debug_assertions)]
        guard.compute_keys.insert(hash, key.clone());

        Ok(handle)
    }

    pub fn metrics(&self) -> PipelineCacheMetrics {
        let guard = self.inner.lock().unwrap();
        PipelineCacheMetrics {
            graphics_count: guard.graphics.len(),
            compute_count: guard.compute.len(),
            create_count: guard.create_count,
        }
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_api::RivetError;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Assigns sequential handles and can be told to fail
    #[derive(Default)]
    struct CountingCompiler {
        next_handle: AtomicU64,
        fail: std::sync::atomic::AtomicBool,
    }

    impl PipelineCompiler for CountingCompiler {
        fn compile_graphics(
            &self,
            _key: &GraphicsPipelineKey,
        ) -> RivetResult<RivetPipelineHandle> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(RivetError::CompilationFailed("shader rejected".to_string()));
            }
            Ok(RivetPipelineHandle(
                self.next_handle.fetch_add(1, Ordering::Relaxed),
            ))
        }

        fn compile_compute(
            &self,
            _key: &ComputePipelineKey,
        ) -> RivetResult<RivetPipelineHandle> {
            self.compile_graphics(&test_graphics_key(0))
        }
    }

    fn test_graphics_key(vertex_shader: u64) -> GraphicsPipelineKey {
        GraphicsPipelineKey {
            vertex_shader: RivetShaderHash(vertex_shader),
            geometry_shader: None,
            pixel_shader: Some(RivetShaderHash(100)),
            root_layout: RivetRootLayoutHash(1),
            blend_state: Default::default(),
            depth_state: Default::default(),
            rasterizer_state: Default::default(),
            color_formats: vec![RivetFormat::B8G8R8A8Unorm],
            depth_format: Some(RivetFormat::D32Float),
            sample_count: RivetSampleCount::SampleCount1,
            topology_class: RivetPrimitiveTopologyClass::Triangle,
        }
    }

    #[test]
    fn equal_keys_share_one_pipeline() {
        let cache = PipelineCache::new();
        let compiler = CountingCompiler::default();

        let a = cache
            .get_or_create_graphics(&test_graphics_key(1), &compiler)
            .unwrap();
        let b = cache
            .get_or_create_graphics(&test_graphics_key(1), &compiler)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.metrics().create_count, 1);

        let c = cache
            .get_or_create_graphics(&test_graphics_key(2), &compiler)
            .unwrap();
        assert_ne!(a, c);
        assert_eq!(cache.metrics().create_count, 2);
        assert_eq!(cache.metrics().graphics_count, 2);
    }

    #[test]
    fn failed_compiles_are_not_cached() {
        let cache = PipelineCache::new();
        let compiler = CountingCompiler::default();

        compiler.fail.store(true, Ordering::Relaxed);
        let result = cache.get_or_create_graphics(&test_graphics_key(1), &compiler);
        assert!(matches!(result, Err(RivetError::CompilationFailed(_))));
        assert_eq!(cache.metrics().graphics_count, 0);

        // The same key compiles successfully once the compiler recovers
        compiler.fail.store(false, Ordering::Relaxed);
        cache
            .get_or_create_graphics(&test_graphics_key(1), &compiler)
            .unwrap();
        assert_eq!(cache.metrics().graphics_count, 1);
    }

    #[test]
    fn graphics_and_compute_maps_are_independent() {
        let cache = PipelineCache::new();
        let compiler = CountingCompiler::default();

        let key = ComputePipelineKey {
            compute_shader: RivetShaderHash(7),
            root_layout: RivetRootLayoutHash(1),
        };
        let a = cache.get_or_create_compute(&key, &compiler).unwrap();
        let b = cache.get_or_create_compute(&key, &compiler).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.metrics().compute_count, 1);
        assert_eq!(cache.metrics().graphics_count, 0);
    }
}
