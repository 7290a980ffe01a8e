//! Caches for GPU command encoding: a redundancy-filtering binding state cache, a keyed
//! pipeline object cache, and a bump-allocated descriptor pool with sampler table interning.
//! `rivet-api` holds the plain-data types and the traits backends implement.

mod binding_slots;
pub use binding_slots::*;

mod binding_state;
pub use binding_state::*;

mod descriptor_pool;
pub use descriptor_pool::*;

mod pipeline_cache;
pub use pipeline_cache::*;

mod sampler_table_cache;
pub use sampler_table_cache::*;
