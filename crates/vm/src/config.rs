//! Runtime-tunable VM limits, mirroring the reference workspace's
//! builder-with-default configuration surface.

pub const FRAMES_MAX: usize = 64;

/// Caller-supplied VM limits. `Vm::new()` uses `Default::default()`;
/// `Vm::with_config` takes an explicit one (e.g. for tests that need a
/// tiny stack to exercise overflow).
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub stack_max: usize,
    pub frames_max: usize,
    pub gc_heap_grow_factor: f64,
    pub stress_gc: bool,
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_max: FRAMES_MAX * 256,
            frames_max: FRAMES_MAX,
            gc_heap_grow_factor: rlox_core::GC_HEAP_GROW_FACTOR,
            stress_gc: cfg!(feature = "stress-gc"),
        }
    }
}
