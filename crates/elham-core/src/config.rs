use std::sync::RwLock;

// KernelConfig: process-wide switches for kernel execution
//
// Kernels are free functions, so their tuning knobs live in one global
// setting rather than being threaded through every call. Small arrays stay on
// the calling thread: below `parallel_threshold` elements the rayon split
// overhead outweighs the work.
//
// Environment overrides (read by `KernelConfig::from_env`):
//   ELHAM_PARALLEL            = 0 | 1 | false | true
//   ELHAM_PARALLEL_THRESHOLD  = <elements>
//
// The worker count itself is rayon's (RAYON_NUM_THREADS).

/// Tuning for CPU kernel execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Whether kernels may split work across rayon workers at all.
    pub parallel: bool,
    /// Minimum element count before a kernel goes parallel.
    pub parallel_threshold: usize,
}

impl KernelConfig {
    pub const DEFAULT: KernelConfig = KernelConfig {
        parallel: true,
        parallel_threshold: 1 << 14,
    };

    /// Enable or disable parallel kernels.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the element count at which kernels switch to rayon.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Defaults, overridden by `ELHAM_PARALLEL` / `ELHAM_PARALLEL_THRESHOLD`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var("ELHAM_PARALLEL") {
            match raw.trim() {
                "1" | "true" => cfg.parallel = true,
                "0" | "false" => cfg.parallel = false,
                other => log::warn!("ignoring ELHAM_PARALLEL={:?}", other),
            }
        }
        if let Ok(raw) = std::env::var("ELHAM_PARALLEL_THRESHOLD") {
            match raw.trim().parse::<usize>() {
                Ok(n) => cfg.parallel_threshold = n,
                Err(_) => log::warn!("ignoring ELHAM_PARALLEL_THRESHOLD={:?}", raw),
            }
        }
        cfg
    }

    /// Whether a kernel over `elem_count` elements should run in parallel.
    pub fn should_parallelize(&self, elem_count: usize) -> bool {
        self.parallel && elem_count >= self.parallel_threshold
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static KERNEL_CONFIG: RwLock<KernelConfig> = RwLock::new(KernelConfig::DEFAULT);

/// The current process-wide kernel configuration.
pub fn kernel_config() -> KernelConfig {
    match KERNEL_CONFIG.read() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Replace the process-wide kernel configuration.
pub fn set_kernel_config(cfg: KernelConfig) {
    log::debug!(
        "kernel config: parallel={} threshold={}",
        cfg.parallel,
        cfg.parallel_threshold
    );
    match KERNEL_CONFIG.write() {
        Ok(mut guard) => *guard = cfg,
        Err(poisoned) => *poisoned.into_inner() = cfg,
    }
}
