use sysinfo::System;
use telemetry_agent_pipeline::{
    Counters,
    Gauges,
    Sampler,
};

/// Samples host memory and per-CPU utilisation.
///
/// CPU usage is measured between two refreshes, so the very first sample
/// reports whatever the OS gives for an empty interval (usually zero).
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for HostSampler {
    fn sample(&mut self, gauges: &mut Gauges, _counters: &mut Counters) {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        // Zero means the platform does not expose memory figures.
        if total > 0 {
            gauges.extend([
                ("TotalMemory".to_string(), total as f64),
                ("FreeMemory".to_string(), self.system.free_memory() as f64),
                ("UsedMemory".to_string(), self.system.used_memory() as f64),
                ("AvailableMemory".to_string(), self.system.available_memory() as f64),
            ]);
        }

        self.system.refresh_cpu_usage();
        for (index, cpu) in self.system.cpus().iter().enumerate() {
            gauges.insert(format!("CPUutilization{}", index + 1), f64::from(cpu.cpu_usage()));
        }
    }
}
