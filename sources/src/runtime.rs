use sysinfo::{
    Pid,
    ProcessRefreshKind,
    ProcessesToUpdate,
    System,
};
use telemetry_agent_pipeline::{
    Counters,
    Gauges,
    Sampler,
};

/// Samples the agent's own process.
///
/// Process gauges are only reported when the OS hands out an entry for the
/// current pid. `RandomValue` and `PollCount` are updated on every sample.
pub struct RuntimeSampler {
    system: System,
    pid: Option<Pid>,
}

impl RuntimeSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                warn!("cannot resolve the agent pid, process gauges are disabled: {err}");
                None
            }
        };

        Self {
            system: System::new(),
            pid,
        }
    }

    fn sample_process(&mut self, gauges: &mut Gauges) {
        let Some(pid) = self.pid else {
            return;
        };

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_cpu().with_memory().with_disk_usage(),
        );
        let Some(process) = self.system.process(pid) else {
            trace!(%pid, "process entry unavailable");
            return;
        };

        let disk = process.disk_usage();
        gauges.extend([
            ("ResidentMemory".to_string(), process.memory() as f64),
            ("VirtualMemory".to_string(), process.virtual_memory() as f64),
            ("ProcessCPUUsage".to_string(), f64::from(process.cpu_usage())),
            ("RunTime".to_string(), process.run_time() as f64),
            ("DiskReadBytes".to_string(), disk.read_bytes as f64),
            ("DiskWrittenBytes".to_string(), disk.written_bytes as f64),
            ("TotalDiskReadBytes".to_string(), disk.total_read_bytes as f64),
            ("TotalDiskWrittenBytes".to_string(), disk.total_written_bytes as f64),
        ]);
    }
}

impl Default for RuntimeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RuntimeSampler {
    fn sample(&mut self, gauges: &mut Gauges, counters: &mut Counters) {
        self.sample_process(gauges);
        gauges.insert("RandomValue".to_string(), rand::random::<f64>());
        *counters.entry("PollCount".to_string()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_polls_and_refreshes_the_random_value() {
        let mut sampler = RuntimeSampler::new();
        let (mut gauges, mut counters) = (Gauges::new(), Counters::new());

        sampler.sample(&mut gauges, &mut counters);
        sampler.sample(&mut gauges, &mut counters);

        assert_eq!(counters["PollCount"], 2);
        let random = gauges["RandomValue"];
        assert!((0.0..1.0).contains(&random));
    }

    #[test]
    fn process_gauges_are_present_when_the_pid_resolves() {
        let mut sampler = RuntimeSampler::new();
        let (mut gauges, mut counters) = (Gauges::new(), Counters::new());
        sampler.sample(&mut gauges, &mut counters);

        let resolved = sampler.pid.and_then(|pid| sampler.system.process(pid)).is_some();
        if resolved {
            assert!(gauges["ResidentMemory"] > 0.0);
            assert!(gauges.contains_key("TotalDiskReadBytes"));
        }
    }

    #[test]
    fn without_a_pid_only_the_synthetic_metrics_are_reported() {
        let mut sampler = RuntimeSampler {
            system: System::new(),
            pid: None,
        };
        let (mut gauges, mut counters) = (Gauges::new(), Counters::new());
        sampler.sample(&mut gauges, &mut counters);

        assert_eq!(gauges.keys().collect::<Vec<_>>(), vec!["RandomValue"]);
        assert_eq!(counters["PollCount"], 1);
    }
}
