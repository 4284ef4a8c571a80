//! Soft memory budget sampling.
//!
//! Pure observation: the governor reports usage and whether the budget is
//! exceeded. Callers decide what to do with a breach — the pool only logs.

use sysinfo::{Pid, ProcessesToUpdate, System};

pub const GIB: u64 = 1024 * 1024 * 1024;

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / GIB as f64
}

/// Advisory RSS ceiling: `max_ram_gb × safety_margin`, in bytes.
///
/// A comparison value, not an enforcement mechanism.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    max_bytes: u64,
}

impl MemoryBudget {
    pub fn new(max_ram_gb: f64, safety_margin: f64) -> Self {
        Self {
            max_bytes: (max_ram_gb * safety_margin * GIB as f64) as u64,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn contains(&self, resident_bytes: u64) -> bool {
        resident_bytes < self.max_bytes
    }
}

/// One memory observation.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub resident: u64,
    pub virt: u64,
    pub percent: f32,
    pub budget: u64,
}

/// Samples this process's memory via `sysinfo`.
pub struct MemoryGovernor {
    system: System,
    pid: Pid,
    budget: MemoryBudget,
}

impl MemoryGovernor {
    pub fn new(budget: MemoryBudget) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system,
            pid: Pid::from_u32(std::process::id()),
            budget,
        }
    }

    fn refresh(&mut self) {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
    }

    /// Current resident set size in bytes.
    pub fn current_usage(&mut self) -> u64 {
        self.refresh();
        self.system.process(self.pid).map_or(0, |p| p.memory())
    }

    pub fn within_budget(&mut self) -> bool {
        let usage = self.current_usage();
        self.budget.contains(usage)
    }

    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    /// CPU usage of this process since the previous sample.
    pub fn cpu_percent(&mut self) -> f32 {
        self.refresh();
        self.system.process(self.pid).map_or(0.0, |p| p.cpu_usage())
    }

    pub fn stats(&mut self) -> MemoryStats {
        self.refresh();
        let (resident, virt) = self
            .system
            .process(self.pid)
            .map_or((0, 0), |p| (p.memory(), p.virtual_memory()));
        let total = self.system.total_memory();
        let percent = if total > 0 {
            resident as f32 / total as f32 * 100.0
        } else {
            0.0
        };
        MemoryStats {
            resident,
            virt,
            percent,
            budget: self.budget.max_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_applies_safety_margin() {
        // 1 GB with a 0.9 margin excludes 0.95 GB.
        let budget = MemoryBudget::new(1.0, 0.9);
        assert_eq!(budget.max_bytes(), (0.9 * GIB as f64) as u64);
        assert!(budget.contains((0.5 * GIB as f64) as u64));
        assert!(!budget.contains((0.95 * GIB as f64) as u64));
    }

    #[test]
    fn budget_boundary_is_exclusive() {
        let budget = MemoryBudget::new(1.0, 1.0);
        assert!(budget.contains(GIB - 1));
        assert!(!budget.contains(GIB));
    }

    #[test]
    fn governor_reports_nonzero_usage() {
        let mut governor = MemoryGovernor::new(MemoryBudget::new(1024.0, 0.9));
        assert!(governor.current_usage() > 0);
        assert!(governor.within_budget());
    }

    #[test]
    fn stats_carry_budget() {
        let budget = MemoryBudget::new(2.0, 0.5);
        let mut governor = MemoryGovernor::new(budget);
        let stats = governor.stats();
        assert_eq!(stats.budget, budget.max_bytes());
        assert!(stats.resident > 0);
        assert!(stats.percent >= 0.0);
    }

    #[test]
    fn bytes_to_gb_roundtrip() {
        assert!((bytes_to_gb(GIB) - 1.0).abs() < f64::EPSILON);
        assert!((bytes_to_gb(GIB / 2) - 0.5).abs() < f64::EPSILON);
    }
}
