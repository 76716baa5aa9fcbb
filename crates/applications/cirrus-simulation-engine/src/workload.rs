//! Workload classes and the VM/task bundles generated for them
//!
//! Every subordinate is provisioned from a static table keyed by workload
//! class. Generation is pure: the same class and starting ids always give the
//! same bundle.

use std::collections::HashMap;

use cirrus_core::{CreationFailure, TaskDescriptor, VmDescriptor};
use serde::{Deserialize, Serialize};

/// Workload class requested for a subordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadClass {
    Light,
    Medium,
    Heavy,
    Initial,
    Peak,
    Late,
    /// Well-formed label with no table entry (gets the default bundle)
    Unrecognized(String),
}

impl WorkloadClass {
    /// Parse a label, case-insensitively, with or without the `Workload`
    /// suffix. Never fails.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        let lower = trimmed.to_ascii_lowercase();
        let stem = lower.strip_suffix("workload").unwrap_or(&lower);

        match stem {
            "light" => WorkloadClass::Light,
            "medium" => WorkloadClass::Medium,
            "heavy" => WorkloadClass::Heavy,
            "initial" => WorkloadClass::Initial,
            "peak" => WorkloadClass::Peak,
            "late" => WorkloadClass::Late,
            _ => WorkloadClass::Unrecognized(trimmed.to_string()),
        }
    }

    /// Validate the label carried by a create request and parse it
    pub fn from_request(label: Option<&str>) -> Result<Self, CreationFailure> {
        let label = label.ok_or(CreationFailure::MissingWorkload)?;
        if label.trim().is_empty() || label.chars().any(char::is_control) {
            return Err(CreationFailure::MalformedWorkload(label.to_string()));
        }
        Ok(Self::parse(label))
    }

    pub fn label(&self) -> &str {
        match self {
            WorkloadClass::Light => "LightWorkload",
            WorkloadClass::Medium => "MediumWorkload",
            WorkloadClass::Heavy => "HeavyWorkload",
            WorkloadClass::Initial => "InitialWorkload",
            WorkloadClass::Peak => "PeakWorkload",
            WorkloadClass::Late => "LateWorkload",
            WorkloadClass::Unrecognized(label) => label,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, WorkloadClass::Unrecognized(_))
    }
}

impl std::fmt::Display for WorkloadClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Sizing of one workload class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBundleSpec {
    pub vm_count: u32,
    pub mips_per_core: u32,
    pub cores_per_vm: u32,
    pub ram_mb: u32,
    pub bandwidth: u64,
    pub disk_mb: u64,
    pub task_count: u32,
    /// Length of the first task (million instructions)
    pub base_task_length: u64,
    /// Added per task index, must be positive
    pub length_increment: u64,
    pub cores_per_task: u32,
    pub input_size: u64,
    pub output_size: u64,
}

impl ResourceBundleSpec {
    pub fn task_length(&self, index: u32) -> u64 {
        self.base_task_length + index as u64 * self.length_increment
    }
}

const LIGHT: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 2,
    mips_per_core: 1000,
    cores_per_vm: 1,
    ram_mb: 512,
    bandwidth: 1000,
    disk_mb: 10000,
    task_count: 3,
    base_task_length: 250_000,
    length_increment: 50_000,
    cores_per_task: 1,
    input_size: 300,
    output_size: 300,
};

const MEDIUM: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 3,
    mips_per_core: 1500,
    cores_per_vm: 2,
    ram_mb: 1024,
    bandwidth: 2000,
    disk_mb: 20000,
    task_count: 5,
    base_task_length: 500_000,
    length_increment: 50_000,
    cores_per_task: 2,
    input_size: 500,
    output_size: 500,
};

const HEAVY: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 4,
    mips_per_core: 2000,
    cores_per_vm: 2,
    ram_mb: 2048,
    bandwidth: 3000,
    disk_mb: 30000,
    task_count: 7,
    base_task_length: 1_000_000,
    length_increment: 50_000,
    cores_per_task: 2,
    input_size: 800,
    output_size: 800,
};

const INITIAL: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 2,
    mips_per_core: 1000,
    cores_per_vm: 1,
    ram_mb: 512,
    bandwidth: 1000,
    disk_mb: 10000,
    task_count: 3,
    base_task_length: 300_000,
    length_increment: 100_000,
    cores_per_task: 1,
    input_size: 300,
    output_size: 300,
};

const PEAK: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 4,
    mips_per_core: 2000,
    cores_per_vm: 2,
    ram_mb: 1024,
    bandwidth: 2000,
    disk_mb: 20000,
    task_count: 6,
    base_task_length: 600_000,
    length_increment: 100_000,
    cores_per_task: 2,
    input_size: 500,
    output_size: 500,
};

const LATE: ResourceBundleSpec = ResourceBundleSpec {
    vm_count: 3,
    mips_per_core: 1500,
    cores_per_vm: 1,
    ram_mb: 768,
    bandwidth: 1500,
    disk_mb: 15000,
    task_count: 4,
    base_task_length: 450_000,
    length_increment: 100_000,
    cores_per_task: 1,
    input_size: 400,
    output_size: 400,
};

/// VMs and tasks generated for one subordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub class: WorkloadClass,
    pub vms: Vec<VmDescriptor>,
    pub tasks: Vec<TaskDescriptor>,
}

/// Table of bundle specs with a fallback for unrecognized classes
#[derive(Debug, Clone)]
pub struct BundleGenerator {
    specs: HashMap<WorkloadClass, ResourceBundleSpec>,
    fallback: ResourceBundleSpec,
    vmm: String,
}

impl BundleGenerator {
    /// The table used by the global manager demos
    pub fn standard() -> Self {
        let specs = HashMap::from([
            (WorkloadClass::Light, LIGHT),
            (WorkloadClass::Medium, MEDIUM),
            (WorkloadClass::Heavy, HEAVY),
            (WorkloadClass::Initial, INITIAL),
            (WorkloadClass::Peak, PEAK),
            (WorkloadClass::Late, LATE),
        ]);

        BundleGenerator {
            specs,
            fallback: INITIAL,
            vmm: "Xen".to_string(),
        }
    }

    pub fn spec_for(&self, class: &WorkloadClass) -> &ResourceBundleSpec {
        self.specs.get(class).unwrap_or(&self.fallback)
    }

    /// Build the bundle for `class`, numbering VMs and tasks from the given ids
    pub fn generate(&self, class: &WorkloadClass, first_vm_id: u64, first_task_id: u64) -> ResourceBundle {
        let spec = self.spec_for(class);

        let vms = (0..spec.vm_count)
            .map(|i| VmDescriptor {
                id: first_vm_id + i as u64,
                mips_per_core: spec.mips_per_core,
                cores: spec.cores_per_vm,
                ram_mb: spec.ram_mb,
                bandwidth: spec.bandwidth,
                disk_mb: spec.disk_mb,
                vmm: self.vmm.clone(),
            })
            .collect();

        let tasks = (0..spec.task_count)
            .map(|i| TaskDescriptor {
                id: first_task_id + i as u64,
                length: spec.task_length(i),
                cores: spec.cores_per_task,
                input_size: spec.input_size,
                output_size: spec.output_size,
            })
            .collect();

        ResourceBundle {
            class: class.clone(),
            vms,
            tasks,
        }
    }
}

impl Default for BundleGenerator {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run-wide VM and task id counters
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next_vm_id: u64,
    next_task_id: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a bundle and advance both counters past its ids
    pub fn allocate(&mut self, generator: &BundleGenerator, class: &WorkloadClass) -> ResourceBundle {
        let bundle = generator.generate(class, self.next_vm_id, self.next_task_id);
        self.next_vm_id += bundle.vms.len() as u64;
        self.next_task_id += bundle.tasks.len() as u64;
        bundle
    }
}
