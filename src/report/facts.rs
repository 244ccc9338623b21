//! Facts collected opportunistically from task results.
//!
//! VM identity, testbed server versions and guest OS release details are
//! printed by tasks scattered across the run. [`FACT_RULES`] maps the task
//! file that printed a value and the variable name to the field it fills;
//! [`ReportFacts::set`] is the only writer and keeps the first non-empty
//! value of every field.

use serde::Serialize;

use crate::callback::types::{ResultInfo, TaskInfo};
use crate::report::vars::TestingVars;

// ============================================================================
// Field identifiers
// ============================================================================

/// A field of [`VmInfo`], in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmField {
    Name,
    Ip,
    GuestOsType,
    HardwareVersion,
    VmtoolsVersion,
    CloudinitVersion,
    ConfigGuestId,
    GuestinfoGuestId,
    GuestinfoGuestFullName,
    GuestinfoGuestFamily,
    GuestinfoDetailedData,
}

impl VmField {
    /// All fields in the order they are reported.
    pub const ALL: [VmField; 11] = [
        VmField::Name,
        VmField::Ip,
        VmField::GuestOsType,
        VmField::HardwareVersion,
        VmField::VmtoolsVersion,
        VmField::CloudinitVersion,
        VmField::ConfigGuestId,
        VmField::GuestinfoGuestId,
        VmField::GuestinfoGuestFullName,
        VmField::GuestinfoGuestFamily,
        VmField::GuestinfoDetailedData,
    ];

    /// Row label in the VM information table.
    pub fn label(self) -> &'static str {
        match self {
            VmField::Name => "Name",
            VmField::Ip => "IP",
            VmField::GuestOsType => "Guest OS Type",
            VmField::HardwareVersion => "Hardware Version",
            VmField::VmtoolsVersion => "VMTools Version",
            VmField::CloudinitVersion => "CloudInit Version",
            VmField::ConfigGuestId => "Config Guest Id",
            VmField::GuestinfoGuestId => "GuestInfo Guest Id",
            VmField::GuestinfoGuestFullName => "GuestInfo Guest Full Name",
            VmField::GuestinfoGuestFamily => "GuestInfo Guest Family",
            VmField::GuestinfoDetailedData => "GuestInfo Detailed Data",
        }
    }
}

/// A field of [`ServerInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerField {
    Hostname,
    Version,
    Build,
    UpdateVersion,
}

/// A field of [`OsReleaseFacts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsField {
    Distribution,
    DistributionVersion,
    Architecture,
    CloudinitVersion,
    OvtVersion,
    ReleaseInfoFile,
    TestrunLogDir,
}

/// Where a collected value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactTarget {
    Vm(VmField),
    Vcenter(ServerField),
    Esxi(ServerField),
    Os(OsField),
}

// ============================================================================
// Records
// ============================================================================

/// Identity and version details of the VM under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VmInfo {
    pub name: String,
    pub ip: String,
    pub guest_os_type: String,
    pub hardware_version: String,
    pub vmtools_version: String,
    pub cloudinit_version: String,
    pub config_guest_id: String,
    pub guestinfo_guest_id: String,
    pub guestinfo_guest_full_name: String,
    pub guestinfo_guest_family: String,
    pub guestinfo_detailed_data: String,
}

impl VmInfo {
    /// Creates a record for the named VM.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the value of a field.
    pub fn get(&self, field: VmField) -> &str {
        match field {
            VmField::Name => &self.name,
            VmField::Ip => &self.ip,
            VmField::GuestOsType => &self.guest_os_type,
            VmField::HardwareVersion => &self.hardware_version,
            VmField::VmtoolsVersion => &self.vmtools_version,
            VmField::CloudinitVersion => &self.cloudinit_version,
            VmField::ConfigGuestId => &self.config_guest_id,
            VmField::GuestinfoGuestId => &self.guestinfo_guest_id,
            VmField::GuestinfoGuestFullName => &self.guestinfo_guest_full_name,
            VmField::GuestinfoGuestFamily => &self.guestinfo_guest_family,
            VmField::GuestinfoDetailedData => &self.guestinfo_detailed_data,
        }
    }

    fn slot(&mut self, field: VmField) -> &mut String {
        match field {
            VmField::Name => &mut self.name,
            VmField::Ip => &mut self.ip,
            VmField::GuestOsType => &mut self.guest_os_type,
            VmField::HardwareVersion => &mut self.hardware_version,
            VmField::VmtoolsVersion => &mut self.vmtools_version,
            VmField::CloudinitVersion => &mut self.cloudinit_version,
            VmField::ConfigGuestId => &mut self.config_guest_id,
            VmField::GuestinfoGuestId => &mut self.guestinfo_guest_id,
            VmField::GuestinfoGuestFullName => &mut self.guestinfo_guest_full_name,
            VmField::GuestinfoGuestFamily => &mut self.guestinfo_guest_family,
            VmField::GuestinfoDetailedData => &mut self.guestinfo_detailed_data,
        }
    }

    /// Whether any guest identifier says this is a Windows guest.
    pub fn is_windows(&self) -> bool {
        [
            &self.config_guest_id,
            &self.guest_os_type,
            &self.guestinfo_guest_id,
        ]
        .iter()
        .any(|v| v.to_lowercase().contains("windows"))
    }
}

/// A vCenter or ESXi server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub version: String,
    pub build: String,
    pub update_version: String,
}

impl ServerInfo {
    fn slot(&mut self, field: ServerField) -> &mut String {
        match field {
            ServerField::Hostname => &mut self.hostname,
            ServerField::Version => &mut self.version,
            ServerField::Build => &mut self.build,
            ServerField::UpdateVersion => &mut self.update_version,
        }
    }

    /// Version with the update level appended when it is a positive number.
    pub fn display_version(&self) -> String {
        match self.update_version.trim().parse::<u32>() {
            Ok(update) if update > 0 => format!("{} Update {}", self.version, update),
            _ => self.version.clone(),
        }
    }
}

/// Guest OS release details and run-level paths reported by tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsReleaseFacts {
    pub distribution: String,
    pub distribution_version: String,
    pub architecture: String,
    pub cloudinit_version: String,
    pub ovt_version: String,
    pub release_info_file: String,
    pub testrun_log_dir: String,
}

impl OsReleaseFacts {
    fn slot(&mut self, field: OsField) -> &mut String {
        match field {
            OsField::Distribution => &mut self.distribution,
            OsField::DistributionVersion => &mut self.distribution_version,
            OsField::Architecture => &mut self.architecture,
            OsField::CloudinitVersion => &mut self.cloudinit_version,
            OsField::OvtVersion => &mut self.ovt_version,
            OsField::ReleaseInfoFile => &mut self.release_info_file,
            OsField::TestrunLogDir => &mut self.testrun_log_dir,
        }
    }
}

// ============================================================================
// Rule table
// ============================================================================

/// How a task exposes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactSource {
    /// `debug: var=<name>`; the value is `result[<name>]`.
    DebugVar,
    /// `set_fact`; the value is `result.ansible_facts[<name>]`.
    SetFact,
}

/// Maps (task file, source, variable) to the fields it fills.
#[derive(Debug, Clone, Copy)]
pub struct FactRule {
    /// Task file base name; `None` matches any file.
    pub file: Option<&'static str>,
    pub source: FactSource,
    pub var: &'static str,
    pub targets: &'static [FactTarget],
}

macro_rules! rule {
    ($file:expr, $source:ident, $var:expr => $($target:expr),+ $(,)?) => {
        FactRule {
            file: $file,
            source: FactSource::$source,
            var: $var,
            targets: &[$($target),+],
        }
    };
}

use FactTarget::{Esxi, Os, Vcenter, Vm};

/// Every known (file, source, variable) → field mapping.
pub static FACT_RULES: &[FactRule] = &[
    rule!(None, DebugVar, "testrun_log_path" => Os(OsField::TestrunLogDir)),
    rule!(Some("check_inbox_driver.yml"), DebugVar, "os_release_info_file_path"
        => Os(OsField::ReleaseInfoFile)),
    rule!(Some("deploy_vm.yml"), DebugVar, "vm_guest_ip" => Vm(VmField::Ip)),
    rule!(Some("test_setup.yml"), DebugVar, "vm_guest_ip" => Vm(VmField::Ip)),
    rule!(Some("get_guest_ovt_version_build.yml"), DebugVar, "vmtools_info_from_vmtoolsd"
        => Vm(VmField::VmtoolsVersion), Os(OsField::OvtVersion)),
    rule!(Some("win_get_vmtools_version_build.yml"), DebugVar, "vmtools_info_from_vmtoolsd"
        => Vm(VmField::VmtoolsVersion)),
    rule!(Some("esxi_get_version_build.yml"), DebugVar, "esxi_hostname"
        => Esxi(ServerField::Hostname)),
    rule!(Some("esxi_get_version_build.yml"), DebugVar, "esxi_version"
        => Esxi(ServerField::Version)),
    rule!(Some("esxi_get_version_build.yml"), DebugVar, "esxi_build"
        => Esxi(ServerField::Build)),
    rule!(Some("esxi_get_version_build.yml"), DebugVar, "esxi_update_version"
        => Esxi(ServerField::UpdateVersion)),
    rule!(Some("vcenter_get_version_build.yml"), DebugVar, "vcenter_hostname"
        => Vcenter(ServerField::Hostname)),
    rule!(Some("vcenter_get_version_build.yml"), DebugVar, "vcenter_version"
        => Vcenter(ServerField::Version)),
    rule!(Some("vcenter_get_version_build.yml"), DebugVar, "vcenter_build"
        => Vcenter(ServerField::Build)),
    rule!(Some("cloudinit_pkg_check.yml"), DebugVar, "cloudinit_version"
        => Vm(VmField::CloudinitVersion), Os(OsField::CloudinitVersion)),
    rule!(Some("get_guest_system_info.yml"), SetFact, "guest_os_ansible_distribution"
        => Os(OsField::Distribution)),
    rule!(Some("get_guest_system_info.yml"), SetFact, "guest_os_ansible_distribution_ver"
        => Os(OsField::DistributionVersion)),
    rule!(Some("get_guest_system_info.yml"), SetFact, "guest_os_ansible_architecture"
        => Os(OsField::Architecture)),
    rule!(Some("vm_get_vm_info.yml"), SetFact, "vm_guest_id" => Vm(VmField::ConfigGuestId)),
    rule!(Some("vm_get_vm_info.yml"), SetFact, "vm_hardware_version"
        => Vm(VmField::HardwareVersion)),
    rule!(Some("vm_upgrade_hardware_version.yml"), SetFact, "vm_hardware_version"
        => Vm(VmField::HardwareVersion)),
    rule!(Some("vm_get_guest_info.yml"), SetFact, "guestinfo_guest_id"
        => Vm(VmField::GuestinfoGuestId)),
    rule!(Some("vm_get_guest_info.yml"), SetFact, "guestinfo_guest_full_name"
        => Vm(VmField::GuestinfoGuestFullName)),
    rule!(Some("vm_get_guest_info.yml"), SetFact, "guestinfo_guest_family"
        => Vm(VmField::GuestinfoGuestFamily)),
    rule!(Some("vm_get_guest_info.yml"), SetFact, "guestinfo_detailed_data"
        => Vm(VmField::GuestinfoDetailedData)),
];

/// Strips a collection prefix: `ansible.builtin.debug` → `debug`.
pub fn short_action(action: &str) -> &str {
    action.rsplit('.').next().unwrap_or(action)
}

// ============================================================================
// Accumulated facts
// ============================================================================

/// All facts collected during one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportFacts {
    /// Present only when the testing vars name a VM
    pub vm: Option<VmInfo>,
    pub vcenter: ServerInfo,
    pub esxi: ServerInfo,
    pub os: OsReleaseFacts,
}

impl ReportFacts {
    /// Creates an empty fact set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking the named VM. Does nothing if a VM is already tracked.
    pub fn track_vm(&mut self, name: impl Into<String>) {
        if self.vm.is_none() {
            self.vm = Some(VmInfo::new(name));
        }
    }

    /// Writes `value` into `target` unless the field already holds a value.
    ///
    /// Returns whether the field was written. Empty values never write, and
    /// VM fields are dropped when no VM is tracked.
    pub fn set(&mut self, target: FactTarget, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }

        let slot = match target {
            FactTarget::Vm(field) => match self.vm.as_mut() {
                Some(vm) => vm.slot(field),
                None => return false,
            },
            FactTarget::Vcenter(field) => self.vcenter.slot(field),
            FactTarget::Esxi(field) => self.esxi.slot(field),
            FactTarget::Os(field) => self.os.slot(field),
        };

        if !slot.is_empty() {
            return false;
        }
        *slot = value.to_string();
        true
    }

    /// Applies every rule matching an ok task result.
    ///
    /// Returns the fields that were written.
    pub fn apply_task_result(&mut self, task: &TaskInfo, result: &ResultInfo) -> Vec<FactTarget> {
        let source = match short_action(&task.action) {
            "debug" => FactSource::DebugVar,
            "set_fact" => FactSource::SetFact,
            _ => return Vec::new(),
        };
        let file = task.file_name();
        let debug_var = task.debug_var();

        let mut written = Vec::new();
        for rule in FACT_RULES.iter().filter(|r| r.source == source) {
            if rule.file.is_some() && rule.file != file {
                continue;
            }
            let value = match source {
                FactSource::DebugVar => {
                    if debug_var.as_deref() != Some(rule.var) {
                        continue;
                    }
                    result.debug_value(rule.var)
                }
                FactSource::SetFact => result.fact(rule.var),
            };
            let Some(value) = value else { continue };
            for target in rule.targets {
                if self.set(*target, &value) {
                    written.push(*target);
                }
            }
        }

        let release_part_written = written.iter().any(|t| {
            matches!(
                t,
                FactTarget::Os(
                    OsField::Distribution | OsField::DistributionVersion | OsField::Architecture
                )
            )
        });
        if release_part_written {
            self.compose_guest_os_type(true);
        }

        written
    }

    /// Fills the VM guest OS type from whatever release parts were reported.
    ///
    /// Called once at the end of the run, after which later parts can no
    /// longer arrive.
    pub fn settle_guest_os_type(&mut self) {
        self.compose_guest_os_type(false);
    }

    /// Fills the VM guest OS type from the reported distribution, version and
    /// architecture. With `complete_only`, waits until all three are known.
    fn compose_guest_os_type(&mut self, complete_only: bool) {
        if self.os.distribution.is_empty() {
            return;
        }
        if complete_only
            && (self.os.distribution_version.is_empty() || self.os.architecture.is_empty())
        {
            return;
        }
        let parts = [
            self.os.distribution.as_str(),
            self.os.distribution_version.as_str(),
            self.os.architecture.as_str(),
        ];
        let composed = parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        self.set(FactTarget::Vm(VmField::GuestOsType), &composed);
    }

    /// Uses the configured server hostnames where none were reported.
    pub fn fill_from_testing_vars(&mut self, vars: &TestingVars) {
        if let Some(host) = vars.get_str("vcenter_hostname") {
            self.set(FactTarget::Vcenter(ServerField::Hostname), &host);
        }
        if let Some(host) = vars.get_str("esxi_hostname") {
            self.set(FactTarget::Esxi(ServerField::Hostname), &host);
        }
    }
}
