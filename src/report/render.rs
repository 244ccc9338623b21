//! Summary reports printed at the end of a run.

use crate::clock::format_hms;
use crate::report::facts::{ReportFacts, ServerInfo, VmField, VmInfo};
use crate::report::table::{wrap_words, Cell, Column, TextTable};
use crate::report::testcase::{TestCaseTracker, TestStatus};

/// Separator between entries of the guest detailed data string.
const DETAILED_DATA_SEPARATOR: &str = "' ";

/// Renders the testbed servers table.
///
/// ```text
/// Testbed information:
/// +-----------------------------------------------+
/// | Product | Version | Build    | Hostname or IP |
/// +-----------------------------------------------+
/// | vCenter | 7.0.2   | 17694817 | 192.168.10.10  |
/// +-----------------------------------------------+
/// ```
pub fn render_testbed(facts: &ReportFacts) -> String {
    let mut out = String::from("Testbed information:\n");

    let servers: Vec<(&str, &ServerInfo, String)> = [
        ("vCenter", &facts.vcenter, facts.vcenter.version.clone()),
        ("ESXi", &facts.esxi, facts.esxi.display_version()),
    ]
    .into_iter()
    .filter(|(_, server, _)| !server.hostname.is_empty())
    .collect();

    if servers.is_empty() {
        out.push_str("Not found vCenter or ESXi server information\n");
        return out;
    }

    let mut table = TextTable::new(vec![
        Column::left("Product"),
        Column::left("Version"),
        Column::left("Build"),
        Column::left("Hostname or IP"),
    ]);
    for (product, server, version) in servers {
        table.push_line_row(vec![
            product.to_string(),
            version,
            server.build.clone(),
            server.hostname.clone(),
        ]);
    }

    out.push_str(&table.render());
    out.push('\n');
    out
}

/// Renders the VM information table, or a notice when no VM is tracked.
pub fn render_vm_info(vm: Option<&VmInfo>, wrap_width: usize) -> String {
    let Some(vm) = vm else {
        return "Not found VM information".to_string();
    };

    let windows = vm.is_windows();
    let rows = VmField::ALL
        .iter()
        .filter(|field| !(windows && **field == VmField::CloudinitVersion))
        .map(|field| (field.label().to_string(), vm_cell(*field, vm.get(*field), wrap_width)));

    let mut out = String::from("VM information:\n");
    out.push_str(&TextTable::key_value(rows).render());
    out.push('\n');
    out
}

fn vm_cell(field: VmField, value: &str, wrap_width: usize) -> Cell {
    if value.chars().count() <= wrap_width {
        return vec![value.to_string()];
    }
    if field == VmField::GuestinfoDetailedData {
        return value
            .replace(DETAILED_DATA_SEPARATOR, "'\n")
            .split('\n')
            .map(String::from)
            .collect();
    }
    wrap_words(value, wrap_width)
}

/// Renders the test results summary line and table.
pub fn render_results(tests: &TestCaseTracker, elapsed_secs: u64) -> String {
    let elapsed = format_hms(elapsed_secs);
    if tests.is_empty() {
        return format!("Test Results (Total: 0, Elapsed Time: {elapsed}):\n");
    }

    let mut table = TextTable::new(vec![
        Column::left("Name"),
        Column::right("Status"),
        Column::left("Exec Time"),
    ]);
    for case in tests.iter() {
        let status = match case.status {
            TestStatus::Passed => case.status.to_string(),
            other => format!("* {other}"),
        };
        table.push_line_row(vec![case.name.clone(), status, format_hms(case.duration)]);
    }

    format!(
        "Test Results (Total: {}, Failed: {}, No Run: {}, Elapsed Time: {}):\n{}",
        tests.len(),
        tests.count(TestStatus::Failed),
        tests.count(TestStatus::NoRun),
        elapsed,
        table.render()
    )
}
