//! End-to-end tests of the gosv-log plugin over whole runs.
//!
//! Each test drives a [`Harness`] through a sequence of lifecycle events
//! and checks the files left in the run directory.

mod common;

use std::fs;

use common::*;
use gosv_log::callback::types::{IncludedFileInfo, PlayInfo, ResultInfo, TaskInfo};
use gosv_log::report::TestStatus;
use gosv_log::traits::ExecutionCallback;
use pretty_assertions::assert_eq;
use serde_json::json;

const RESULTS_TABLE: &str = "\
Test Results (Total: 3, Failed: 1, No Run: 1, Elapsed Time: 00:18:42):
+---------------------------------------------+
| Name                 |   Status | Exec Time |
+---------------------------------------------+
| deploy_vm            | * No Run | 00:00:01  |
+---------------------------------------------+
| vgauth_check_service |   Passed | 00:03:02  |
+---------------------------------------------+
| gosc_cloudinit_dhcp  | * Failed | 00:12:58  |
+---------------------------------------------+
";

/// Runs the three test cases of the reference run.
async fn reference_run(h: &Harness) {
    h.start_playbook().await;

    h.callback.on_play_start(&setup_play("env_setup")).await;
    h.ok(
        &debug_var_task("vcenter_get_version_build.yml", "vcenter_version"),
        debug_var_result("vcenter_version", "7.0.3"),
    )
    .await;
    h.ok(
        &debug_var_task("vcenter_get_version_build.yml", "vcenter_build"),
        debug_var_result("vcenter_build", "19480866"),
    )
    .await;

    h.start_test("deploy_vm").await;
    h.at(1);
    h.ok(&skip_task("deploy_vm"), skip_result("VM already exists"))
        .await;

    h.start_test("vgauth_check_service").await;
    h.at(183);
    h.start_test("gosc_cloudinit_dhcp").await;
    h.at(961);
    h.fail(
        &command_task(
            "Check cloud-init DHCP",
            "gosc_cloudinit_dhcp/gosc_cloudinit_dhcp.yml",
            20,
        ),
        "cloud-init DHCP was not applied",
    )
    .await;

    h.at(1122);
    h.finish().await;
}

#[tokio::test]
async fn test_reference_run_statuses_and_durations() {
    let h = Harness::new();
    reference_run(&h).await;

    let cases = h.callback.test_cases();
    let summary: Vec<_> = cases
        .iter()
        .map(|c| (c.name.as_str(), c.status, c.duration))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("deploy_vm", TestStatus::NoRun, 1),
            ("vgauth_check_service", TestStatus::Passed, 182),
            ("gosc_cloudinit_dhcp", TestStatus::Failed, 778),
        ]
    );
    for case in &cases {
        let finished = case.finished_at.expect("finished test case");
        assert!(finished >= case.started_at);
    }
}

#[tokio::test]
async fn test_reference_run_results_files() {
    let h = Harness::new();
    reference_run(&h).await;

    assert_eq!(
        h.read("test_results.yml"),
        "deploy_vm: No Run\nvgauth_check_service: Passed\ngosc_cloudinit_dhcp: Failed\n"
    );

    let results = h.read("results.log");
    assert!(results.starts_with("Testbed information:\n"));
    assert!(results.contains("| vCenter | 7.0.3"));
    assert!(results.contains("| 19480866 | 192.168.10.10 "));
    assert!(results.contains("| ESXi "));
    assert!(results.contains("VM information:\n"));
    assert!(results.contains("| test_vm "));
    assert!(results.contains(RESULTS_TABLE));

    assert_eq!(h.callback.summary().results, RESULTS_TABLE);
}

#[tokio::test]
async fn test_reference_run_debug_log() {
    let h = Harness::new();
    reference_run(&h).await;

    let debug = h.read("full_debug.log");
    assert!(debug.contains("| PLAYBOOK: /gosv/main.yml "));
    assert!(debug.contains("Testing vars file: "));
    assert!(debug.contains("| PLAY [env_setup] "));
    assert!(debug.contains("play path: /gosv/linux/deploy_vm/deploy_vm.yml:1"));
    assert!(debug.contains("| TASK [Display vcenter_version] "));
    assert!(debug.contains("fatal: [localhost]: FAILED! => {\n    \"msg\": \"cloud-init DHCP was not applied\"\n}"));
    assert!(debug.contains("| PLAY RECAP "));
    assert!(debug.contains("| TEST SUMMARY "));
    assert!(debug.contains(RESULTS_TABLE));

    let recap = debug.find("PLAY RECAP").unwrap();
    let summary = debug.find("TEST SUMMARY").unwrap();
    assert!(recap < summary);
}

#[tokio::test]
async fn test_failed_tasks_grouped_per_test_case() {
    let h = Harness::new();
    h.start_playbook().await;

    h.callback.on_play_start(&setup_play("env_setup")).await;
    h.fail(&command_task("Check testbed", "env_setup/env_setup.yml", 4), "no ESXi")
        .await;

    h.start_test("check_ip").await;
    let first = command_task("Get guest IP", "check_ip/check_ip.yml", 10);
    let second = command_task("Ping guest IP", "check_ip/check_ip.yml", 30);
    h.fail(&first, "timeout").await;
    h.fail(&second, "unreachable").await;
    h.fail(&second, "unreachable again").await;

    let failed = h.read("failed_tasks.log");
    assert_eq!(failed.matches("Failed at Play [env_setup]").count(), 1);
    assert_eq!(failed.matches("Failed at Play [check_ip]").count(), 1);
    assert_eq!(failed.matches("| TASK [Get guest IP] ").count(), 1);
    assert_eq!(failed.matches("| TASK [Ping guest IP] ").count(), 1);
    assert!(failed.contains("unreachable again"));

    let env = failed.find("Failed at Play [env_setup]").unwrap();
    let check_ip = failed.find("Failed at Play [check_ip]").unwrap();
    assert!(env < check_ip);
}

#[tokio::test]
async fn test_ignored_loop_failure_marks_failed_log() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("check_os_fullname").await;

    let task = command_task("Check services", "check_os_fullname/a.yml", 5).with_loop();
    h.callback.on_task_start(&task, false).await;
    h.callback
        .on_item_failed(&task, &ResultInfo::new().with("item", "vgauthd").with("msg", "dead"))
        .await;
    h.callback
        .on_task_failed(&task, &ResultInfo::new().with("results", json!([{}])), true)
        .await;

    let failed = h.read("failed_tasks.log");
    assert!(failed.contains("failed: [localhost] => (item=vgauthd) => "));
    assert!(failed.ends_with("...ignoring\n"));
    assert_eq!(
        h.callback.test_cases()[0].status,
        TestStatus::Running
    );
}

#[tokio::test]
async fn test_unreachable_fails_running_test() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("check_ip").await;
    let task = command_task("Ping guest", "check_ip/check_ip.yml", 8);
    h.callback.on_task_start(&task, false).await;
    h.callback
        .on_task_unreachable(&task, &ResultInfo::new().with("msg", "ssh timeout"))
        .await;

    assert_eq!(h.callback.test_cases()[0].status, TestStatus::Failed);
    assert!(h.read("failed_tasks.log").contains("fatal: [localhost]: UNREACHABLE!"));
    assert_eq!(h.read("test_results.yml"), "check_ip: Failed\n");
}

#[tokio::test]
async fn test_skip_marker_targets_named_test() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("check_ip").await;
    h.start_test("gosc_cloudinit_dhcp").await;
    h.ok(&skip_task("gosc_cloudinit_dhcp"), skip_result("cloud-init not installed"))
        .await;
    h.finish().await;

    assert_eq!(
        h.read("test_results.yml"),
        "check_ip: Passed\ngosc_cloudinit_dhcp: No Run\n"
    );
}

#[tokio::test]
async fn test_setup_plays_are_not_test_cases() {
    let h = Harness::new();
    h.start_playbook().await;
    h.callback.on_play_start(&setup_play("env_setup")).await;
    h.callback
        .on_play_start(&PlayInfo::new("Cleanup").with_path("/gosv/common/cleanup.yml:1"))
        .await;
    h.finish().await;

    assert!(h.callback.test_cases().is_empty());
    assert!(h.read("results.log").contains("Test Results (Total: 0, Elapsed Time: 00:00:00):"));
}

#[tokio::test]
async fn test_facts_first_write_wins() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("deploy_vm").await;

    let task = debug_var_task("deploy_vm.yml", "vm_guest_ip");
    h.ok(&task, debug_var_result("vm_guest_ip", "192.168.10.125"))
        .await;
    h.ok(&task, debug_var_result("vm_guest_ip", "192.168.10.200"))
        .await;

    h.ok(
        &set_fact_task("vm_get_vm_info.yml"),
        set_fact_result(json!({"vm_hardware_version": "vmx-19", "vm_guest_id": "ubuntu64Guest"})),
    )
    .await;
    h.ok(
        &set_fact_task("vm_upgrade_hardware_version.yml"),
        set_fact_result(json!({"vm_hardware_version": "vmx-21"})),
    )
    .await;

    let vm = h.callback.facts().vm.unwrap();
    assert_eq!(vm.ip, "192.168.10.125");
    assert_eq!(vm.hardware_version, "vmx-19");
    assert_eq!(vm.config_guest_id, "ubuntu64Guest");
}

#[tokio::test]
async fn test_guest_os_type_composed_from_distribution() {
    let h = Harness::new();
    h.start_playbook().await;
    h.ok(
        &set_fact_task("get_guest_system_info.yml"),
        set_fact_result(json!({
            "guest_os_ansible_distribution": "Ubuntu",
            "guest_os_ansible_distribution_ver": "22.04",
            "guest_os_ansible_architecture": "x86_64"
        })),
    )
    .await;

    let facts = h.callback.facts();
    assert_eq!(facts.vm.unwrap().guest_os_type, "Ubuntu 22.04 x86_64");
    assert_eq!(facts.os.distribution, "Ubuntu");
}

#[tokio::test]
async fn test_deploy_rename_recorded_in_results() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("deploy_vm").await;
    h.ok(
        &set_fact_task("deploy_vm.yml"),
        set_fact_result(json!({"deploy_casename": "deploy_vm_efi_paravirtual_vmxnet3"})),
    )
    .await;
    h.finish().await;

    assert_eq!(
        h.read("test_results.yml"),
        "deploy_vm_efi_paravirtual_vmxnet3: Passed\n"
    );
}

#[tokio::test]
async fn test_failures_after_deploy_rename_share_one_group() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("deploy_vm").await;
    h.ok(
        &set_fact_task("deploy_vm.yml"),
        set_fact_result(json!({"deploy_casename": "deploy_vm_efi_pvscsi"})),
    )
    .await;

    h.at(40);
    h.fail(&command_task("Power on VM", "deploy_vm/deploy_vm.yml", 12), "power on failed")
        .await;
    h.fail(&command_task("Collect VM logs", "deploy_vm/deploy_vm.yml", 40), "no vmware.log")
        .await;

    let failed = h.read("failed_tasks.log");
    assert_eq!(failed.matches("Failed at Play [").count(), 1);
    assert!(failed.contains("Failed at Play [deploy_vm_efi_pvscsi]"));
    assert!(failed.contains("| TASK [Collect VM logs] "));
    assert!(failed.contains("no vmware.log"));
    assert_eq!(h.read("test_results.yml"), "deploy_vm_efi_pvscsi: Failed\n");
}

#[tokio::test]
async fn test_failures_after_play_without_test_case_use_play_name() {
    let h = Harness::new();
    h.start_playbook().await;
    h.start_test("check_ip").await;
    h.fail(&command_task("Get guest IP", "check_ip/check_ip.yml", 10), "timeout")
        .await;

    h.callback.on_play_start(&setup_play("env_cleanup")).await;
    h.fail(&command_task("Remove VM", "env_setup/env_cleanup.yml", 6), "VM busy")
        .await;

    let failed = h.read("failed_tasks.log");
    assert_eq!(failed.matches("Failed at Play [check_ip]").count(), 1);
    assert_eq!(failed.matches("Failed at Play [env_cleanup]").count(), 1);
}

#[tokio::test]
async fn test_missing_testing_vars_is_reported() {
    let h = Harness::with_vars(None);
    h.start_playbook().await;
    h.finish().await;

    assert!(h.read("full_debug.log").contains("Failed to get testing vars file: "));
    assert_eq!(h.callback.summary().vm_info, "Not found VM information");
    assert!(h
        .read("results.log")
        .contains("Not found vCenter or ESXi server information"));
}

#[tokio::test]
async fn test_testing_vars_file_from_extra_vars() {
    let h = Harness::with_vars(None);
    let vars = h.path().join("custom_vars.yml");
    fs::write(&vars, "vm_name: custom_vm\n").unwrap();

    h.callback
        .on_playbook_start(
            &gosv_log::callback::types::PlaybookInfo::new("main.yml")
                .with_extra_var("testing_vars_file", vars.display().to_string()),
        )
        .await;

    assert_eq!(h.callback.testing_vars_file(), Some(vars));
    assert_eq!(h.callback.facts().vm.unwrap().name, "custom_vm");
}

#[tokio::test]
async fn test_handler_retry_and_include_lines() {
    let h = Harness::new();
    h.start_playbook().await;

    let handler = TaskInfo::new("Restart vgauthd", "service", "vm").with_uuid("h-1");
    h.callback.on_task_start(&handler, true).await;
    h.callback
        .on_task_ok(&handler, &ResultInfo::new().with("changed", true))
        .await;

    let wait = command_task("Wait for guest IP", "check_ip/check_ip.yml", 3);
    h.callback.on_task_start(&wait, false).await;
    h.callback
        .on_retry(&wait, &ResultInfo::new().with("attempts", 1), 1, 5)
        .await;

    let mut included = IncludedFileInfo::new(
        "/gosv/common/vm_wait_guest_ip.yml",
        vec!["localhost".to_string()],
    );
    included.vars.insert("item".to_string(), json!("eth0"));
    h.callback.on_include(&included).await;

    let debug = h.read("full_debug.log");
    assert!(debug.contains("| HANDLER [Restart vgauthd] "));
    assert!(debug.contains("changed: [vm] => {\n    \"changed\": true\n}"));
    assert!(debug.contains("FAILED - RETRYING: Wait for guest IP (4 retries left).Result was: "));
    assert!(debug.contains("Included: /gosv/common/vm_wait_guest_ip.yml for localhost "));
    assert!(debug.contains(" => (item=eth0)\n"));
}

#[tokio::test]
async fn test_include_results_not_printed() {
    let h = Harness::new();
    h.start_playbook().await;
    let task = TaskInfo::new("Include check tasks", "ansible.builtin.include_tasks", "localhost");
    h.ok(&task, ResultInfo::new().with("include", "check.yml"))
        .await;

    assert!(!h.read("full_debug.log").contains("Include check tasks"));
}

#[tokio::test]
async fn test_os_release_info_updated() {
    let h = Harness::new();
    let release = h.path().join("Ubuntu_22.04_x86_64.json");
    fs::write(
        &release,
        r#"[{"kernel": "5.15.0-70-generic", "Release": "Ubuntu 22.04.2 LTS"}]"#,
    )
    .unwrap();

    h.start_playbook().await;
    h.ok(
        &debug_var_task("check_inbox_driver.yml", "os_release_info_file_path"),
        debug_var_result("os_release_info_file_path", release.display().to_string()),
    )
    .await;
    h.ok(
        &debug_var_task("cloudinit_pkg_check.yml", "cloudinit_version"),
        debug_var_result("cloudinit_version", "23.1.2"),
    )
    .await;
    h.ok(
        &debug_var_task("get_guest_ovt_version_build.yml", "vmtools_info_from_vmtoolsd"),
        debug_var_result("vmtools_info_from_vmtoolsd", "12.1.5 build 20735119"),
    )
    .await;
    h.finish().await;

    let expected = r#"[
    {
        "Release": "Ubuntu 22.04.2 LTS",
        "open-vm-tools": "12.1.5 build 20735119",
        "cloud-init": "23.1.2",
        "kernel": "5.15.0-70-generic"
    }
]"#;
    assert_eq!(fs::read_to_string(&release).unwrap(), expected);
}

#[cfg(unix)]
#[tokio::test]
async fn test_logs_archived_to_testrun_dir() {
    let h = Harness::new();
    let original = h.callback.run_dir();
    let archive = h.path().join("archive/ubuntu_22.04/2024-05-01-10-00-00");

    h.start_playbook().await;
    h.ok(
        &debug_var_task("test_setup.yml", "testrun_log_path"),
        debug_var_result("testrun_log_path", archive.display().to_string()),
    )
    .await;
    h.start_test("check_ip").await;
    h.finish().await;

    assert!(!original.exists());
    assert_eq!(h.callback.run_dir(), archive);
    assert_eq!(fs::read_link(h.callback.current_link()).unwrap(), archive);
    assert!(fs::read_to_string(archive.join("results.log"))
        .unwrap()
        .contains("| check_ip "));
    assert_eq!(
        fs::read_to_string(archive.join("test_results.yml")).unwrap(),
        "check_ip: Passed\n"
    );
}
