//! Argument parsing tests for the ksync command.
//!
//! Everything here fails or exits before a netlink socket is opened, so no
//! privileges are needed.

use assert_cmd::Command;
use predicates::prelude::*;

fn ksync_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ksync"))
}

mod global_flags {
    use super::*;

    #[test]
    fn test_help() {
        ksync_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("synchronization tool"))
            .stdout(predicate::str::contains("--netns"))
            .stdout(predicate::str::contains("--no-filter"));
    }

    #[test]
    fn test_version() {
        ksync_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ksync"));
    }

    #[test]
    fn test_invalid_subcommand() {
        ksync_cmd()
            .arg("invalid_command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn test_missing_config_file() {
        ksync_cmd()
            .args(["--config", "/nonexistent/ksync.json", "link", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("/nonexistent/ksync.json"));
    }
}

mod link_command {
    use super::*;

    #[test]
    fn test_link_help() {
        ksync_cmd()
            .args(["link", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vlan"))
            .stdout(predicate::str::contains("nomaster"));
    }

    #[test]
    fn test_link_add_help() {
        ksync_cmd()
            .args(["link", "add", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--type"))
            .stdout(predicate::str::contains("--mtu"))
            .stdout(predicate::str::contains("--address"));
    }

    #[test]
    fn test_link_alias() {
        ksync_cmd().args(["l", "show", "--help"]).assert().success();
    }

    #[test]
    fn test_invalid_mac() {
        ksync_cmd()
            .args(["link", "add", "dummy0", "--address", "00:11:22"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--address"));
    }

    #[test]
    fn test_vlan_id_out_of_range() {
        ksync_cmd()
            .args(["link", "vlan", "eth0.5000", "--link", "eth0", "--id", "5000"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--id"));
    }

    #[test]
    fn test_vlan_requires_link() {
        ksync_cmd()
            .args(["link", "vlan", "eth0.10", "--id", "10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--link"));
    }

    #[test]
    fn test_master_requires_both() {
        ksync_cmd()
            .args(["link", "master", "eth0"])
            .assert()
            .failure();
    }
}

mod address_command {
    use super::*;

    #[test]
    fn test_address_aliases() {
        ksync_cmd().args(["addr", "--help"]).assert().success();
        ksync_cmd().args(["a", "--help"]).assert().success();
    }

    #[test]
    fn test_add_requires_dev() {
        ksync_cmd()
            .args(["address", "add", "10.0.0.1/24"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--dev"));
    }
}

mod route_command {
    use super::*;

    #[test]
    fn test_route_add_help() {
        ksync_cmd()
            .args(["route", "add", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--via"))
            .stdout(predicate::str::contains("--metric"))
            .stdout(predicate::str::contains("--proto"));
    }

    #[test]
    fn test_invalid_gateway() {
        ksync_cmd()
            .args(["route", "add", "10.1.0.0/16", "--via", "not-an-ip"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--via"));
    }

    #[test]
    fn test_invalid_proto() {
        ksync_cmd()
            .args(["route", "add", "10.1.0.0/16", "--dev", "eth0", "--proto", "bogus"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown route origin"));
    }
}

mod monitor_command {
    use super::*;

    #[test]
    fn test_monitor_help() {
        ksync_cmd()
            .args(["monitor", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--count"))
            .stdout(predicate::str::contains("link"))
            .stdout(predicate::str::contains("route"));
    }

    #[test]
    fn test_invalid_object_class() {
        ksync_cmd()
            .args(["monitor", "neighbor"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }
}
