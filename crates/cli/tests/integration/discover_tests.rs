use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn discover_prints_marker_when_plugin_applies() {
  let env = TestEnv::pulumi_project();

  env
    .stackcmp_cmd()
    .arg("discover")
    .assert()
    .success()
    .stdout(predicate::str::contains("Pulumi.yaml"));
}

#[test]
fn discover_prints_nothing_without_marker() {
  let env = TestEnv::empty();
  env.write_file("kustomization.yaml", "resources: []\n");

  env.stackcmp_cmd().arg("discover").assert().success().stdout("");
}

#[test]
fn discover_honors_configured_marker() {
  let env = TestEnv::empty();
  env.write_file("stack.marker", "");
  env.write_file(".stackcmp.yaml", "discover:\n  fileName: stack.marker\n");

  env
    .stackcmp_cmd()
    .arg("discover")
    .assert()
    .success()
    .stdout(predicate::str::contains("stack.marker"));
}

#[test]
fn discover_with_explicit_source() {
  let env = TestEnv::pulumi_project();

  env
    .stackcmp_cmd()
    .current_dir(env.temp.path())
    .args(["discover", "--source"])
    .arg(env.source_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Pulumi.yaml"));
}

#[test]
fn discover_missing_source_fails() {
  let env = TestEnv::empty();

  env
    .stackcmp_cmd()
    .args(["discover", "--source", "does-not-exist"])
    .assert()
    .failure()
    .stdout("")
    .stderr(predicate::str::contains("does-not-exist"));
}
