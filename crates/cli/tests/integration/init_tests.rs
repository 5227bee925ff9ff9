use predicates::prelude::*;

use super::common::TestEnv;

fn init_records(env: &TestEnv) -> Vec<std::path::PathBuf> {
  walkdir(env.state_path())
}

fn walkdir(dir: std::path::PathBuf) -> Vec<std::path::PathBuf> {
  let mut found = Vec::new();
  for entry in std::fs::read_dir(dir).unwrap() {
    let path = entry.unwrap().path();
    if path.is_dir() {
      found.extend(walkdir(path));
    } else {
      found.push(path);
    }
  }
  found.sort();
  found
}

#[test]
fn init_writes_record_and_nothing_to_stdout() {
  let env = TestEnv::pulumi_project();

  env.argocd_cmd().arg("init").assert().success().stdout("");

  let records = init_records(&env);
  assert_eq!(records.len(), 1);
  assert!(records[0].ends_with("init.json"));
  let record = std::fs::read_to_string(&records[0]).unwrap();
  assert!(record.contains("\"app_name\": \"demo\""));
}

#[test]
fn verbose_init_reports_recorded_templates() {
  let env = TestEnv::pulumi_project();
  env.write_file(
    "stack.yaml.envsubst",
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${ARGOCD_APP_NAME}\n",
  );

  env
    .argocd_cmd()
    .args(["init", "-v"])
    .assert()
    .success()
    .stdout("")
    .stderr(predicate::str::contains("recorded template").and(predicate::str::contains("stack.yaml.envsubst")));
}

#[test]
fn init_twice_leaves_identical_state() {
  let env = TestEnv::pulumi_project();

  env.argocd_cmd().arg("init").assert().success();
  let records = init_records(&env);
  let first = std::fs::read(&records[0]).unwrap();

  env.argocd_cmd().arg("init").assert().success();
  assert_eq!(init_records(&env), records);
  assert_eq!(std::fs::read(&records[0]).unwrap(), first);
}

#[test]
fn init_without_marker_fails_and_writes_nothing() {
  let env = TestEnv::empty();

  env
    .argocd_cmd()
    .arg("init")
    .assert()
    .failure()
    .stderr(predicate::str::contains("plugin does not apply"));

  assert!(init_records(&env).is_empty());
}
