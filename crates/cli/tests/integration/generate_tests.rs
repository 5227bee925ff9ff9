use predicates::prelude::*;

use super::common::{TestEnv, documents};

#[test]
fn generate_renders_builtin_stack() {
  let env = TestEnv::pulumi_project();

  let output = env.argocd_cmd().arg("generate").assert().success().get_output().stdout.clone();

  let docs = documents(&output);
  let kinds: Vec<&str> = docs.iter().map(|d| d["kind"].as_str().unwrap()).collect();
  assert_eq!(kinds, vec!["ServiceAccount", "ClusterRoleBinding", "Stack"]);

  let stack = &docs[2];
  assert_eq!(stack["spec"]["stack"].as_str(), Some("acme/widgets/prod"));
  assert_eq!(stack["spec"]["commit"].as_str(), Some("4f1c2a9"));
  assert_eq!(stack["spec"]["serviceAccountName"].as_str(), Some("demo-pulumi"));
}

#[test]
fn generate_with_cli_overrides() {
  let env = TestEnv::pulumi_project();

  let output = env
    .stackcmp_cmd()
    .args([
      "generate",
      "--app-name",
      "demo",
      "--app-namespace",
      "team-a",
      "--repo-url",
      "https://github.com/acme/widgets.git",
      "--source-path",
      "infra/widgets",
      "--revision",
      "4f1c2a9",
      "--param",
      "org=acme",
      "--param",
      "project=widgets",
      "--param",
      "stack=prod",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("stack: acme/widgets/prod"))
    .get_output()
    .stdout
    .clone();

  let docs = documents(&output);
  assert_eq!(docs[2]["spec"]["repoDir"].as_str(), Some("infra/widgets"));
}

#[test]
fn generate_with_only_identity_and_stack_parameters() {
  let env = TestEnv::pulumi_project();

  let output = env
    .stackcmp_cmd()
    .env("ARGOCD_APP_NAME", "demo")
    .env("ARGOCD_APP_NAMESPACE", "team-a")
    .env(
      "ARGOCD_APP_PARAMETERS",
      r#"[{"name":"org","string":"acme"},{"name":"project","string":"widgets"},{"name":"stack","string":"prod"}]"#,
    )
    .arg("generate")
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let docs = documents(&output);
  let stack = &docs[2];
  assert_eq!(stack["spec"]["stack"].as_str(), Some("acme/widgets/prod"));
  assert_eq!(stack["spec"]["repoDir"].as_str(), Some("."));
  assert_eq!(stack["spec"]["commit"].as_str(), Some("HEAD"));
}

#[test]
fn generate_missing_parameter_fails_without_output() {
  let env = TestEnv::pulumi_project();

  env
    .argocd_cmd()
    .env_remove("ARGOCD_APP_PARAMETERS")
    .arg("generate")
    .assert()
    .failure()
    .stdout("")
    .stderr(predicate::str::contains("unresolved variable: PARAM_ORG"));
}

#[test]
fn generate_unknown_variable_fails() {
  let env = TestEnv::pulumi_project();
  env.write_file(
    "stack.yaml.envsubst",
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${UNKNOWN_VAR}\n",
  );

  env
    .argocd_cmd()
    .arg("generate")
    .assert()
    .failure()
    .stdout("")
    .stderr(predicate::str::contains("UNKNOWN_VAR"));
}

#[test]
fn generate_source_templates_and_plain_manifests() {
  let env = TestEnv::pulumi_project();
  env.write_file(
    "stack.yaml.envsubst",
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${app.name}-settings\ndata:\n  stack: ${parameters.stack}\n  region: ${env.REGION}\n",
  );
  env.write_file("yaml/namespace.yaml", "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: widgets\n");

  let output = env
    .argocd_cmd()
    .env("ARGOCD_ENV_REGION", "eu-west-1")
    .arg("generate")
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let docs = documents(&output);
  assert_eq!(docs.len(), 2);
  assert_eq!(docs[0]["metadata"]["name"].as_str(), Some("demo-settings"));
  assert_eq!(docs[0]["data"]["stack"].as_str(), Some("prod"));
  assert_eq!(docs[0]["data"]["region"].as_str(), Some("eu-west-1"));
  assert_eq!(docs[1]["kind"].as_str(), Some("Namespace"));
}

#[test]
fn generate_rejects_literal_access_token() {
  let env = TestEnv::pulumi_project();
  env.write_file(
    "stack.yaml.envsubst",
    r#"apiVersion: pulumi.com/v1
kind: Stack
metadata:
  name: ${ARGOCD_APP_NAME}
spec:
  stack: ${PARAM_ORG}/${PARAM_PROJECT}/${PARAM_STACK}
  envRefs:
    PULUMI_ACCESS_TOKEN:
      type: Literal
      literal:
        value: pul-123
"#,
  );

  env
    .argocd_cmd()
    .arg("generate")
    .assert()
    .failure()
    .stdout("")
    .stderr(predicate::str::contains("PULUMI_ACCESS_TOKEN"));
}

#[test]
fn generate_with_explicit_config_defaults() {
  let env = TestEnv::pulumi_project();
  env.write_file(
    "cm.tmpl",
    "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${app.name}\ndata:\n  tier: ${env.TIER}\n",
  );
  let config = env.temp.path().join("plugin.yaml");
  std::fs::write(&config, "templates: [\"*.tmpl\"]\nvariables:\n  defaults:\n    env.TIER: gold\n").unwrap();

  env
    .argocd_cmd()
    .env("STACKCMP_CONFIG", &config)
    .arg("generate")
    .assert()
    .success()
    .stdout(predicate::str::contains("tier: gold"));
}

#[test]
fn generate_without_marker_fails() {
  let env = TestEnv::empty();

  env
    .argocd_cmd()
    .arg("generate")
    .assert()
    .failure()
    .stdout("")
    .stderr(predicate::str::contains("plugin does not apply"));
}
