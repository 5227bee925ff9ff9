//! Files written by `stackcmp scaffold`.

/// Argo CD `ConfigManagementPlugin` definition for the sidecar.
///
/// Argo CD runs `discover` in the repository path and treats any output on
/// stdout as a match, then calls `init` and `generate` with the application
/// environment.
pub const PLUGIN_YAML: &str = r#"apiVersion: argoproj.io/v1alpha1
kind: ConfigManagementPlugin
metadata:
  name: pulumi-plugin
spec:
  version: v1.0
  discover:
    find:
      command: [stackcmp, discover]
  init:
    command: [stackcmp, init]
  generate:
    command: [stackcmp, generate]
  parameters:
    static:
      - name: org
        title: Pulumi organization
        required: true
      - name: project
        title: Pulumi project
        required: true
      - name: stack
        title: Pulumi stack
        required: true
"#;

/// Default Stack template, used when the source ships none.
///
/// The access token is referenced by secret name and key only; the value
/// never passes through the plugin.
pub const STACK_TEMPLATE: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: ${ARGOCD_APP_NAME}-pulumi
  namespace: ${ARGOCD_APP_NAMESPACE}
  annotations:
    argocd.argoproj.io/sync-wave: "-1"
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: ${ARGOCD_APP_NAME}-pulumi:system:auth-delegator
  annotations:
    argocd.argoproj.io/sync-wave: "-1"
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: system:auth-delegator
subjects:
  - kind: ServiceAccount
    name: ${ARGOCD_APP_NAME}-pulumi
    namespace: ${ARGOCD_APP_NAMESPACE}
---
apiVersion: pulumi.com/v1
kind: Stack
metadata:
  name: ${ARGOCD_APP_NAME}
  namespace: ${ARGOCD_APP_NAMESPACE}
spec:
  serviceAccountName: ${ARGOCD_APP_NAME}-pulumi
  stack: ${PARAM_ORG}/${PARAM_PROJECT}/${PARAM_STACK}
  projectRepo: ${ARGOCD_APP_SOURCE_REPO_URL}
  repoDir: ${ARGOCD_APP_SOURCE_PATH}
  commit: ${ARGOCD_APP_REVISION}
  envRefs:
    PULUMI_ACCESS_TOKEN:
      type: Secret
      secret:
        name: pulumi-api-secret
        key: accessToken
  destroyOnFinalize: true
"#;
