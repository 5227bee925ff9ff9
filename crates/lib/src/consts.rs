//! Crate-wide constants.

/// Application name, used for state directories and environment variables.
pub const APP_NAME: &str = "stackcmp";

/// Plugin version advertised in the generated `ConfigManagementPlugin`.
pub const PLUGIN_VERSION: &str = "v1.0";

/// Marker file whose presence at the source root makes the plugin applicable.
pub const DEFAULT_MARKER_FILE: &str = "Pulumi.yaml";

/// Glob selecting template files at the source root.
pub const DEFAULT_TEMPLATE_GLOB: &str = "*.envsubst";

/// Directory of plain manifests appended without substitution.
pub const DEFAULT_MANIFESTS_DIR: &str = "yaml";

/// Per-source configuration file consulted when no explicit config is given.
pub const SOURCE_CONFIG_FILE: &str = ".stackcmp.yaml";

/// Name of the record written by the init step.
pub const INIT_RECORD_FILE: &str = "init.json";

/// Env var overriding the plugin configuration path.
pub const CONFIG_ENV: &str = "STACKCMP_CONFIG";

/// Env var overriding the state root.
pub const STATE_DIR_ENV: &str = "STACKCMP_STATE_DIR";

/// Stack env keys that must never be supplied as literals.
pub const DEFAULT_SECRET_ENV_KEYS: &[&str] = &["PULUMI_ACCESS_TOKEN"];

/// Length of the digest prefix used for state directory names.
pub const DIGEST_PREFIX_LEN: usize = 16;

/// Defaults for context keys Argo CD always sets, so the built-in template
/// also renders outside a sync. Configured defaults take precedence.
pub const BUILTIN_VARIABLE_DEFAULTS: &[(&str, &str)] = &[
  ("ARGOCD_APP_SOURCE_REPO_URL", ""),
  ("ARGOCD_APP_SOURCE_PATH", "."),
  ("ARGOCD_APP_REVISION", "HEAD"),
];
