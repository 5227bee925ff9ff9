use crate::consts::{APP_NAME, STATE_DIR_ENV};
use std::env;
use std::path::PathBuf;

fn non_empty_var(name: &str) -> Option<PathBuf> {
  env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
pub fn home_dir() -> Option<PathBuf> {
  non_empty_var("HOME")
}

/// Returns the directory for cache files for the application
pub fn cache_dir() -> Option<PathBuf> {
  non_empty_var("XDG_CACHE_HOME")
    .or_else(|| home_dir().map(|home| home.join(".cache")))
    .map(|cache_home| cache_home.join(APP_NAME))
}

/// Returns the root of per-application init state.
///
/// `STACKCMP_STATE_DIR` wins over the cache directory. `None` when neither it
/// nor a home directory is available.
pub fn state_dir() -> Option<PathBuf> {
  non_empty_var(STATE_DIR_ENV).or_else(cache_dir)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn state_dir_env_takes_precedence() {
    temp_env::with_vars(
      [
        (STATE_DIR_ENV, Some("/var/lib/stackcmp")),
        ("XDG_CACHE_HOME", Some("/custom/cache")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(state_dir(), Some(PathBuf::from("/var/lib/stackcmp")));
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_cache_home_takes_precedence_over_home() {
    temp_env::with_vars(
      [
        (STATE_DIR_ENV, None::<&str>),
        ("XDG_CACHE_HOME", Some("/custom/cache")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(state_dir(), Some(PathBuf::from("/custom/cache").join(APP_NAME)));
      },
    );
  }

  #[test]
  #[serial]
  fn xdg_fallback_to_home_directories() {
    temp_env::with_vars(
      [
        (STATE_DIR_ENV, Some("")),
        ("XDG_CACHE_HOME", None::<&str>),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(cache_dir(), Some(PathBuf::from("/home/user/.cache").join(APP_NAME)));
        assert_eq!(state_dir(), cache_dir());
      },
    );
  }

  #[test]
  #[serial]
  fn no_home_means_no_default_state_dir() {
    temp_env::with_vars(
      [
        (STATE_DIR_ENV, None::<&str>),
        ("XDG_CACHE_HOME", None::<&str>),
        ("HOME", None::<&str>),
      ],
      || {
        assert_eq!(state_dir(), None);
      },
    );
  }
}
