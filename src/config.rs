use std::path::Path;

use facet::Facet;

use crate::backend::xo::api_url;
use crate::cli::{Cli, USAGE};
use crate::error::RotateError;
use crate::model::RetentionPolicy;
use crate::paths;
use crate::rotation::RotateOptions;

/// Optional config file. Every field can also be given on the command
/// line, which wins.
#[derive(Debug, Clone, PartialEq, Facet)]
#[facet(default)]
pub struct Config {
    pub url: Option<String>,
    pub token: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_snapshots: Option<i64>,
    #[facet(default = true)]
    pub delete_disks: bool,
    pub concurrency: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            user: None,
            password: None,
            max_snapshots: None,
            delete_disks: true,
            concurrency: None,
        }
    }
}

// ── Settings ──────────────────────────────────────────────

/// Where credentials come from, before any prompting.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSource {
    Token(String),
    Password {
        user: String,
        password: Option<String>,
    },
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthSource::Token(_) => f.write_str("Token(<redacted>)"),
            AuthSource::Password { user, password } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct Settings {
    /// WebSocket endpoint, e.g. `wss://xo.company.tld/api/`.
    pub api_url: String,
    pub auth: AuthSource,
    pub options: RotateOptions,
}

// ── loading ───────────────────────────────────────────────

pub fn load_config(path: &Path) -> Result<Config, RotateError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RotateError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    facet_toml::from_str(&contents).map_err(|e| RotateError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load `explicit` if given (it must exist), else the default config file
/// if there is one, else an empty config.
pub fn load(explicit: Option<&Path>) -> Result<Config, RotateError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match paths::config_file() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "using default config file");
            load_config(&path)
        }
        _ => Ok(Config::default()),
    }
}

/// Merge command line over file and validate. Runs before any network
/// call, so every usage error surfaces here.
///
/// Credentials are taken as a unit: if the command line names a token or
/// a user, the file's credentials are ignored.
pub fn resolve(cli: &Cli, file: Config) -> Result<Settings, RotateError> {
    let url = non_empty(cli.url.clone())
        .or_else(|| non_empty(file.url.clone()))
        .ok_or_else(|| usage("missing <url>"))?;
    let api_url = api_url(&url).map_err(|message| usage(&message))?;

    let cli_has_auth = non_empty(cli.token.clone()).is_some() || non_empty(cli.user.clone()).is_some();
    let (token, user, password) = if cli_has_auth {
        (cli.token.clone(), cli.user.clone(), cli.password.clone())
    } else {
        (file.token, file.user, file.password)
    };

    let auth = match (non_empty(token), non_empty(user)) {
        (Some(token), _) => AuthSource::Token(token),
        (None, Some(user)) => AuthSource::Password { user, password },
        (None, None) => return Err(usage("missing <token> or <user>")),
    };

    let concurrency = cli.concurrency.or(file.concurrency);
    if concurrency == Some(0) {
        return Err(RotateError::Validation {
            message: "concurrency must be at least 1".into(),
        });
    }

    Ok(Settings {
        api_url,
        auth,
        options: RotateOptions {
            policy: RetentionPolicy::from_count(cli.max_snapshots.or(file.max_snapshots)),
            delete_disks: file.delete_disks && !cli.keep_disks,
            dry_run: cli.dry_run,
            concurrency,
        },
    })
}

// ── helpers ───────────────────────────────────────────────

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn usage(message: &str) -> RotateError {
    RotateError::Usage {
        message: message.to_string(),
        usage: USAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["xo-rotate"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn token_from_command_line() {
        let s = resolve(&cli(&["--token", "t0k", "-n", "2", "https://xo"]), Config::default())
            .unwrap();
        assert_eq!(s.api_url, "wss://xo/api/");
        assert_eq!(s.auth, AuthSource::Token("t0k".into()));
        assert_eq!(s.options.policy.keep(), Some(2));
        assert!(s.options.delete_disks);
        assert!(!s.options.dry_run);
    }

    #[test]
    fn user_without_password_is_prompted_later() {
        let s = resolve(&cli(&["--user", "admin", "xo"]), Config::default()).unwrap();
        assert_eq!(
            s.auth,
            AuthSource::Password {
                user: "admin".into(),
                password: None
            }
        );
    }

    #[test]
    fn missing_url_is_usage_error() {
        let err = resolve(&cli(&["--token", "t"]), Config::default()).unwrap_err();
        assert!(matches!(err, RotateError::Usage { .. }));
        assert_eq!(err.to_string(), "missing <url>");
    }

    #[test]
    fn missing_credentials_is_usage_error() {
        let err = resolve(&cli(&["http://xo"]), Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing <token> or <user>");

        let err = resolve(&cli(&["--token", "", "http://xo"]), Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing <token> or <user>");
    }

    #[test]
    fn bad_url_is_usage_error() {
        let err = resolve(&cli(&["--token", "t", "ftp://xo"]), Config::default()).unwrap_err();
        assert!(matches!(err, RotateError::Usage { .. }));
    }

    #[test]
    fn file_fills_in_what_cli_leaves_out() {
        let file = Config {
            url: Some("http://xo.file".into()),
            token: Some("file-token".into()),
            max_snapshots: Some(5),
            delete_disks: false,
            concurrency: Some(4),
            ..Config::default()
        };
        let s = resolve(&cli(&[]), file).unwrap();
        assert_eq!(s.api_url, "ws://xo.file/api/");
        assert_eq!(s.auth, AuthSource::Token("file-token".into()));
        assert_eq!(s.options.policy.keep(), Some(5));
        assert!(!s.options.delete_disks);
        assert_eq!(s.options.concurrency, Some(4));
    }

    #[test]
    fn cli_credentials_replace_file_credentials() {
        let file = Config {
            url: Some("http://xo.file".into()),
            token: Some("file-token".into()),
            password: Some("file-password".into()),
            ..Config::default()
        };
        let s = resolve(&cli(&["--user", "ops", "-n", "0", "http://xo.cli"]), file).unwrap();
        assert_eq!(s.api_url, "ws://xo.cli/api/");
        assert_eq!(
            s.auth,
            AuthSource::Password {
                user: "ops".into(),
                password: None
            }
        );
        assert!(!s.options.policy.is_enabled());
    }

    #[test]
    fn keep_disks_and_dry_run_flags() {
        let s = resolve(
            &cli(&["--token", "t", "--keep-disks", "--dry-run", "xo"]),
            Config::default(),
        )
        .unwrap();
        assert!(!s.options.delete_disks);
        assert!(s.options.dry_run);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = resolve(&cli(&["--token", "t", "-j", "0", "xo"]), Config::default()).unwrap_err();
        assert!(err.to_string().contains("concurrency must be at least 1"));
    }

    #[test]
    fn auth_source_debug_redacts() {
        let shown = format!(
            "{:?}",
            AuthSource::Password {
                user: "ops".into(),
                password: Some("hunter2".into())
            }
        );
        assert!(!shown.contains("hunter2"));
        assert!(!format!("{:?}", AuthSource::Token("t0k3n".into())).contains("t0k3n"));
    }

    #[test]
    fn parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
url = "https://xo.company.tld"
user = "backup@company.tld"
password = "s3cret"
max_snapshots = 7
"#
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://xo.company.tld"));
        assert_eq!(config.user.as_deref(), Some("backup@company.tld"));
        assert_eq!(config.max_snapshots, Some(7));
        assert!(config.delete_disks);
        assert!(config.token.is_none());
    }

    #[test]
    fn parse_config_delete_disks_false() {
        let config: Config = facet_toml::from_str("delete_disks = false\n").unwrap();
        assert!(!config.delete_disks);
        assert!(config.url.is_none());
    }

    #[test]
    fn missing_explicit_config_is_error() {
        let err = load(Some(Path::new("/nonexistent/xo-rotate.toml"))).unwrap_err();
        assert!(matches!(err, RotateError::ConfigLoad { .. }));
    }

    #[test]
    fn malformed_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_snapshots = \"many\"\n").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(err, RotateError::ConfigParse { .. }));
    }
}
