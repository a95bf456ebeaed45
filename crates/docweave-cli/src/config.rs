use std::path::Path;
use std::{env, fs, io};

use docweave_core::SessionConfig;
use miette::miette;
use tracing::debug;

/// Load a session config, falling back to defaults when the file is absent.
///
/// `$NAME` references are replaced with environment variables before parsing.
pub fn load(path: &Path) -> miette::Result<SessionConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(SessionConfig::default());
        }
        Err(e) => return Err(miette!("error reading config file {}: {}", path.display(), e)),
    };
    parse(&substitute_env(raw, env::vars()))
}

pub fn parse(raw: &str) -> miette::Result<SessionConfig> {
    toml::from_str(raw).map_err(|e| miette!("error parsing config file {}", e))
}

/// Longer names are substituted first so `$HOMEPATH` is not clobbered by `$HOME`.
fn substitute_env(mut raw: String, vars: impl IntoIterator<Item = (String, String)>) -> String {
    let mut vars: Vec<_> = vars.into_iter().collect();
    vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (k, v) in vars {
        raw = raw.replace(&format!("${}", k), &v);
    }
    raw
}
