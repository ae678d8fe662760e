use dirs::home_dir;
use std::io;
use std::path::PathBuf;

/// Environment variable that relocates the agent home directory.
pub const WARDEN_HOME_ENV: &str = "WARDEN_HOME";

/// Returns the agent home directory, which holds `config.toml` and the
/// default data directory.
///
/// - If `WARDEN_HOME` is set, it must name an existing directory; the value is
///   canonicalized.
/// - Otherwise `~/.warden` is returned without checking that it exists.
pub fn find_warden_home() -> io::Result<PathBuf> {
    let env_value = std::env::var(WARDEN_HOME_ENV)
        .ok()
        .filter(|val| !val.is_empty());
    find_warden_home_from_env(env_value.as_deref())
}

fn find_warden_home_from_env(env_value: Option<&str>) -> io::Result<PathBuf> {
    let Some(val) = env_value else {
        let home = home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not find home directory"))?;
        return Ok(home.join(".warden"));
    };

    let path = PathBuf::from(val);
    let metadata = std::fs::metadata(&path).map_err(|err| {
        let message = if err.kind() == io::ErrorKind::NotFound {
            format!("{WARDEN_HOME_ENV} points to {val:?}, but that path does not exist")
        } else {
            format!("failed to read {WARDEN_HOME_ENV} {val:?}: {err}")
        };
        io::Error::new(err.kind(), message)
    })?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{WARDEN_HOME_ENV} points to {val:?}, but that path is not a directory"),
        ));
    }
    path.canonicalize().map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("failed to canonicalize {WARDEN_HOME_ENV} {val:?}: {err}"),
        )
    })
}
