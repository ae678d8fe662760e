//! Detection of the shell interpreters installed on this host and resolution
//! of a requested [`ShellType`] to the argv prefix that runs a command string.

use std::path::Path;

use indexmap::IndexMap;
use warden_protocol::ShellType;
use warden_protocol::message::ShellInfo;

use crate::error::ShellResolutionError;

const POWERSHELL_ARGS: [&str; 3] = ["-NoProfile", "-NonInteractive", "-Command"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Shells tried, in order, when `auto` is requested.
    fn auto_preference(self) -> [ShellType; 2] {
        match self {
            Platform::Windows => [ShellType::PowerShell, ShellType::Cmd],
            Platform::Posix => [ShellType::Bash, ShellType::Sh],
        }
    }
}

/// Host facts consulted while detecting shells.
pub trait ShellProbe {
    /// Whether `program` can be found on `PATH`.
    fn has_program(&self, program: &str) -> bool;
    fn path_exists(&self, path: &Path) -> bool;
    /// Whether this kernel reports running under WSL.
    fn is_wsl(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ShellProbe for SystemProbe {
    fn has_program(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_wsl(&self) -> bool {
        is_wsl()
    }
}

/// Whether `/proc/version` carries the WSL kernel marker.
pub fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|version| version.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Shells available on this host mapped to their invocation prefix, in
/// detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableShells {
    shells: IndexMap<ShellType, Vec<String>>,
}

impl AvailableShells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, shell: ShellType, prefix: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shells
            .insert(shell, prefix.into_iter().map(Into::into).collect());
    }

    pub fn get(&self, shell: ShellType) -> Option<&[String]> {
        self.shells.get(&shell).map(Vec::as_slice)
    }

    pub fn contains(&self, shell: ShellType) -> bool {
        self.shells.contains_key(&shell)
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn shell_types(&self) -> Vec<ShellType> {
        self.shells.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShellType, &[String])> {
        self.shells
            .iter()
            .map(|(shell, prefix)| (*shell, prefix.as_slice()))
    }

    pub fn to_shell_infos(&self) -> Vec<ShellInfo> {
        self.iter()
            .map(|(shell_type, prefix)| ShellInfo {
                shell_type,
                command: prefix.to_vec(),
            })
            .collect()
    }
}

/// Probe the running host for shells.
pub fn detect_available() -> AvailableShells {
    detect_available_with(Platform::current(), &SystemProbe)
}

pub fn detect_available_with(platform: Platform, probe: &dyn ShellProbe) -> AvailableShells {
    let mut available = AvailableShells::new();
    match platform {
        Platform::Windows => {
            if let Some(powershell) = ["pwsh", "powershell"]
                .into_iter()
                .find(|program| probe.has_program(program))
            {
                available.insert(ShellType::PowerShell, powershell_prefix(powershell));
            }
            available.insert(ShellType::Cmd, ["cmd.exe", "/C"]);
            if probe.has_program("wsl") {
                available.insert(ShellType::Wsl2, ["wsl", "--", "bash", "-c"]);
            }
        }
        Platform::Posix => {
            if probe.path_exists(Path::new("/bin/bash")) {
                available.insert(ShellType::Bash, ["/bin/bash", "-c"]);
            }
            if probe.path_exists(Path::new("/bin/sh")) {
                available.insert(ShellType::Sh, ["/bin/sh", "-c"]);
            }
            // Inside WSL the distro's own bash is the WSL shell.
            if probe.is_wsl() {
                available.insert(ShellType::Wsl2, ["/bin/bash", "-c"]);
            }
            if probe.has_program("pwsh") {
                available.insert(ShellType::PowerShell, powershell_prefix("pwsh"));
            }
        }
    }
    available
}

fn powershell_prefix(program: &str) -> Vec<String> {
    std::iter::once(program)
        .chain(POWERSHELL_ARGS)
        .map(ToString::to_string)
        .collect()
}

/// Resolve `requested` against `available` for the running platform.
pub fn resolve(
    requested: ShellType,
    available: &AvailableShells,
) -> Result<(ShellType, Vec<String>), ShellResolutionError> {
    resolve_for_platform(requested, available, Platform::current())
}

/// A concrete request must name an available shell. `auto` walks the
/// platform preference and then falls back to the first detected shell.
pub fn resolve_for_platform(
    requested: ShellType,
    available: &AvailableShells,
    platform: Platform,
) -> Result<(ShellType, Vec<String>), ShellResolutionError> {
    if requested != ShellType::Auto {
        return available
            .get(requested)
            .map(|prefix| (requested, prefix.to_vec()))
            .ok_or_else(|| ShellResolutionError::NotAvailable {
                requested,
                available: available.shell_types(),
            });
    }

    platform
        .auto_preference()
        .into_iter()
        .find_map(|shell| available.get(shell).map(|prefix| (shell, prefix.to_vec())))
        .or_else(|| {
            available
                .iter()
                .next()
                .map(|(shell, prefix)| (shell, prefix.to_vec()))
        })
        .ok_or(ShellResolutionError::NoShellAvailable)
}
