// SQL Server client driver discovery.  Drivers are registered with unixODBC
// in odbcinst.ini, one [section] per driver, and on Windows under the
// ODBCINST.INI registry key.

use std::env;
use std::fmt;
#[cfg(not(windows))]
use std::fs;
use std::io;
use std::path::PathBuf;

use log::{info, warn};
use regex::Regex;

use crate::error::ExtractError;

/// Most capable first.  The first one installed on the host wins.
pub const PREFERRED_DRIVERS: [&str; 3] = [
    "ODBC Driver 18 for SQL Server",
    "ODBC Driver 17 for SQL Server",
    "SQL Server",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub name: String,
    major_version: Option<u32>,
}

impl Driver {
    pub fn new(name: &str) -> Driver {
        Driver {
            name: name.to_string(),
            major_version: parse_major_version(name),
        }
    }

    /// The major version in names like "ODBC Driver 18 for SQL Server".
    /// The legacy "SQL Server" driver has none.
    pub fn major_version(&self) -> Option<u32> {
        self.major_version
    }

    /// Driver 18 encrypts by default and refuses self-signed server
    /// certificates.  We connect to it with TrustServerCertificate=yes.
    pub fn trust_server_certificate(&self) -> bool {
        self.major_version() == Some(18)
    }
}

fn parse_major_version(name: &str) -> Option<u32> {
    let re = Regex::new(r"Driver (\d+)").ok()?;
    re.captures(name)?.get(1)?.as_str().parse().ok()
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Pick the first entry of [`PREFERRED_DRIVERS`] present in `available`.
pub fn select_driver(available: &[String]) -> Result<Driver, ExtractError> {
    PREFERRED_DRIVERS
        .iter()
        .find(|preferred| available.iter().any(|a| a == *preferred))
        .map(|name| Driver::new(name))
        .ok_or_else(|| ExtractError::DriverUnavailable(available.to_vec()))
}

/// Location of the unixODBC driver registry, honoring ODBCSYSINI and
/// ODBCINSTINI the same way unixODBC does.
pub fn registry_path() -> PathBuf {
    let dir = env::var("ODBCSYSINI").unwrap_or_else(|_| "/etc".to_string());
    let file = env::var("ODBCINSTINI").unwrap_or_else(|_| "odbcinst.ini".to_string());
    PathBuf::from(dir).join(file)
}

/// Driver names declared in an odbcinst.ini file, in file order.
pub fn parse_registry(content: &str) -> Vec<String> {
    let re = Regex::new(r"^\s*\[([^\]]+)\]\s*$").unwrap();
    content
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|c| c[1].trim().to_string())
        .filter(|name| !name.eq_ignore_ascii_case("ODBC"))
        .collect()
}

/// Driver names from the values of the Windows `ODBC Drivers` registry key.
/// Each value is a driver name whose data reads "Installed" when usable.
pub fn installed_from_registry_values<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    values
        .into_iter()
        .filter(|(_, data)| data.trim_end_matches('\0').eq_ignore_ascii_case("Installed"))
        .map(|(name, _)| name)
        .collect()
}

/// Drivers installed on this host, read from
/// `HKLM\SOFTWARE\ODBC\ODBCINST.INI\ODBC Drivers`.
#[cfg(windows)]
pub fn installed_drivers() -> Vec<String> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    match hklm.open_subkey(WINDOWS_DRIVERS_KEY) {
        Ok(key) => installed_from_registry_values(
            key.enum_values()
                .filter_map(|v| v.ok())
                .map(|(name, value)| (name, value.to_string())),
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("no driver registry at HKLM\\{}", WINDOWS_DRIVERS_KEY);
            vec![]
        }
        Err(e) => {
            warn!("cannot read driver registry HKLM\\{}: {}", WINDOWS_DRIVERS_KEY, e);
            vec![]
        }
    }
}

#[cfg(windows)]
const WINDOWS_DRIVERS_KEY: &str = r"SOFTWARE\ODBC\ODBCINST.INI\ODBC Drivers";

/// Drivers installed on this host.  A missing or unreadable registry means
/// nothing is installed.
#[cfg(not(windows))]
pub fn installed_drivers() -> Vec<String> {
    let path = registry_path();
    match fs::read_to_string(&path) {
        Ok(content) => parse_registry(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("no driver registry at {}", path.display());
            vec![]
        }
        Err(e) => {
            warn!("cannot read driver registry {}: {}", path.display(), e);
            vec![]
        }
    }
}
