use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt};

use ini::{Ini, ParseOption};
use madstatus::{Credentials, Endpoint, EndpointError, RebootPolicy, RetryPolicy};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

/// Section holding `name = origin;extra` device entries
const DEVICES_SECTION: &str = "Devices";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("\"{0}\" does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadFailed(#[from] ini::Error),

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid configuration: {key} = '{value}' - {reason}")]
    InvalidValue { key: String, value: String, reason: String },

    #[error("No devices configured in [Devices]")]
    NoDevices,

    #[error("Invalid status endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("Could not determine the default config path")]
    ConfigPathUnavailable,
}

/// A monitored device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    /// Identifier used against both status services
    pub origin: String,
}

/// Connection settings for one status service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub proto: String,
    pub host: String,
    pub port: u16,
    pub status_endpoint: String,
    pub credentials: Credentials,
}

impl ServiceConfig {
    pub fn endpoint(&self, trailing_slash: bool) -> Result<Endpoint, EndpointError> {
        Endpoint::from_parts(
            &self.proto,
            &self.host,
            self.port,
            &self.status_endpoint,
            trailing_slash,
            self.credentials.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file: PathBuf,
    pub backups: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause after triggering a reboot
    pub reboot_cooldown: Duration,
    /// Pause between two sweeps
    pub sweep_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            reboot_cooldown: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootConfig {
    pub command: PathBuf,
    pub policy: RebootPolicy,
}

impl Default for RebootConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from(madstatus::DEFAULT_REBOOT_COMMAND),
            policy: RebootPolicy::default(),
        }
    }
}

/// Complete daemon configuration, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mitm: ServiceConfig,
    pub madmin: ServiceConfig,
    pub log: LogConfig,
    pub timing: TimingConfig,
    pub reboot: RebootConfig,
    /// In file order
    pub devices: Vec<Device>,
}

/// Values are taken as written: no escape sequences and no quote stripping
pub fn parse_option() -> ParseOption {
    ParseOption { enabled_escape: false, enabled_quote: false, ..ParseOption::default() }
}

/// Get default config path (`configs/config.ini` next to the executable)
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let exe = env::current_exe().map_err(|_err| ConfigError::ConfigPathUnavailable)?;
    let dir = exe.parent().ok_or(ConfigError::ConfigPathUnavailable)?;
    Ok(dir.join("configs").join("config.ini"))
}

impl Config {
    /// Load the config from `optional_path` or the default location.
    ///
    /// A missing file is an error; there is no usable default config.
    pub fn from_config(optional_path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        let config_path = match optional_path {
            Some(path) => path.as_ref().to_path_buf(),
            None => default_config_path()?,
        };

        if !config_path.is_file() {
            return Err(ConfigError::NotFound(config_path));
        }

        let ini = Ini::load_from_file_opt(&config_path, parse_option())?;
        Self::from_ini(&ini)
    }

    /// Build the config from parsed ini content.
    ///
    /// `[Devices]` lists the devices; keys of every other section share one
    /// flat, case-insensitive namespace.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        let mut devices = Vec::new();
        let mut device_names = HashSet::new();

        for (section, properties) in ini.iter() {
            let is_devices = section.is_some_and(|s| s.eq_ignore_ascii_case(DEVICES_SECTION));
            for (key, value) in properties.iter() {
                if is_devices {
                    if !device_names.insert(key.to_ascii_lowercase()) {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                            reason: "device is listed more than once".to_string(),
                        });
                    }
                    devices.push(parse_device(key, value)?);
                } else {
                    settings.values.insert(key.to_ascii_lowercase(), value.trim().to_string());
                }
            }
        }

        if devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        let mitm = ServiceConfig {
            proto: settings.proto("mitm_proto")?,
            host: settings.required("mitm_receiver_ip")?.to_string(),
            port: settings.parse("mitm_receiver_port", "must be a port number")?,
            status_endpoint: settings.required("mitm_receiver_status_endpoint")?.to_string(),
            credentials: Credentials::new(
                settings.required("mitm_user")?,
                settings.required("mitm_pass")?,
            ),
        };

        let madmin = ServiceConfig {
            proto: settings.proto("madmin_proto")?,
            host: settings.required("madmin_ip")?.to_string(),
            port: settings.parse("madmin_port", "must be a port number")?,
            status_endpoint: settings.required("madmin_status_endpoint")?.to_string(),
            credentials: Credentials::new(
                settings.required("madmin_user")?,
                settings.required("madmin_pass")?,
            ),
        };

        let level_name = settings.required("log_level")?;
        let log = LogConfig {
            level: logger::parse_level(level_name).ok_or_else(|| ConfigError::InvalidValue {
                key: "log_level".to_string(),
                value: level_name.to_string(),
                reason: "expected DEBUG, INFO, WARNING, ERROR or CRITICAL".to_string(),
            })?,
            file: PathBuf::from(settings.required("log_filename")?),
            backups: settings.parse_or("log_backups", 3, "must be a whole number")?,
        };

        let defaults = TimingConfig::default();
        let retry_defaults = RetryPolicy::default();
        let timing = TimingConfig {
            request_timeout: settings.seconds_or("request_timeout", defaults.request_timeout)?,
            retry: RetryPolicy {
                empty_body: settings.seconds_or("retry_delay_empty", retry_defaults.empty_body)?,
                http_status: settings.seconds_or("retry_delay_http", retry_defaults.http_status)?,
                timeout: settings.seconds_or("retry_delay_timeout", retry_defaults.timeout)?,
                connect: settings.seconds_or("retry_delay_connect", retry_defaults.connect)?,
                unexpected_status: settings
                    .seconds_or("retry_delay_status", retry_defaults.unexpected_status)?,
                other: settings.seconds_or("retry_delay_other", retry_defaults.other)?,
                max_retries: settings.optional_parse("max_retries", "must be a whole number")?,
            },
            reboot_cooldown: settings.seconds_or("reboot_cooldown", defaults.reboot_cooldown)?,
            sweep_interval: settings.seconds_or("sweep_interval", defaults.sweep_interval)?,
        };

        let policy_defaults = RebootPolicy::default();
        let reboot = RebootConfig {
            command: settings
                .optional("reboot_command")
                .map(PathBuf::from)
                .unwrap_or_else(|| RebootConfig::default().command),
            policy: RebootPolicy {
                data_stale_minutes: settings.parse_or(
                    "data_stale_minutes",
                    policy_defaults.data_stale_minutes,
                    "must be a whole number of minutes",
                )?,
                proto_stale_minutes: settings.parse_or(
                    "proto_stale_minutes",
                    policy_defaults.proto_stale_minutes,
                    "must be a whole number of minutes",
                )?,
            },
        };

        Ok(Self { mitm, madmin, log, timing, reboot, devices })
    }

    /// mitm receiver status page, always with a trailing slash
    pub fn mitm_endpoint(&self) -> Result<Endpoint, EndpointError> {
        self.mitm.endpoint(true)
    }

    pub fn madmin_endpoint(&self) -> Result<Endpoint, EndpointError> {
        self.madmin.endpoint(false)
    }
}

/// `name = origin;extra` -> device; everything after the first `;` is ignored
fn parse_device(name: &str, value: &str) -> Result<Device, ConfigError> {
    let origin = value.split(';').next().unwrap_or_default().trim();
    if origin.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: name.to_string(),
            value: value.to_string(),
            reason: "device entry needs an origin before the first ';'".to_string(),
        });
    }

    Ok(Device { name: name.to_string(), origin: origin.to_string() })
}

/// Flattened key space of every non-device section
#[derive(Default)]
struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    fn optional(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.optional(key).ok_or(ConfigError::MissingKey(key))
    }

    fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str, reason: &str) -> Result<T, ConfigError> {
        let value = self.required(key)?;
        value.parse::<T>().map_err(|_| Self::invalid(key, value, reason))
    }

    fn optional_parse<T: std::str::FromStr>(
        &self,
        key: &str,
        reason: &str,
    ) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| value.parse::<T>().map_err(|_| Self::invalid(key, value, reason)))
            .transpose()
    }

    fn parse_or<T: std::str::FromStr>(
        &self,
        key: &str,
        default: T,
        reason: &str,
    ) -> Result<T, ConfigError> {
        Ok(self.optional_parse(key, reason)?.unwrap_or(default))
    }

    fn seconds_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self
            .optional_parse::<u64>(key, "must be a whole number of seconds")?
            .map(Duration::from_secs)
            .unwrap_or(default))
    }

    fn proto(&self, key: &'static str) -> Result<String, ConfigError> {
        let value = self.required(key)?;
        match value.to_ascii_lowercase().as_str() {
            proto @ ("http" | "https") => Ok(proto.to_string()),
            _ => Err(Self::invalid(key, value, "must be http or https")),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration State:")?;
        for (title, service) in [("MITM Receiver", &self.mitm), ("MADmin", &self.madmin)] {
            write_title_1(f, title)?;
            write_1(f, "Protocol", &service.proto)?;
            write_1(f, "Host", &service.host)?;
            write_1(f, "Port", &service.port)?;
            write_1(f, "Status Endpoint", &service.status_endpoint)?;
            write_1(f, "User", &service.credentials.user)?;
            write_1(f, "Password", &"***")?;
        }

        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.log.level)?;
        write_1(f, "File", &self.log.file.display())?;
        write_1(f, "Backups", &self.log.backups)?;

        write_title_1(f, "Timing")?;
        write_1(f, "Request Timeout (s)", &self.timing.request_timeout.as_secs())?;
        let max_retries =
            self.timing.retry.max_retries.map_or("unbounded".to_string(), |n| n.to_string());
        write_1(f, "Max Retries", &max_retries)?;
        write_1(f, "Reboot Cooldown (s)", &self.timing.reboot_cooldown.as_secs())?;
        write_1(f, "Sweep Interval (s)", &self.timing.sweep_interval.as_secs())?;

        write_title_1(f, "Reboot")?;
        write_1(f, "Command", &self.reboot.command.display())?;
        write_1(f, "Data Stale After (min)", &self.reboot.policy.data_stale_minutes)?;
        write_1(f, "Proto Stale After (min)", &self.reboot.policy.proto_stale_minutes)?;

        write_title_1(f, "Devices")?;
        for device in &self.devices {
            write_2(f, &device.name, &device.origin)?;
        }

        Ok(())
    }
}
