//! Device settings loaded once at boot from `settings.toml`
//!
//! The file uses the CircuitPython `settings.toml` subset: one `KEY = value`
//! per line, where a value is a double-quoted string, an integer or a
//! boolean. `#` starts a comment. Keys the node does not know about are
//! ignored so the same file can carry settings for other tools.
//!
//! ```text
//! CIRCUITPY_WIFI_SSID = "home"
//! CIRCUITPY_WIFI_PASSWORD = "pw"
//! LOGFLARE_API_KEY = "abc123"
//! LOGFLARE_SOURCE_ID = "0f1e2d3c-..."
//! READING_INTERVAL = 10   # seconds
//! ```
//!
//! A missing file or a missing required key is fatal: the node cannot reach
//! the network or the logging service without them.

#[cfg(feature = "defmt")]
use defmt::Format;
use hal_abstractions::{LinkCredentials, Remote, SettingsStore, StoreError};
use heapless::String;

/// Default Logflare ingestion endpoint
pub const DEFAULT_API_URL: &str = "https://api.logflare.app/logs";

/// Default seconds between readings
pub const DEFAULT_READING_INTERVAL_SECS: u32 = 10;

/// Longest decoded value the parser accepts
const MAX_VALUE_LEN: usize = 128;

/// Configuration loading errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ConfigError {
    /// No settings file on the device
    NotFound,
    /// Storage failed or the file exceeds the read buffer
    Storage,
    /// File is not valid UTF-8
    Encoding,
    /// Line is not `KEY = value`
    Syntax { line: usize },
    /// A known key appears twice
    DuplicateKey { line: usize },
    /// Value does not fit its field
    TooLong { line: usize },
    /// Required key absent or empty
    MissingKey(&'static str),
    /// Value has the wrong type or is out of range
    InvalidValue(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "settings file not found"),
            Self::Storage => write!(f, "settings storage error"),
            Self::Encoding => write!(f, "settings file is not UTF-8"),
            Self::Syntax { line } => write!(f, "syntax error on line {}", line),
            Self::DuplicateKey { line } => write!(f, "duplicate key on line {}", line),
            Self::TooLong { line } => write!(f, "value too long on line {}", line),
            Self::MissingKey(key) => write!(f, "{} not configured", key),
            Self::InvalidValue(key) => write!(f, "invalid value for {}", key),
        }
    }
}

impl core::error::Error for ConfigError {}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ConfigError::NotFound,
            StoreError::TooLarge | StoreError::Io => ConfigError::Storage,
        }
    }
}

/// Where the node is installed; selects which PM concentration set is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Placement {
    /// Use the sensor's "standard" (CF=1, factory) concentrations
    #[default]
    Indoor,
    /// Use the sensor's "environmental" (atmospheric) concentrations
    Outdoor,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indoor => "indoor",
            Self::Outdoor => "outdoor",
        }
    }
}

/// Units used on the status screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Units {
    Metric,
    #[default]
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

/// Parsed `http(s)://host[:port]/path` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub secure: bool,
    pub host: String<64>,
    pub port: u16,
    pub path: String<128>,
}

impl Endpoint {
    /// Parse an absolute http or https URL. Query strings are not allowed;
    /// the relay appends its own.
    pub fn parse(url: &str) -> Option<Self> {
        let (secure, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (false, rest)
        } else {
            return None;
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };
        if path.contains('?') || path.contains('#') {
            return None;
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().ok().filter(|p| *p != 0)?),
            None => (authority, if secure { 443 } else { 80 }),
        };
        if host.is_empty() || host.contains('@') {
            return None;
        }

        Some(Self {
            secure,
            host: String::try_from(host).ok()?,
            port,
            path: String::try_from(path).ok()?,
        })
    }

    /// Stream endpoint for the connector
    pub fn remote(&self) -> Remote<'_> {
        Remote {
            host: self.host.as_str(),
            port: self.port,
            secure: self.secure,
        }
    }
}

/// Immutable device settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    pub logflare_api_key: String<64>,
    pub logflare_source_id: String<64>,
    pub endpoint: Endpoint,
    pub device_location: String<32>,
    pub placement: Placement,
    pub display_units: Units,
    pub reading_interval_secs: u32,
    pub spa06_enabled: bool,
    /// Overrides the SNTP server list when set
    pub ntp_server: Option<String<64>>,
}

impl Settings {
    /// Parse the text of a settings file
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut draft = Draft::default();
        let mut seen: u16 = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let Some((name, value)) = parse_line(raw, line)? else {
                continue;
            };
            let Some(key) = Key::from_name(name) else {
                trace!("ignoring unknown settings key on line {}", line);
                continue;
            };
            let bit = 1u16 << (key as u16);
            if seen & bit != 0 {
                return Err(ConfigError::DuplicateKey { line });
            }
            seen |= bit;
            draft.apply(key, value, line)?;
        }

        draft.finish()
    }

    pub fn credentials(&self) -> LinkCredentials<'_> {
        LinkCredentials {
            ssid: self.wifi_ssid.as_str(),
            password: self.wifi_password.as_str(),
        }
    }
}

/// Read and parse the settings file from `store`
///
/// `buf` must be large enough to hold the whole file.
pub fn load<S: SettingsStore>(store: &mut S, buf: &mut [u8]) -> Result<Settings, ConfigError> {
    let len = store.read(buf)?;
    let text = core::str::from_utf8(&buf[..len]).map_err(|_| ConfigError::Encoding)?;
    let settings = Settings::parse(text)?;
    info!(
        "Settings loaded: location={}, interval={}s",
        settings.device_location.as_str(),
        settings.reading_interval_secs
    );
    Ok(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    WifiSsid,
    WifiPassword,
    ApiKey,
    SourceId,
    ApiUrl,
    Location,
    Environment,
    DisplayUnits,
    ReadingInterval,
    EnableSpa06,
    NtpServer,
}

impl Key {
    const ALL: [Key; 11] = [
        Key::WifiSsid,
        Key::WifiPassword,
        Key::ApiKey,
        Key::SourceId,
        Key::ApiUrl,
        Key::Location,
        Key::Environment,
        Key::DisplayUnits,
        Key::ReadingInterval,
        Key::EnableSpa06,
        Key::NtpServer,
    ];

    fn name(self) -> &'static str {
        match self {
            Key::WifiSsid => "CIRCUITPY_WIFI_SSID",
            Key::WifiPassword => "CIRCUITPY_WIFI_PASSWORD",
            Key::ApiKey => "LOGFLARE_API_KEY",
            Key::SourceId => "LOGFLARE_SOURCE_ID",
            Key::ApiUrl => "LOGFLARE_API_URL",
            Key::Location => "DEVICE_LOCATION",
            Key::Environment => "DEVICE_ENVIRONMENT",
            Key::DisplayUnits => "DISPLAY_UNITS",
            Key::ReadingInterval => "READING_INTERVAL",
            Key::EnableSpa06 => "ENABLE_SPA06",
            Key::NtpServer => "NTP_SERVER",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String<MAX_VALUE_LEN>),
    Int(i64),
    Bool(bool),
}

/// Split one line into key and value. `Ok(None)` for blank and comment lines.
fn parse_line(raw: &str, line: usize) -> Result<Option<(&str, Value)>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (name, rest) = trimmed
        .split_once('=')
        .ok_or(ConfigError::Syntax { line })?;
    let name = name.trim();
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid_name {
        return Err(ConfigError::Syntax { line });
    }

    let rest = rest.trim_start();
    let value = if let Some(quoted) = rest.strip_prefix('"') {
        parse_quoted(quoted, line)?
    } else {
        let bare = match rest.find('#') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
        .trim_end();
        match bare {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Int(parse_int(bare).ok_or(ConfigError::Syntax { line })?),
        }
    };

    Ok(Some((name, value)))
}

/// Decode a basic string whose opening quote was already consumed
fn parse_quoted(s: &str, line: usize) -> Result<Value, ConfigError> {
    let mut out: String<MAX_VALUE_LEN> = String::new();
    let mut chars = s.char_indices();

    while let Some((idx, c)) = chars.next() {
        let decoded = match c {
            '"' => {
                let tail = s[idx + 1..].trim_start();
                if tail.is_empty() || tail.starts_with('#') {
                    return Ok(Value::Str(out));
                }
                return Err(ConfigError::Syntax { line });
            }
            '\\' => match chars.next() {
                Some((_, '"')) => '"',
                Some((_, '\\')) => '\\',
                Some((_, 'n')) => '\n',
                Some((_, 't')) => '\t',
                Some((_, 'u')) => {
                    let mut code = 0u32;
                    for _ in 0..4 {
                        let digit = chars
                            .next()
                            .and_then(|(_, h)| h.to_digit(16))
                            .ok_or(ConfigError::Syntax { line })?;
                        code = code * 16 + digit;
                    }
                    char::from_u32(code).ok_or(ConfigError::Syntax { line })?
                }
                _ => return Err(ConfigError::Syntax { line }),
            },
            c => c,
        };
        out.push(decoded).map_err(|_| ConfigError::TooLong { line })?;
    }

    // Unterminated string
    Err(ConfigError::Syntax { line })
}

/// Decimal integer; TOML allows `_` between digits
fn parse_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return None;
    }
    let mut acc: i64 = 0;
    for b in digits.bytes() {
        match b {
            b'_' => continue,
            b'0'..=b'9' => {
                acc = acc.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
            }
            _ => return None,
        }
    }
    Some(if negative { -acc } else { acc })
}

#[derive(Default)]
struct Draft {
    wifi_ssid: Option<String<32>>,
    wifi_password: Option<String<64>>,
    api_key: Option<String<64>>,
    source_id: Option<String<64>>,
    endpoint: Option<Endpoint>,
    location: Option<String<32>>,
    placement: Option<Placement>,
    units: Option<Units>,
    interval: Option<u32>,
    spa06: Option<bool>,
    ntp_server: Option<String<64>>,
}

impl Draft {
    fn apply(&mut self, key: Key, value: Value, line: usize) -> Result<(), ConfigError> {
        match key {
            Key::WifiSsid => self.wifi_ssid = Some(text(key, &value, line)?),
            Key::WifiPassword => self.wifi_password = Some(text(key, &value, line)?),
            Key::ApiKey => self.api_key = Some(text(key, &value, line)?),
            Key::SourceId => self.source_id = Some(text(key, &value, line)?),
            Key::Location => self.location = Some(text(key, &value, line)?),
            Key::NtpServer => {
                let server: String<64> = text(key, &value, line)?;
                self.ntp_server = (!server.is_empty()).then_some(server);
            }
            Key::ApiUrl => {
                let url: String<MAX_VALUE_LEN> = text(key, &value, line)?;
                let endpoint = Endpoint::parse(url.as_str())
                    .ok_or(ConfigError::InvalidValue(key.name()))?;
                self.endpoint = Some(endpoint);
            }
            // Only "outdoor" and "metric" switch away from the default;
            // any other word keeps the device running with the default
            Key::Environment => {
                let raw: String<MAX_VALUE_LEN> = text(key, &value, line)?;
                self.placement = Some(if raw.eq_ignore_ascii_case("outdoor") {
                    Placement::Outdoor
                } else {
                    if !raw.eq_ignore_ascii_case("indoor") {
                        warn!("Unknown {} '{}', using indoor", key.name(), raw.as_str());
                    }
                    Placement::Indoor
                });
            }
            Key::DisplayUnits => {
                let raw: String<MAX_VALUE_LEN> = text(key, &value, line)?;
                self.units = Some(if raw.eq_ignore_ascii_case("metric") {
                    Units::Metric
                } else {
                    if !raw.eq_ignore_ascii_case("imperial") {
                        warn!("Unknown {} '{}', using imperial", key.name(), raw.as_str());
                    }
                    Units::Imperial
                });
            }
            Key::ReadingInterval => {
                let secs = match &value {
                    Value::Int(n) => Some(*n),
                    Value::Str(s) => s.as_str().trim().parse::<i64>().ok(),
                    Value::Bool(_) => None,
                };
                let secs = secs
                    .filter(|n| *n >= 1)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or(ConfigError::InvalidValue(key.name()))?;
                self.interval = Some(secs);
            }
            Key::EnableSpa06 => {
                self.spa06 = Some(match &value {
                    Value::Bool(b) => *b,
                    Value::Str(s) => s.as_str().eq_ignore_ascii_case("true"),
                    Value::Int(_) => return Err(ConfigError::InvalidValue(key.name())),
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Settings, ConfigError> {
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Endpoint::parse(DEFAULT_API_URL)
                .ok_or(ConfigError::InvalidValue(Key::ApiUrl.name()))?,
        };
        let location = match self.location {
            Some(location) if !location.is_empty() => location,
            _ => String::try_from("default").map_err(|_| ConfigError::InvalidValue(Key::Location.name()))?,
        };

        Ok(Settings {
            wifi_ssid: required(self.wifi_ssid, Key::WifiSsid)?,
            wifi_password: required(self.wifi_password, Key::WifiPassword)?,
            logflare_api_key: required(self.api_key, Key::ApiKey)?,
            logflare_source_id: required(self.source_id, Key::SourceId)?,
            endpoint,
            device_location: location,
            placement: self.placement.unwrap_or_default(),
            display_units: self.units.unwrap_or_default(),
            reading_interval_secs: self.interval.unwrap_or(DEFAULT_READING_INTERVAL_SECS),
            spa06_enabled: self.spa06.unwrap_or(false),
            ntp_server: self.ntp_server,
        })
    }
}

fn text<const N: usize>(key: Key, value: &Value, line: usize) -> Result<String<N>, ConfigError> {
    match value {
        Value::Str(s) => String::try_from(s.as_str()).map_err(|_| ConfigError::TooLong { line }),
        _ => Err(ConfigError::InvalidValue(key.name())),
    }
}

fn required<const N: usize>(value: Option<String<N>>, key: Key) -> Result<String<N>, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingKey(key.name()))
}
