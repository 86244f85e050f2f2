//! Provider configuration: caller overrides merged over documented defaults

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default `executes` value, also advertised as `default.threads`
pub const DEFAULT_EXECUTES: u32 = 1000;
/// Default protocol version advertised in the `dubbo` query field
pub const DEFAULT_PROTOCOL_VERSION: &str = "2.5.3.6";
/// Default namespace root under which interfaces are registered
pub const DEFAULT_REGISTRY_ROOT: &str = "dubbo";
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SPIN_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRIES: u32 = 5;

const FALLBACK_HOST: &str = "127.0.0.1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application identity advertised with every registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOption {
    pub name: String,
    pub version: Option<String>,
}

/// Coordination store address and session parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryOption {
    /// Connection string, e.g. `127.0.0.1:2181`
    pub address: String,
    /// Namespace root without surrounding slashes
    pub root: String,
    pub session_timeout_ms: u64,
    /// Delay between connection attempts
    pub spin_delay_ms: u64,
    pub retries: u32,
}

/// Validated provider configuration. Built once, never mutated after start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOption {
    /// Address advertised to callers
    pub host: String,
    pub port: u16,
    pub application: ApplicationOption,
    /// Value of the `dubbo` query field
    pub protocol_version: String,
    pub executes: u32,
    /// Advertised as `default.timeout`; descriptive only, never enforced here
    pub timeout: Option<u64>,
    pub environment: Option<String>,
    pub organization: Option<String>,
    pub owner: Option<String>,
    pub revision: Option<String>,
    pub registry: RegistryOption,
}

/// Caller-supplied application identity; all fields optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOverrides {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Caller-supplied registry settings; all fields optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryOverrides {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,
    #[serde(default)]
    pub spin_delay_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
}

/// Caller-supplied configuration, merged field-by-field over the defaults
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOverrides {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub application: ApplicationOverrides,
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub executes: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub registry: RegistryOverrides,
}

impl ProviderOverrides {
    /// Parse overrides from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read overrides from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}

impl ProviderOption {
    /// Merge overrides over the defaults and validate the result
    pub fn from_overrides(overrides: ProviderOverrides) -> Result<Self, ConfigError> {
        let port = overrides.port.ok_or(ConfigError::MissingField("port"))?;
        if port == 0 {
            return Err(ConfigError::InvalidField {
                field: "port",
                reason: "must be non-zero".to_string(),
            });
        }

        let application_name = non_empty(overrides.application.name)
            .ok_or(ConfigError::MissingField("application.name"))?;

        let executes = overrides.executes.unwrap_or(DEFAULT_EXECUTES);
        if executes == 0 {
            return Err(ConfigError::InvalidField {
                field: "executes",
                reason: "must be greater than zero".to_string(),
            });
        }

        let address = non_empty(overrides.registry.address)
            .ok_or(ConfigError::MissingField("registry.address"))?;

        let root = overrides
            .registry
            .root
            .unwrap_or_else(|| DEFAULT_REGISTRY_ROOT.to_string())
            .trim_matches('/')
            .to_string();
        if root.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "registry.root",
                reason: "must name at least one path segment".to_string(),
            });
        }

        let host = non_empty(overrides.host).unwrap_or_else(detect_host);

        Ok(Self {
            host,
            port,
            application: ApplicationOption {
                name: application_name,
                version: overrides.application.version,
            },
            protocol_version: overrides
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            executes,
            timeout: overrides.timeout,
            environment: overrides.environment,
            organization: overrides.organization,
            owner: overrides.owner,
            revision: overrides.revision,
            registry: RegistryOption {
                address,
                root,
                session_timeout_ms: overrides
                    .registry
                    .session_timeout_ms
                    .unwrap_or(DEFAULT_SESSION_TIMEOUT_MS),
                spin_delay_ms: overrides.registry.spin_delay_ms.unwrap_or(DEFAULT_SPIN_DELAY_MS),
                retries: overrides.registry.retries.unwrap_or(DEFAULT_RETRIES),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-loopback local address, or loopback when none can be found
fn detect_host() -> String {
    match local_ip_address::local_ip() {
        Ok(ip) => ip.to_string(),
        Err(e) => {
            debug!("Could not detect local address, using {}: {}", FALLBACK_HOST, e);
            FALLBACK_HOST.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ProviderOverrides {
        ProviderOverrides {
            host: Some("10.0.0.5".to_string()),
            port: Some(20880),
            application: ApplicationOverrides {
                name: Some("demo".to_string()),
                version: None,
            },
            registry: RegistryOverrides {
                address: Some("127.0.0.1:2181".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let option = ProviderOption::from_overrides(minimal()).unwrap();
        assert_eq!(option.host, "10.0.0.5");
        assert_eq!(option.executes, 1000);
        assert_eq!(option.protocol_version, "2.5.3.6");
        assert_eq!(option.registry.root, "dubbo");
        assert_eq!(option.registry.session_timeout_ms, 30_000);
        assert_eq!(option.registry.spin_delay_ms, 1_000);
        assert_eq!(option.registry.retries, 5);
        assert_eq!(option.timeout, None);
    }

    #[test]
    fn test_overrides_win_field_by_field() {
        let mut overrides = minimal();
        overrides.executes = Some(200);
        overrides.registry.retries = Some(9);
        overrides.registry.root = Some("/custom/".to_string());

        let option = ProviderOption::from_overrides(overrides).unwrap();
        assert_eq!(option.executes, 200);
        assert_eq!(option.registry.retries, 9);
        assert_eq!(option.registry.root, "custom");
        // untouched siblings keep their defaults
        assert_eq!(option.registry.session_timeout_ms, 30_000);
    }

    #[test]
    fn test_missing_port_rejected() {
        let mut overrides = minimal();
        overrides.port = None;
        let err = ProviderOption::from_overrides(overrides).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("port")));
    }

    #[test]
    fn test_missing_application_name_rejected() {
        let mut overrides = minimal();
        overrides.application.name = Some("  ".to_string());
        let err = ProviderOption::from_overrides(overrides).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("application.name")));
    }

    #[test]
    fn test_zero_executes_rejected() {
        let mut overrides = minimal();
        overrides.executes = Some(0);
        let err = ProviderOption::from_overrides(overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "executes", .. }));
    }

    #[test]
    fn test_empty_root_rejected() {
        let mut overrides = minimal();
        overrides.registry.root = Some("/".to_string());
        assert!(ProviderOption::from_overrides(overrides).is_err());
    }

    #[test]
    fn test_host_detected_when_absent() {
        let mut overrides = minimal();
        overrides.host = None;
        let option = ProviderOption::from_overrides(overrides).unwrap();
        assert!(!option.host.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
port: 20880
application:
  name: shop
  version: "1.2.0"
executes: 50
environment: test
registry:
  address: "zk:2181"
  sessionTimeoutMs: 10000
"#;
        let overrides = ProviderOverrides::from_yaml_str(yaml).unwrap();
        let option = ProviderOption::from_overrides(overrides).unwrap();
        assert_eq!(option.port, 20880);
        assert_eq!(option.application.version.as_deref(), Some("1.2.0"));
        assert_eq!(option.executes, 50);
        assert_eq!(option.environment.as_deref(), Some("test"));
        assert_eq!(option.registry.session_timeout_ms, 10_000);
        assert_eq!(option.registry.spin_delay_ms, 1_000);
    }
}
