//! Provider URL and registration query
//!
//! `dubbo://{host}:{port}/{instancePath}?{query}`, stored percent-encoded as
//! the leaf name under `/{root}/{interface}/providers`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use provider_api::ProviderOption;
use provider_core::ServiceDescriptor;
use std::fmt;

pub const PROVIDER_SCHEME: &str = "dubbo";

/// Characters left as-is by encodeURIComponent
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Registration metadata, kept in the advertised key order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationQuery {
    fields: Vec<(&'static str, String)>,
}

impl RegistrationQuery {
    /// Build the metadata advertised for `service`
    pub fn build(option: &ProviderOption, service: &ServiceDescriptor, pid: u32, timestamp_ms: i64) -> Self {
        let executes = option.executes.to_string();
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        let fields = vec![
            ("anyhost", "true".to_string()),
            ("application", option.application.name.clone()),
            ("application.version", text(&option.application.version)),
            ("default.executes", executes.clone()),
            ("default.threads", executes),
            ("default.timeout", option.timeout.map(|t| t.to_string()).unwrap_or_default()),
            ("dubbo", option.protocol_version.clone()),
            ("environment", text(&option.environment)),
            ("interface", service.interface().to_string()),
            ("methods", service.method_names().collect::<Vec<_>>().join(",")),
            ("organization", text(&option.organization)),
            ("owner", text(&option.owner)),
            ("pid", pid.to_string()),
            ("revision", text(&option.revision)),
            ("side", "provider".to_string()),
            ("timestamp", timestamp_ms.to_string()),
            ("version", service.version().to_string()),
        ];
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }
}

impl fmt::Display for RegistrationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", encode_component(key), encode_component(value))?;
        }
        Ok(())
    }
}

/// The address a provider advertises for one service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderUrl {
    pub host: String,
    pub port: u16,
    /// Interface name, suffixed when the name is registered more than once
    pub instance_path: String,
    pub query: RegistrationQuery,
}

impl ProviderUrl {
    /// `/{root}/{interface}/providers/{encoded url}`
    pub fn registration_path(&self, root: &str, interface: &str) -> String {
        format!(
            "/{}/{}/providers/{}",
            root,
            interface,
            encode_component(&self.to_string())
        )
    }
}

impl fmt::Display for ProviderUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}?{}",
            PROVIDER_SCHEME, self.host, self.port, self.instance_path, self.query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_api::{ApplicationOverrides, ProviderOverrides, RegistryOverrides};
    use provider_core::handler_fn;
    use serde_json::Value;

    fn option() -> ProviderOption {
        ProviderOption::from_overrides(ProviderOverrides {
            host: Some("10.0.0.5".to_string()),
            port: Some(20880),
            application: ApplicationOverrides {
                name: Some("shop".to_string()),
                version: Some("1.0".to_string()),
            },
            timeout: Some(3000),
            owner: Some("team a".to_string()),
            registry: RegistryOverrides {
                address: Some("zk:2181".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn service() -> ServiceDescriptor {
        let noop = || handler_fn(|_args: Vec<Value>| async { Ok::<_, anyhow::Error>(Value::Null) });
        ServiceDescriptor::new("com.demo.Greeter", "2.0.0")
            .method("sayHello", noop())
            .method("sayBye", noop())
    }

    #[test]
    fn test_encode_component_matches_uri_component_rules() {
        assert_eq!(encode_component("a b/c:d?e=f&g,h"), "a%20b%2Fc%3Ad%3Fe%3Df%26g%2Ch");
        assert_eq!(encode_component("keep-_.!~*'()"), "keep-_.!~*'()");
    }

    #[test]
    fn test_query_key_order() {
        let query = RegistrationQuery::build(&option(), &service(), 42, 1700000000000);
        let keys: Vec<&str> = query.keys().collect();
        assert_eq!(
            keys,
            vec![
                "anyhost",
                "application",
                "application.version",
                "default.executes",
                "default.threads",
                "default.timeout",
                "dubbo",
                "environment",
                "interface",
                "methods",
                "organization",
                "owner",
                "pid",
                "revision",
                "side",
                "timestamp",
                "version",
            ]
        );
    }

    #[test]
    fn test_query_values() {
        let query = RegistrationQuery::build(&option(), &service(), 42, 1700000000000);
        assert_eq!(query.get("default.executes"), Some("1000"));
        assert_eq!(query.get("default.threads"), Some("1000"));
        assert_eq!(query.get("default.timeout"), Some("3000"));
        assert_eq!(query.get("dubbo"), Some("2.5.3.6"));
        assert_eq!(query.get("methods"), Some("sayHello,sayBye"));
        assert_eq!(query.get("side"), Some("provider"));
        assert_eq!(query.get("pid"), Some("42"));
        assert_eq!(query.get("version"), Some("2.0.0"));
        assert_eq!(query.get("environment"), Some(""));
    }

    #[test]
    fn test_query_rendering() {
        let query = RegistrationQuery::build(&option(), &service(), 42, 1700000000000).to_string();
        assert!(query.starts_with("anyhost=true&application=shop&application.version=1.0&"));
        assert!(query.contains("&methods=sayHello%2CsayBye&"));
        assert!(query.contains("&owner=team%20a&"));
        assert!(query.contains("&environment=&"));
        assert!(query.ends_with("&timestamp=1700000000000&version=2.0.0"));
    }

    #[test]
    fn test_url_and_registration_path() {
        let option = option();
        let url = ProviderUrl {
            host: option.host.clone(),
            port: option.port,
            instance_path: "com.demo.Greeter2".to_string(),
            query: RegistrationQuery::build(&option, &service(), 42, 1),
        };
        let rendered = url.to_string();
        assert!(rendered.starts_with("dubbo://10.0.0.5:20880/com.demo.Greeter2?anyhost=true&"));

        let path = url.registration_path("dubbo", "com.demo.Greeter");
        assert!(path.starts_with("/dubbo/com.demo.Greeter/providers/dubbo%3A%2F%2F10.0.0.5%3A20880%2Fcom.demo.Greeter2%3F"));
        // the leaf is a single path segment
        assert_eq!(path.matches('/').count(), 4);
    }
}
