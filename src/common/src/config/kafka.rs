//! Broker connection settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How the tool authenticates against the cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    /// Plaintext, no authentication.
    #[default]
    None,
    /// One-way TLS.
    Tls,
    /// SASL/PLAIN without TLS.
    Plain,
    /// SASL/PLAIN over TLS.
    PlainTls,
    /// SASL/GSSAPI (Kerberos) without TLS.
    Gssapi,
    /// SASL/GSSAPI (Kerberos) over TLS.
    GssapiTls,
}

impl SecurityProtocol {
    fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::None => "none",
            SecurityProtocol::Tls => "tls",
            SecurityProtocol::Plain => "plain",
            SecurityProtocol::PlainTls => "plain_tls",
            SecurityProtocol::Gssapi => "gssapi",
            SecurityProtocol::GssapiTls => "gssapi_tls",
        }
    }

    /// Value for librdkafka's `security.protocol`.
    pub fn librdkafka_protocol(&self) -> &'static str {
        match self {
            SecurityProtocol::None => "plaintext",
            SecurityProtocol::Tls => "ssl",
            SecurityProtocol::Plain | SecurityProtocol::Gssapi => "sasl_plaintext",
            SecurityProtocol::PlainTls | SecurityProtocol::GssapiTls => "sasl_ssl",
        }
    }

    /// SASL mechanism, if the protocol authenticates.
    pub fn sasl_mechanism(&self) -> Option<&'static str> {
        match self {
            SecurityProtocol::Plain | SecurityProtocol::PlainTls => Some("PLAIN"),
            SecurityProtocol::Gssapi | SecurityProtocol::GssapiTls => Some("GSSAPI"),
            SecurityProtocol::None | SecurityProtocol::Tls => None,
        }
    }
}

impl fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MODES: &str = "none, tls, plain, plain_tls, gssapi, gssapi_tls";

impl FromStr for SecurityProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(SecurityProtocol::None),
            "tls" => Ok(SecurityProtocol::Tls),
            "plain" => Ok(SecurityProtocol::Plain),
            "plain_tls" => Ok(SecurityProtocol::PlainTls),
            "gssapi" => Ok(SecurityProtocol::Gssapi),
            "gssapi_tls" => Ok(SecurityProtocol::GssapiTls),
            other => Err(ConfigError::InvalidValue {
                field: "kafka.security",
                reason: format!("unknown security mode '{other}', expected one of: {MODES}"),
            }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma-separated list of bootstrap brokers.
    ///
    /// Env: IDLE_TOPICS__KAFKA__BOOTSTRAP_SERVERS (or KAFKA_BOOTSTRAP via the CLI)
    pub bootstrap_servers: String,
    pub security: SecurityProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gssapi_keytab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gssapi_service_name: Option<String>,
    pub client_id: String,
    /// Timeout applied to every metadata and offset request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: String::new(),
            security: SecurityProtocol::None,
            username: None,
            password: None,
            gssapi_keytab: None,
            gssapi_service_name: None,
            client_id: "kafka-idle-topics".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl KafkaConfig {
    /// Check that the credentials required by the security mode are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ConfigError::EmptyBootstrap);
        }

        match self.security {
            SecurityProtocol::Plain | SecurityProtocol::PlainTls => {
                require(&self.username, "username", "PLAIN")?;
                require(&self.password, "password", "PLAIN")?;
            }
            SecurityProtocol::Gssapi | SecurityProtocol::GssapiTls => {
                require(&self.gssapi_keytab, "gssapi_keytab", "GSSAPI")?;
                require(&self.gssapi_service_name, "gssapi_service_name", "GSSAPI")?;
            }
            SecurityProtocol::None | SecurityProtocol::Tls => {}
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "kafka.request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// librdkafka client properties for this connection.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut properties = vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("client.id", self.client_id.clone()),
            (
                "security.protocol",
                self.security.librdkafka_protocol().to_string(),
            ),
            (
                "socket.timeout.ms",
                self.request_timeout.as_millis().to_string(),
            ),
        ];

        if let Some(mechanism) = self.security.sasl_mechanism() {
            properties.push(("sasl.mechanism", mechanism.to_string()));
        }

        match self.security {
            SecurityProtocol::Plain | SecurityProtocol::PlainTls => {
                push_some(&mut properties, "sasl.username", &self.username);
                push_some(&mut properties, "sasl.password", &self.password);
            }
            SecurityProtocol::Gssapi | SecurityProtocol::GssapiTls => {
                push_some(
                    &mut properties,
                    "sasl.kerberos.keytab",
                    &self.gssapi_keytab,
                );
                push_some(
                    &mut properties,
                    "sasl.kerberos.service.name",
                    &self.gssapi_service_name,
                );
            }
            SecurityProtocol::None | SecurityProtocol::Tls => {}
        }

        properties
    }
}

fn require(
    value: &Option<String>,
    field: &'static str,
    mechanism: &'static str,
) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingCredential { field, mechanism }),
    }
}

fn push_some(
    properties: &mut Vec<(&'static str, String)>,
    key: &'static str,
    value: &Option<String>,
) {
    if let Some(value) = value {
        properties.push((key, value.clone()));
    }
}
