//! Credential Records
//!
//! A [`Credential`] is every parameter needed to open a Redis connection: address,
//! auth, TLS, timeouts, and reply decoding. Records are persisted by the
//! [`crate::store`] and selected by the [`crate::resolver`].
//!
//! # Specificity
//! Specificity is the fraction of fields that differ from their declared
//! default. It is a ranking signal only and is never persisted.
//!
//! # Secrets
//! Neither `Display` (the connection URI) nor `Debug` ever print the password;
//! both render it as the literal `<password>`.

use std::fmt;
use std::str::FromStr;

use crate::connection::{Connector, RedisConnector, RedisSession, Session};
use crate::error::{RedlineError, Result};
use crate::schema::{Field, FieldValue, Filters, Overrides, FIELDS};

/// Error handling policy when decoding replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingErrors {
    /// Fail on undecodable bytes
    #[default]
    Strict,
    /// Drop undecodable bytes
    Ignore,
    /// Substitute U+FFFD for undecodable bytes
    Replace,
}

impl EncodingErrors {
    pub const VARIANTS: &'static [&'static str] = &["strict", "ignore", "replace"];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
        }
    }
}

impl FromStr for EncodingErrors {
    type Err = RedlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(Self::Strict),
            "ignore" => Ok(Self::Ignore),
            "replace" => Ok(Self::Replace),
            other => Err(RedlineError::validation_failed(format!(
                "'{other}' is not a valid encoding error policy - the only valid options are: {}",
                Self::VARIANTS.join(", ")
            ))),
        }
    }
}

impl fmt::Display for EncodingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly the server's TLS certificate is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertRequirement {
    None,
    Optional,
    #[default]
    Required,
}

impl CertRequirement {
    pub const VARIANTS: &'static [&'static str] = &["none", "optional", "required"];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Optional => "optional",
            Self::Required => "required",
        }
    }
}

impl FromStr for CertRequirement {
    type Err = RedlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            other => Err(RedlineError::validation_failed(format!(
                "'{other}' is not a valid certificate requirement - the only valid options are: {}",
                Self::VARIANTS.join(", ")
            ))),
        }
    }
}

impl fmt::Display for CertRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Redis connection credentials
///
/// `host`, `username`, `password`, `port`, `db` and `ssl` identify a record in the
/// store; saving a record with the same identity replaces the stored one.
#[derive(Clone, PartialEq)]
pub struct Credential {
    /// Hostname or IP address of the Redis/Valkey server
    pub host: String,
    /// Port the server listens on
    pub port: u16,
    /// ACL username
    pub username: Option<String>,
    /// Password for authenticating the connection
    /// WARNING: Sensitive data, do not log or include in error messages
    pub password: Option<String>,
    /// Logical database number
    pub db: i64,
    /// Retry a command once when it times out instead of failing
    pub retry_on_timeout: bool,
    /// Read/write timeout in seconds; blocks indefinitely when unset
    pub socket_timeout: Option<f64>,
    /// Connect timeout in seconds; blocks indefinitely when unset
    pub socket_connect_timeout: Option<f64>,
    pub socket_keepalive: Option<bool>,
    /// Decode bulk replies to text with `encoding`
    pub decode_responses: bool,
    pub encoding: String,
    pub encoding_errors: EncodingErrors,
    /// Seconds of idleness after which the connection is pinged before use; 0 disables
    pub health_check_interval: u64,
    /// Name registered with `CLIENT SETNAME`
    pub client_name: Option<String>,
    /// Connect over TLS
    pub ssl: bool,
    /// Private key for TLS client authentication
    pub ssl_keyfile: Option<String>,
    /// Certificate for TLS client authentication
    pub ssl_certfile: Option<String>,
    pub ssl_cert_reqs: CertRequirement,
    /// CA bundle used to verify the server certificate
    pub ssl_ca_certs: Option<String>,
    pub ssl_check_hostname: bool,
}

impl Default for Credential {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            retry_on_timeout: false,
            socket_timeout: None,
            socket_connect_timeout: None,
            socket_keepalive: None,
            decode_responses: false,
            encoding: "utf-8".to_string(),
            encoding_errors: EncodingErrors::Strict,
            health_check_interval: 0,
            client_name: None,
            ssl: false,
            ssl_keyfile: None,
            ssl_certfile: None,
            ssl_cert_reqs: CertRequirement::Required,
            ssl_ca_certs: None,
            ssl_check_hostname: false,
        }
    }
}

impl Credential {
    /// Credential for `host` with every other field at its default
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Read a field dynamically
    #[must_use]
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Host => self.host.as_str().into(),
            Field::Port => self.port.into(),
            Field::Username => self.username.clone().into(),
            Field::Password => self.password.clone().into(),
            Field::Db => self.db.into(),
            Field::RetryOnTimeout => self.retry_on_timeout.into(),
            Field::SocketTimeout => self.socket_timeout.into(),
            Field::SocketConnectTimeout => self.socket_connect_timeout.into(),
            Field::SocketKeepalive => self.socket_keepalive.into(),
            Field::DecodeResponses => self.decode_responses.into(),
            Field::Encoding => self.encoding.as_str().into(),
            Field::EncodingErrors => self.encoding_errors.as_str().into(),
            // Saturates rather than wraps; intervals beyond i64 are not meaningful
            Field::HealthCheckInterval => {
                i64::try_from(self.health_check_interval).unwrap_or(i64::MAX).into()
            }
            Field::ClientName => self.client_name.clone().into(),
            Field::Ssl => self.ssl.into(),
            Field::SslKeyfile => self.ssl_keyfile.clone().into(),
            Field::SslCertfile => self.ssl_certfile.clone().into(),
            Field::SslCertReqs => self.ssl_cert_reqs.as_str().into(),
            Field::SslCaCerts => self.ssl_ca_certs.clone().into(),
            Field::SslCheckHostname => self.ssl_check_hostname.into(),
        }
    }

    /// Write a field dynamically
    ///
    /// The value is coerced through the field schema first, so stored rows,
    /// filters, and overrides all obey the same typing rules.
    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) -> Result<()> {
        let value = field.spec().coerce(value.into())?;

        match field {
            Field::Host => self.host = required(field, value.into_text())?,
            Field::Port => {
                let port = required(field, value.as_integer())?;
                self.port = u16::try_from(port).map_err(|_| out_of_range(field, port))?;
            }
            Field::Username => self.username = value.into_text(),
            Field::Password => self.password = value.into_text(),
            Field::Db => self.db = required(field, value.as_integer())?,
            Field::RetryOnTimeout => self.retry_on_timeout = required(field, value.as_bool())?,
            Field::SocketTimeout => self.socket_timeout = value.as_float(),
            Field::SocketConnectTimeout => self.socket_connect_timeout = value.as_float(),
            Field::SocketKeepalive => self.socket_keepalive = value.as_bool(),
            Field::DecodeResponses => self.decode_responses = required(field, value.as_bool())?,
            Field::Encoding => self.encoding = required(field, value.into_text())?,
            Field::EncodingErrors => {
                self.encoding_errors = required(field, value.into_text())?.parse()?;
            }
            Field::HealthCheckInterval => {
                let seconds = required(field, value.as_integer())?;
                self.health_check_interval =
                    u64::try_from(seconds).map_err(|_| out_of_range(field, seconds))?;
            }
            Field::ClientName => self.client_name = value.into_text(),
            Field::Ssl => self.ssl = required(field, value.as_bool())?,
            Field::SslKeyfile => self.ssl_keyfile = value.into_text(),
            Field::SslCertfile => self.ssl_certfile = value.into_text(),
            Field::SslCertReqs => {
                self.ssl_cert_reqs = required(field, value.into_text())?.parse()?;
            }
            Field::SslCaCerts => self.ssl_ca_certs = value.into_text(),
            Field::SslCheckHostname => self.ssl_check_hostname = required(field, value.as_bool())?,
        }

        Ok(())
    }

    /// How broad or specific this credential is, in `[0, 1]`
    ///
    /// The higher the number, the more fields deviate from their defaults.
    #[must_use]
    pub fn specificity(&self) -> f64 {
        let total = FIELDS.len();
        if total == 0 {
            return 0.0;
        }

        let changed =
            FIELDS.iter().filter(|spec| !spec.default.matches(&self.get(spec.field))).count();

        changed as f64 / total as f64
    }

    /// Copy of this credential with `overrides` applied on top
    pub fn with_overrides(&self, overrides: &Overrides) -> Result<Self> {
        let mut merged = self.clone();
        for (field, value) in overrides.iter() {
            merged.set(field, value.clone())?;
        }
        Ok(merged)
    }

    /// Connect to Redis with these credentials
    ///
    /// `overrides` win over the stored values for this connection only.
    pub fn connect(&self, overrides: &Overrides) -> Result<RedisSession> {
        self.connect_with(&RedisConnector, overrides)
    }

    /// Connect through a specific connector
    pub fn connect_with<C: Connector>(
        &self,
        connector: &C,
        overrides: &Overrides,
    ) -> Result<C::Session> {
        let params = self.with_overrides(overrides)?;
        connector.connect(&params)
    }

    /// Credential matching the parameters an open session was created with
    #[must_use]
    pub fn from_connection<S: Session + ?Sized>(session: &S) -> Self {
        session.params().clone()
    }

    /// True when every `(field, value)` pair equals this credential's field
    ///
    /// Filter values are coerced through the field schema first, so `ssl = 1`
    /// matches `ssl = true` and `socket_timeout = 2` matches `2.0`. A value the
    /// field cannot hold is a validation error.
    pub fn matches(&self, filters: &Filters) -> Result<bool> {
        for (field, value) in filters.iter() {
            if self.get(field) != field.spec().coerce(value.clone())? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn required<T>(field: Field, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| {
        RedlineError::validation_failed(format!("'Credential.{field}' may not be null"))
    })
}

fn out_of_range(field: Field, value: i64) -> RedlineError {
    RedlineError::validation_failed(format!("{value} is out of range for 'Credential.{field}'"))
}

impl fmt::Display for Credential {
    /// `redis://[username[:<password>]@]host:port/db`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.ssl { "rediss" } else { "redis" };
        write!(f, "{scheme}://")?;

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            f.write_str(username)?;
            if self.password.as_deref().is_some_and(|p| !p.is_empty()) {
                f.write_str(":<password>")?;
            }
            f.write_str("@")?;
        }

        write!(f, "{}:{}/{}", self.host, self.port, self.db)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<password>"))
            .field("db", &self.db)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("socket_connect_timeout", &self.socket_connect_timeout)
            .field("socket_keepalive", &self.socket_keepalive)
            .field("decode_responses", &self.decode_responses)
            .field("encoding", &self.encoding)
            .field("encoding_errors", &self.encoding_errors)
            .field("health_check_interval", &self.health_check_interval)
            .field("client_name", &self.client_name)
            .field("ssl", &self.ssl)
            .field("ssl_keyfile", &self.ssl_keyfile)
            .field("ssl_certfile", &self.ssl_certfile)
            .field("ssl_cert_reqs", &self.ssl_cert_reqs)
            .field("ssl_ca_certs", &self.ssl_ca_certs)
            .field("ssl_check_hostname", &self.ssl_check_hostname)
            .finish()
    }
}
