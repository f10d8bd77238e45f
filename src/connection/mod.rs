//! Connection Factory
//!
//! Turns a resolved [`Credential`] into a live Redis session. The resolver and the
//! CLI never build connections themselves; they go through a [`Connector`], which
//! keeps the network out of resolution logic and lets tests substitute an
//! in-memory session.
//!
//! # Parameter Mapping
//! - `host`, `port`, `ssl`, `ssl_cert_reqs = none` → connection address (TCP or TLS)
//! - `db`, `username`, `password` → `AUTH` / `SELECT` performed by the client
//! - `socket_connect_timeout` → connect timeout
//! - `socket_timeout` → read and write timeouts
//! - `client_name` → `CLIENT SETNAME` after connecting
//! - `ssl_keyfile`, `ssl_certfile`, `ssl_ca_certs` → TLS certificates (feature `tls`)
//! - `retry_on_timeout`, `health_check_interval` → applied per command by [`RedisSession`]

mod reply;

pub use reply::{decode, Reply};

use redis::{Client, Cmd, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::credential::{CertRequirement, Credential};
use crate::error::{RedlineError, Result};
use crate::schema::Field;

/// An open connection (the "connection handle")
pub trait Session {
    /// The parameters this session was opened with
    fn params(&self) -> &Credential;

    /// Run a command and return the raw reply
    fn query(&mut self, cmd: &Cmd) -> Result<Value>;

    /// Verify the server is alive
    fn ping(&mut self) -> Result<()> {
        match self.query(&redis::cmd("PING"))? {
            Value::SimpleString(s) if s.eq_ignore_ascii_case("PONG") => Ok(()),
            Value::BulkString(b) if b.eq_ignore_ascii_case(b"PONG") => Ok(()),
            other => Err(RedlineError::connection_failed(format!(
                "Unexpected reply to PING from '{}': {other:?}",
                self.params()
            ))),
        }
    }
}

/// Opens sessions from credentials
pub trait Connector {
    type Session: Session;

    fn connect(&self, params: &Credential) -> Result<Self::Session>;
}

/// Connector backed by the `redis` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl Connector for RedisConnector {
    type Session = RedisSession;

    fn connect(&self, params: &Credential) -> Result<RedisSession> {
        let client = build_client(params, connection_info(params))?;

        let conn = match params.socket_connect_timeout {
            Some(secs) => {
                client.get_connection_with_timeout(seconds(Field::SocketConnectTimeout, secs)?)
            }
            None => client.get_connection(),
        }
        .map_err(|e| {
            RedlineError::connection_failed(format!("Could not connect to '{params}': {e}"))
        })?;

        let timeout = params
            .socket_timeout
            .map(|secs| seconds(Field::SocketTimeout, secs))
            .transpose()?;
        conn.set_read_timeout(timeout)
            .and_then(|()| conn.set_write_timeout(timeout))
            .map_err(|e| {
                RedlineError::connection_failed(format!("Could not set socket timeout: {e}"))
            })?;

        log_unapplied(params);
        debug!(uri = %params, "connected");

        let mut session = RedisSession {
            conn,
            params: params.clone(),
            last_used: Instant::now(),
        };

        if let Some(name) = &params.client_name {
            let mut setname = redis::cmd("CLIENT");
            setname.arg("SETNAME").arg(name);
            session.query(&setname)?;
        }

        Ok(session)
    }
}

/// Live session over a synchronous `redis::Connection`
pub struct RedisSession {
    conn: redis::Connection,
    params: Credential,
    last_used: Instant,
}

impl RedisSession {
    /// Ping first when the session has been idle longer than the health check interval
    fn check_health(&mut self) -> Result<()> {
        let interval = self.params.health_check_interval;
        if interval == 0 || self.last_used.elapsed() < Duration::from_secs(interval) {
            return Ok(());
        }

        debug!(uri = %self.params, "health check");
        redis::cmd("PING").query::<Value>(&mut self.conn).map_err(|e| {
            RedlineError::connection_failed(format!(
                "Health check against '{}' failed: {e}",
                self.params
            ))
        })?;
        self.last_used = Instant::now();
        Ok(())
    }
}

impl Session for RedisSession {
    fn params(&self) -> &Credential {
        &self.params
    }

    fn query(&mut self, cmd: &Cmd) -> Result<Value> {
        self.check_health()?;

        let result = match cmd.query::<Value>(&mut self.conn) {
            Err(e) if e.is_timeout() && self.params.retry_on_timeout => {
                debug!(uri = %self.params, "command timed out, retrying once");
                cmd.query::<Value>(&mut self.conn)
            }
            other => other,
        };
        self.last_used = Instant::now();

        result.map_err(|e| {
            if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                RedlineError::connection_failed(format!(
                    "Lost connection to '{}': {e}",
                    self.params
                ))
            } else {
                RedlineError::command_failed(e.to_string())
            }
        })
    }
}

fn connection_info(params: &Credential) -> ConnectionInfo {
    let addr = if params.ssl {
        ConnectionAddr::TcpTls {
            host: params.host.clone(),
            port: params.port,
            insecure: params.ssl_cert_reqs == CertRequirement::None,
            tls_params: None,
        }
    } else {
        ConnectionAddr::Tcp(params.host.clone(), params.port)
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: params.db,
            username: params.username.clone(),
            password: params.password.clone(),
            ..Default::default()
        },
    }
}

#[cfg(feature = "tls")]
fn build_client(params: &Credential, info: ConnectionInfo) -> Result<Client> {
    let has_certificates = params.ssl_certfile.is_some()
        || params.ssl_keyfile.is_some()
        || params.ssl_ca_certs.is_some();

    if !params.ssl || !has_certificates {
        return Client::open(info).map_err(|e| RedlineError::config_error(e.to_string()));
    }

    let client_tls = match (&params.ssl_certfile, &params.ssl_keyfile) {
        (Some(cert), Some(key)) => Some(redis::ClientTlsConfig {
            client_cert: read_pem(Field::SslCertfile, cert)?,
            client_key: read_pem(Field::SslKeyfile, key)?,
        }),
        (None, None) => None,
        _ => {
            return Err(RedlineError::config_error(
                "'ssl_certfile' and 'ssl_keyfile' must be provided together",
            ));
        }
    };
    let root_cert =
        params.ssl_ca_certs.as_deref().map(|path| read_pem(Field::SslCaCerts, path)).transpose()?;

    Client::build_with_tls(info, redis::TlsCertificates {
        client_tls,
        root_cert,
    })
        .map_err(|e| RedlineError::config_error(format!("Invalid TLS configuration: {e}")))
}

#[cfg(not(feature = "tls"))]
fn build_client(params: &Credential, info: ConnectionInfo) -> Result<Client> {
    if params.ssl {
        return Err(RedlineError::config_error(
            "TLS connections are not enabled. Build with --features tls",
        ));
    }
    Client::open(info).map_err(|e| RedlineError::config_error(e.to_string()))
}

#[cfg(feature = "tls")]
fn read_pem(field: Field, path: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| RedlineError::config_error(format!("Could not read '{field}' ({path}): {e}")))
}

fn seconds(field: Field, secs: f64) -> Result<Duration> {
    if secs <= 0.0 {
        return Err(RedlineError::validation_failed(format!(
            "'Credential.{field}' must be positive, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        RedlineError::validation_failed(format!(
            "'Credential.{field}' is not a valid duration: {e}"
        ))
    })
}

/// Parameters that are stored and carried but have no knob on a sync connection
fn log_unapplied(params: &Credential) {
    if params.socket_keepalive == Some(false) {
        warn!("socket_keepalive=false is not applied; the client always enables TCP keepalive");
    }
    if params.ssl && params.ssl_check_hostname {
        debug!("ssl_check_hostname is implied by certificate verification");
    }
    if params.ssl && params.ssl_cert_reqs == CertRequirement::Optional {
        debug!("ssl_cert_reqs=optional is verified as required");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_plain() {
        let params = Credential {
            username: Some("app".to_string()),
            password: Some("secret".to_string()),
            db: 2,
            ..Credential::for_host("cache")
        };
        let info = connection_info(&params);

        assert!(matches!(info.addr, ConnectionAddr::Tcp(ref host, 6379) if host == "cache"));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.username.as_deref(), Some("app"));
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_connection_info_tls() {
        let verified = Credential {
            ssl: true,
            ..Credential::for_host("cache")
        };
        assert!(matches!(
            connection_info(&verified).addr,
            ConnectionAddr::TcpTls { insecure: false, .. }
        ));

        let unverified = Credential {
            ssl_cert_reqs: CertRequirement::None,
            ..verified
        };
        assert!(matches!(
            connection_info(&unverified).addr,
            ConnectionAddr::TcpTls { insecure: true, .. }
        ));
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(Field::SocketTimeout, 1.5).unwrap(), Duration::from_millis(1500));
        assert!(seconds(Field::SocketTimeout, 0.0).is_err());
        assert!(seconds(Field::SocketTimeout, -1.0).is_err());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_half_client_certificate_is_rejected() {
        let params = Credential {
            ssl: true,
            ssl_certfile: Some("/nonexistent/client.crt".to_string()),
            ..Credential::default()
        };
        let err = build_client(&params, connection_info(&params)).err().unwrap();
        assert!(matches!(err, RedlineError::ConfigError(_)));
    }

    #[test]
    #[ignore = "Requires running Redis instance"]
    fn test_connect_and_ping_local_redis() {
        let mut session = RedisConnector.connect(&Credential::default()).unwrap();
        session.ping().unwrap();
        assert_eq!(Credential::from_connection(&session), Credential::default());
    }
}
