//! Redline - Redis CLI with Saved Credentials
//!
//! Redline is a command-line client for Redis/Valkey that remembers connection
//! parameters, so host, port, auth and TLS details need not be repeated on every
//! invocation.
//!
//! # Core Principles
//! - Credentials are stored locally in a single `SQLite` table (`~/.redis_pass.db`)
//! - Partial criteria resolve to exactly one stored credential
//! - The most generic matching credential wins (lowest specificity, first saved on ties)
//! - Passwords never appear in output, logs or error messages
//! - The Redis wire protocol is delegated to the `redis` crate
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`schema`] - Static field schema and value coercion
//! - [`credential`] - Credential records, specificity and URI rendering
//! - [`store`] - Local credential store
//! - [`connection`] - Connection factory and live sessions
//! - [`resolver`] - Credential resolution and registration
//! - [`commands`] - Store operation catalog (ping, get, set)
//! - [`output`] - JSON output envelopes

pub mod error;
pub mod schema;
pub mod credential;
pub mod store;
pub mod connection;
pub mod resolver;
pub mod commands;
pub mod output;

pub use error::{RedlineError, Result};
pub use schema::{Field, FieldKind, FieldMap, FieldSpec, FieldValue, Filters, Overrides, FIELDS};
pub use credential::{CertRequirement, Credential, EncodingErrors};
pub use store::{home_dir, CredentialStore, StoreConfig};
pub use connection::{Connector, RedisConnector, RedisSession, Reply, Session};
pub use resolver::{describe_registration, Registered, Resolver};
pub use commands::{Expiry, SetCondition, SetRequest};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
