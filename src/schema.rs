//! Credential Field Schema
//!
//! The credential store is untyped (SQLite text/number columns), so every value
//! read back has to be coerced into the type its field declares. Instead of
//! inspecting type names at runtime, each field is described once in [`FIELDS`]:
//! its column name, semantic kind, nullability, default, and SQL column type.
//!
//! The same table drives:
//! - specificity (comparison against `default`)
//! - schema creation (`sql_type` + `default`)
//! - row loading ([`FieldSpec::coerce`])
//! - filters and overrides (dynamic [`Field`] access on a credential)

use serde::Serialize;
use std::fmt;

use crate::credential::{CertRequirement, EncodingErrors};
use crate::error::{RedlineError, Result};

/// Every field of a credential record, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Host,
    Port,
    Username,
    Password,
    Db,
    RetryOnTimeout,
    SocketTimeout,
    SocketConnectTimeout,
    SocketKeepalive,
    DecodeResponses,
    Encoding,
    EncodingErrors,
    HealthCheckInterval,
    ClientName,
    Ssl,
    SslKeyfile,
    SslCertfile,
    SslCertReqs,
    SslCaCerts,
    SslCheckHostname,
}

impl Field {
    /// Fields forming the store's uniqueness constraint, in constraint order
    pub const IDENTITY: [Self; 6] =
        [Self::Host, Self::Username, Self::Password, Self::Port, Self::Db, Self::Ssl];

    /// Schema entry for this field
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self as usize]
    }

    /// Column / parameter name
    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Resolve a column name to its field
    ///
    /// Fails with a lookup error naming the column when no field declares it,
    /// which is how schema drift in the store surfaces.
    pub fn from_name(name: &str) -> Result<Self> {
        FIELDS.iter().find(|spec| spec.name == name).map(|spec| spec.field).ok_or_else(|| {
            RedlineError::lookup_failed(format!(
                "Cannot load data from the store - '{name}' is not a valid field name"
            ))
        })
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic kind of a field, used to pick a coercer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// Enumerated text with a closed set of allowed values
    Choice(&'static [&'static str]),
}

/// Declared default of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Null,
    Text(&'static str),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl DefaultValue {
    /// Check whether a value equals this default
    #[must_use]
    pub fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Self::Null, FieldValue::Null) => true,
            (Self::Text(a), FieldValue::Text(b)) => a == b,
            (Self::Integer(a), FieldValue::Integer(b)) => a == b,
            (Self::Float(a), FieldValue::Float(b)) => a == b,
            (Self::Boolean(a), FieldValue::Boolean(b)) => a == b,
            _ => false,
        }
    }

    /// Materialize the default as a field value
    #[must_use]
    pub fn to_value(&self) -> FieldValue {
        match *self {
            Self::Null => FieldValue::Null,
            Self::Text(s) => FieldValue::Text(s.to_string()),
            Self::Integer(i) => FieldValue::Integer(i),
            Self::Float(f) => FieldValue::Float(f),
            Self::Boolean(b) => FieldValue::Boolean(b),
        }
    }

    /// SQL literal for a `DEFAULT` clause (None for NULL defaults)
    #[must_use]
    pub fn sql_literal(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
        }
    }
}

/// One row of the field schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: DefaultValue,
    pub sql_type: &'static str,
}

const fn spec(
    field: Field,
    name: &'static str,
    kind: FieldKind,
    nullable: bool,
    default: DefaultValue,
    sql_type: &'static str,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        kind,
        nullable,
        default,
        sql_type,
    }
}

/// The credential schema, indexed by `Field as usize`
pub static FIELDS: [FieldSpec; 20] = [
    spec(
        Field::Host,
        "host",
        FieldKind::Text,
        false,
        DefaultValue::Text("localhost"),
        "VARCHAR(255) NOT NULL",
    ),
    spec(
        Field::Port,
        "port",
        FieldKind::Integer,
        false,
        DefaultValue::Integer(6379),
        "INTEGER",
    ),
    spec(
        Field::Username,
        "username",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(50)",
    ),
    spec(
        Field::Password,
        "password",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(50)",
    ),
    spec(
        Field::Db,
        "db",
        FieldKind::Integer,
        false,
        DefaultValue::Integer(0),
        "INTEGER",
    ),
    spec(
        Field::RetryOnTimeout,
        "retry_on_timeout",
        FieldKind::Boolean,
        false,
        DefaultValue::Boolean(false),
        "INTEGER",
    ),
    spec(
        Field::SocketTimeout,
        "socket_timeout",
        FieldKind::Float,
        true,
        DefaultValue::Null,
        "REAL",
    ),
    spec(
        Field::SocketConnectTimeout,
        "socket_connect_timeout",
        FieldKind::Float,
        true,
        DefaultValue::Null,
        "REAL",
    ),
    spec(
        Field::SocketKeepalive,
        "socket_keepalive",
        FieldKind::Boolean,
        true,
        DefaultValue::Null,
        "INTEGER",
    ),
    spec(
        Field::DecodeResponses,
        "decode_responses",
        FieldKind::Boolean,
        false,
        DefaultValue::Boolean(false),
        "INTEGER",
    ),
    spec(
        Field::Encoding,
        "encoding",
        FieldKind::Text,
        false,
        DefaultValue::Text("utf-8"),
        "VARCHAR(25)",
    ),
    spec(
        Field::EncodingErrors,
        "encoding_errors",
        FieldKind::Choice(EncodingErrors::VARIANTS),
        false,
        DefaultValue::Text("strict"),
        "VARCHAR(25)",
    ),
    spec(
        Field::HealthCheckInterval,
        "health_check_interval",
        FieldKind::Integer,
        false,
        DefaultValue::Integer(0),
        "INTEGER",
    ),
    spec(
        Field::ClientName,
        "client_name",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(255)",
    ),
    spec(
        Field::Ssl,
        "ssl",
        FieldKind::Boolean,
        false,
        DefaultValue::Boolean(false),
        "INTEGER",
    ),
    spec(
        Field::SslKeyfile,
        "ssl_keyfile",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(255)",
    ),
    spec(
        Field::SslCertfile,
        "ssl_certfile",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(255)",
    ),
    spec(
        Field::SslCertReqs,
        "ssl_cert_reqs",
        FieldKind::Choice(CertRequirement::VARIANTS),
        false,
        DefaultValue::Text("required"),
        "VARCHAR(255)",
    ),
    spec(
        Field::SslCaCerts,
        "ssl_ca_certs",
        FieldKind::Text,
        true,
        DefaultValue::Null,
        "VARCHAR(255)",
    ),
    spec(
        Field::SslCheckHostname,
        "ssl_check_hostname",
        FieldKind::Boolean,
        false,
        DefaultValue::Boolean(false),
        "INTEGER",
    ),
];

impl FieldSpec {
    /// Coerce a raw value into this field's declared type
    ///
    /// - NULL passes through for nullable fields
    /// - `Choice` fields only accept one of their options
    /// - everything else goes through the primitive coercer for `kind`
    pub fn coerce(&self, raw: FieldValue) -> Result<FieldValue> {
        if raw.is_null() {
            return if self.nullable {
                Ok(FieldValue::Null)
            } else {
                Err(RedlineError::validation_failed(format!(
                    "'Credential.{}' may not be null",
                    self.name
                )))
            };
        }

        match self.kind {
            FieldKind::Choice(options) => {
                let allowed =
                    matches!(&raw, FieldValue::Text(value) if options.contains(&value.as_str()));
                if allowed {
                    Ok(raw)
                } else {
                    Err(RedlineError::validation_failed(format!(
                        "'{raw}' is not a valid value for 'Credential.{}' - the only valid options are: {}",
                        self.name,
                        options.join(", ")
                    )))
                }
            }
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Integer => self.coerce_integer(raw),
            FieldKind::Float => self.coerce_float(raw),
            FieldKind::Boolean => self.coerce_boolean(raw),
        }
    }

    fn invalid(&self, raw: &FieldValue, expected: &str) -> RedlineError {
        RedlineError::validation_failed(format!(
            "'{raw}' is not a valid {expected} for 'Credential.{}'",
            self.name
        ))
    }

    fn coerce_integer(&self, raw: FieldValue) -> Result<FieldValue> {
        match raw {
            FieldValue::Integer(_) => Ok(raw),
            FieldValue::Boolean(b) => Ok(FieldValue::Integer(i64::from(b))),
            // Only integral reals; truncating would silently change a stored port
            FieldValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                Ok(FieldValue::Integer(f as i64))
            }
            FieldValue::Text(ref s) => {
                s.trim().parse().map(FieldValue::Integer).map_err(|_| self.invalid(&raw, "integer"))
            }
            _ => Err(self.invalid(&raw, "integer")),
        }
    }

    fn coerce_float(&self, raw: FieldValue) -> Result<FieldValue> {
        match raw {
            FieldValue::Float(_) => Ok(raw),
            FieldValue::Integer(i) => Ok(FieldValue::Float(i as f64)),
            FieldValue::Text(ref s) => {
                s.trim().parse().map(FieldValue::Float).map_err(|_| self.invalid(&raw, "number"))
            }
            _ => Err(self.invalid(&raw, "number")),
        }
    }

    fn coerce_boolean(&self, raw: FieldValue) -> Result<FieldValue> {
        match raw {
            FieldValue::Boolean(_) => Ok(raw),
            FieldValue::Integer(i) => Ok(FieldValue::Boolean(i != 0)),
            FieldValue::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(FieldValue::Boolean(true)),
                "0" | "false" => Ok(FieldValue::Boolean(false)),
                _ => Err(self.invalid(&raw, "boolean")),
            },
            _ => Err(self.invalid(&raw, "boolean")),
        }
    }
}

/// A dynamically typed field value
///
/// This is what filters, overrides, and stored rows are expressed in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl FieldValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An ordered set of `field = value` pairs
///
/// Used both as resolver filters and as connection overrides. Inserting a field
/// that is already present replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(Field, FieldValue)>,
}

/// Filter criteria for [`crate::resolver::Resolver::resolve_by_filters`]
pub type Filters = FieldMap;

/// Per-call connection parameter overrides
pub type Overrides = FieldMap;

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FieldMap::insert`]
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: Field, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.entries.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.entries.iter().map(|(f, v)| (*f, v))
    }

    /// Copy with every value coerced to its field's declared type
    pub fn coerced(&self) -> Result<Self> {
        let entries = self
            .entries
            .iter()
            .map(|(field, value)| field.spec().coerce(value.clone()).map(|value| (*field, value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

impl fmt::Display for FieldMap {
    /// Renders as `{host=cache, port=6380}`; passwords are masked
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if *field == Field::Password && !value.is_null() {
                write!(f, "{field}=<password>")?;
            } else {
                write!(f, "{field}={value}")?;
            }
        }
        f.write_str("}")
    }
}
