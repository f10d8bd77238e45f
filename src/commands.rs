//! Store Operation Catalog
//!
//! Each operation takes an open [`Session`] plus typed arguments and returns a
//! decoded [`Reply`]. The resolver knows nothing about this catalog.

use chrono::{DateTime, Utc};
use redis::Cmd;

use crate::connection::{Reply, Session};
use crate::error::Result;

/// Test the connection
pub fn ping<S: Session + ?Sized>(session: &mut S) -> Result<Reply> {
    run(session, &redis::cmd("PING"))
}

/// Get the value of a simple key
pub fn get<S: Session + ?Sized>(session: &mut S, key: &str) -> Result<Reply> {
    let mut cmd = redis::cmd("GET");
    cmd.arg(key);
    run(session, &cmd)
}

/// Set a simple value
pub fn set<S: Session + ?Sized>(session: &mut S, request: &SetRequest) -> Result<Reply> {
    run(session, &request.to_cmd())
}

fn run<S: Session + ?Sized>(session: &mut S, cmd: &Cmd) -> Result<Reply> {
    let value = session.query(cmd)?;
    Reply::from_value(value, session.params())
}

/// Only set when the key does (not) exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    IfNotExists,
    IfExists,
}

/// Expiration applied by `SET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Seconds(u64),
    Milliseconds(u64),
    At(DateTime<Utc>),
    KeepTtl,
}

/// Arguments of `SET`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub name: String,
    pub value: String,
    pub condition: Option<SetCondition>,
    /// Return the previous value (`GET` flag)
    pub return_value: bool,
    pub expiry: Option<Expiry>,
}

impl SetRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            condition: None,
            return_value: false,
            expiry: None,
        }
    }

    fn to_cmd(&self) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(&self.name).arg(&self.value);

        match self.condition {
            Some(SetCondition::IfNotExists) => {
                cmd.arg("NX");
            }
            Some(SetCondition::IfExists) => {
                cmd.arg("XX");
            }
            None => {}
        }

        if self.return_value {
            cmd.arg("GET");
        }

        match self.expiry {
            Some(Expiry::Seconds(seconds)) => {
                cmd.arg("EX").arg(seconds);
            }
            Some(Expiry::Milliseconds(millis)) => {
                cmd.arg("PX").arg(millis);
            }
            // Sub-second deadlines need millisecond precision
            Some(Expiry::At(at)) if at.timestamp_subsec_millis() != 0 => {
                cmd.arg("PXAT").arg(at.timestamp_millis());
            }
            Some(Expiry::At(at)) => {
                cmd.arg("EXAT").arg(at.timestamp());
            }
            Some(Expiry::KeepTtl) => {
                cmd.arg("KEEPTTL");
            }
            None => {}
        }

        cmd
    }
}
