//! Shared helpers for integration tests
//!
//! Provides throwaway credential stores and an in-memory connector so resolution
//! and registration can be exercised without a Redis server.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use redis::{Cmd, Value};
use redline::{Connector, Credential, CredentialStore, RedlineError, Result, Session, StoreConfig};

// ============================================================================
// Temporary Stores
// ============================================================================

/// Path of a fresh, not yet existing store file
pub fn temp_store_path(prefix: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let thread_id = std::thread::current().id();
    let path = std::env::temp_dir().join(format!("redline_{prefix}_{thread_id:?}_{id}.db"));
    let _ = std::fs::remove_file(&path); // Clean up if exists
    path
}

/// A credential store backed by a fresh temp file
pub fn temp_store(prefix: &str) -> CredentialStore {
    CredentialStore::new(StoreConfig::at(temp_store_path(prefix)))
}

pub fn cleanup(store: &CredentialStore) {
    let _ = std::fs::remove_file(store.path());
}

// ============================================================================
// In-Memory Connector
// ============================================================================

/// Connector that hands out [`MemorySession`]s
///
/// Every credential it was asked to open is recorded. Hosts listed in `down`
/// accept the connection but never answer PING; hosts in `unreachable` refuse it.
#[derive(Default)]
pub struct MemoryConnector {
    pub down: Vec<String>,
    pub unreachable: Vec<String>,
    pub opened: RefCell<Vec<Credential>>,
}

impl MemoryConnector {
    pub fn with_down_host(host: &str) -> Self {
        Self {
            down: vec![host.to_string()],
            ..Self::default()
        }
    }

    pub fn with_unreachable_host(host: &str) -> Self {
        Self {
            unreachable: vec![host.to_string()],
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<Credential> {
        self.opened.borrow().clone()
    }
}

impl Connector for MemoryConnector {
    type Session = MemorySession;

    fn connect(&self, params: &Credential) -> Result<MemorySession> {
        if self.unreachable.contains(&params.host) {
            return Err(RedlineError::connection_failed(format!(
                "Could not connect to '{params}': connection refused"
            )));
        }

        self.opened.borrow_mut().push(params.clone());
        Ok(MemorySession {
            params: params.clone(),
            alive: !self.down.contains(&params.host),
            data: HashMap::new(),
        })
    }
}

/// A session answering PING, GET and SET from a map
#[derive(Debug)]
pub struct MemorySession {
    pub params: Credential,
    pub alive: bool,
    pub data: HashMap<String, Vec<u8>>,
}

impl MemorySession {
    pub fn new(params: Credential) -> Self {
        Self {
            params,
            alive: true,
            data: HashMap::new(),
        }
    }
}

impl Session for MemorySession {
    fn params(&self) -> &Credential {
        &self.params
    }

    fn query(&mut self, cmd: &Cmd) -> Result<Value> {
        if !self.alive {
            return Err(RedlineError::connection_failed(format!(
                "'{}' did not respond",
                self.params
            )));
        }

        let args = command_words(cmd);
        match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["PING"] => Ok(Value::SimpleString("PONG".to_string())),
            ["GET", key] => Ok(self
                .data
                .get(*key)
                .map_or(Value::Nil, |value| Value::BulkString(value.clone()))),
            ["SET", key, value, ..] => {
                self.data.insert((*key).to_string(), value.as_bytes().to_vec());
                Ok(Value::Okay)
            }
            other => Err(RedlineError::command_failed(format!("ERR unknown command {other:?}"))),
        }
    }
}

/// Words of a packed RESP command (`*N`, then `$len` / word pairs)
pub fn command_words(cmd: &Cmd) -> Vec<String> {
    String::from_utf8_lossy(&cmd.get_packed_command())
        .split("\r\n")
        .skip(2)
        .step_by(2)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}
