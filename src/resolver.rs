//! Credential Resolution
//!
//! Selects exactly one stored [`Credential`] for an invocation, either from
//! partial filter criteria or from a host name, and opens it through a
//! [`Connector`].
//!
//! # Ranking
//! When several credentials match, the one with the *lowest* specificity wins,
//! and ties go to the credential saved first. A generically saved profile is
//! therefore preferred over a narrowly scoped one.

use std::fmt;
use tracing::{debug, info};

use crate::connection::{Connector, RedisConnector, Session};
use crate::credential::Credential;
use crate::error::{RedlineError, Result};
use crate::schema::{Filters, Overrides};
use crate::store::CredentialStore;

/// Resolves credentials from a store and opens them with a connector
#[derive(Debug, Clone)]
pub struct Resolver<C: Connector = RedisConnector> {
    store: CredentialStore,
    connector: C,
}

impl Resolver<RedisConnector> {
    #[must_use]
    pub const fn new(store: CredentialStore) -> Self {
        Self {
            store,
            connector: RedisConnector,
        }
    }
}

impl<C: Connector> Resolver<C> {
    pub const fn with_connector(store: CredentialStore, connector: C) -> Self {
        Self { store, connector }
    }

    pub const fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Pick the credential to use for `filters`
    ///
    /// - empty store and no filters: a credential with every default
    /// - otherwise every filter must equal the credential's field, after
    ///   coercion through the field schema
    /// - a filter value the field cannot hold: validation error
    /// - no match: connection error
    pub fn resolve_by_filters(&self, filters: &Filters) -> Result<Credential> {
        let filters = filters.coerced()?;
        let credentials = self.store.load_all()?;

        if credentials.is_empty() && filters.is_empty() {
            debug!("no stored credentials, using defaults");
            return Ok(Credential::default());
        }

        let mut matching = Vec::new();
        for credential in credentials {
            if credential.matches(&filters)? {
                matching.push(credential);
            }
        }

        let selected = least_specific(matching).ok_or_else(|| {
            RedlineError::connection_failed(format!(
                "No matching credentials were found for the conditions: {filters}"
            ))
        })?;

        debug!(uri = %selected, specificity = selected.specificity(), "resolved by filters");
        Ok(selected)
    }

    /// Pick the credential to use for `host` without connecting
    pub fn select_by_host(&self, host: &str) -> Result<Credential> {
        let matching: Vec<Credential> = self
            .store
            .load_all()?
            .into_iter()
            .filter(|credential| credential.host == host)
            .collect();

        least_specific(matching).ok_or_else(|| {
            RedlineError::lookup_failed(format!("There are no saved connections to '{host}'"))
        })
    }

    /// Connect to `host` with its saved credential and verify it answers PING
    pub fn resolve_by_host(&self, host: &str, overrides: &Overrides) -> Result<C::Session> {
        let credential = self.select_by_host(host)?;
        debug!(uri = %credential, overrides = %overrides, "resolved by host");

        let mut session = credential.connect_with(&self.connector, overrides)?;
        session.ping()?;

        Ok(session)
    }

    /// Resolve by filters and connect
    pub fn get_connection(&self, filters: &Filters) -> Result<C::Session> {
        self.resolve_by_filters(filters)?.connect_with(&self.connector, &Overrides::new())
    }

    /// Connect to a saved host, applying `overrides`
    pub fn get_connection_by_host(&self, host: &str, overrides: &Overrides) -> Result<C::Session> {
        self.resolve_by_host(host, overrides)
    }

    /// Save the parameters of a live session for later reuse
    ///
    /// The session must answer PING first, so only working credentials are stored.
    pub fn register_connection<S: Session + ?Sized>(&self, session: &mut S) -> Result<Registered> {
        session.ping().map_err(|e| {
            RedlineError::connection_failed(format!("a connection could not be made: {e}"))
        })?;

        let credential = Credential::from_connection(&*session);
        self.store.upsert(&credential)?;

        info!(uri = %credential, "registered connection");
        Ok(Registered { credential })
    }
}

/// A successfully registered credential
#[derive(Debug, Clone, PartialEq)]
pub struct Registered {
    pub credential: Credential,
}

impl fmt::Display for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection to '{}' registered.", self.credential)
    }
}

/// Human-readable outcome of a registration attempt
///
/// Failures are described, never propagated.
#[must_use]
pub fn describe_registration(outcome: &Result<Registered>) -> String {
    match outcome {
        Ok(registered) => registered.to_string(),
        Err(e) => format!("Could not register connection: {e}"),
    }
}

/// Lowest specificity; the earliest candidate wins ties
fn least_specific(candidates: Vec<Credential>) -> Option<Credential> {
    candidates.into_iter().min_by(|a, b| a.specificity().total_cmp(&b.specificity()))
}
