//! Resolution and Registration Tests
//!
//! Runs the resolver over temp stores with the in-memory connector from
//! `common`, so no Redis server is needed.

mod common;

use common::{cleanup, temp_store, MemoryConnector, MemorySession};
use pretty_assertions::assert_eq;
use redline::{
    commands, describe_registration, Credential, CredentialStore, Field, Filters, Overrides,
    RedlineError, Reply, Resolver, Session,
};

fn seeded(prefix: &str, credentials: &[Credential]) -> CredentialStore {
    let store = temp_store(prefix);
    for credential in credentials {
        store.upsert(credential).expect("Failed to seed store");
    }
    store
}

/// Two matches for host `queue`: specificity 0.2 (4 of 20 fields) and 0.1 (2 of 20)
fn narrow_and_generic() -> (Credential, Credential) {
    let narrow = Credential {
        port: 7000,
        db: 2,
        client_name: Some("jobs".to_string()),
        ..Credential::for_host("queue")
    };
    let generic = Credential {
        db: 1,
        ..Credential::for_host("queue")
    };
    (narrow, generic)
}

// ============================================================================
// Resolution By Filters
// ============================================================================

#[test]
fn test_empty_store_without_filters_uses_defaults() {
    let store = temp_store("defaults");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let credential = resolver.resolve_by_filters(&Filters::new()).unwrap();

    assert_eq!(credential, Credential::default());
    cleanup(&store);
}

#[test]
fn test_empty_store_with_filters_fails() {
    let store = temp_store("empty_filtered");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let err = resolver.resolve_by_filters(&Filters::new().with(Field::Host, "queue")).unwrap_err();

    assert!(matches!(err, RedlineError::ConnectionFailed(_)));
    cleanup(&store);
}

#[test]
fn test_least_specific_match_wins() {
    let (narrow, generic) = narrow_and_generic();
    assert!(narrow.specificity() > generic.specificity());

    let store = seeded("least_specific", &[narrow, generic.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let selected = resolver.resolve_by_filters(&Filters::new().with(Field::Host, "queue")).unwrap();

    assert_eq!(selected, generic);
    cleanup(&store);
}

#[test]
fn test_specificity_tie_keeps_first_saved() {
    let first = Credential {
        db: 4,
        ..Credential::for_host("queue")
    };
    let second = Credential {
        db: 5,
        ..Credential::for_host("queue")
    };
    assert_eq!(first.specificity(), second.specificity());

    let store = seeded("tie", &[first.clone(), second]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let selected = resolver.resolve_by_filters(&Filters::new().with(Field::Host, "queue")).unwrap();

    assert_eq!(selected, first);
    cleanup(&store);
}

#[test]
fn test_every_filter_must_match() {
    let (narrow, generic) = narrow_and_generic();
    let store = seeded("all_filters", &[narrow.clone(), generic]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let filters = Filters::new().with(Field::Host, "queue").with(Field::Port, 7000_u16);
    let selected = resolver.resolve_by_filters(&filters).unwrap();

    assert_eq!(selected, narrow);
    cleanup(&store);
}

#[test]
fn test_empty_filters_pick_least_specific_stored() {
    let (narrow, generic) = narrow_and_generic();
    let store = seeded("empty_filters", &[narrow, generic.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let selected = resolver.resolve_by_filters(&Filters::new()).unwrap();

    assert_eq!(selected, generic);
    assert_ne!(selected, Credential::default());
    cleanup(&store);
}

#[test]
fn test_filters_are_coerced_to_field_types() {
    let saved = Credential {
        socket_timeout: Some(2.0),
        ssl: true,
        ..Credential::for_host("queue")
    };
    let store = seeded("coerced_filters", &[saved.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let timeout = Filters::new().with(Field::SocketTimeout, 2_i64);
    assert_eq!(resolver.resolve_by_filters(&timeout).unwrap(), saved);

    let tls = Filters::new().with(Field::Ssl, 1_i64);
    assert_eq!(resolver.resolve_by_filters(&tls).unwrap(), saved);
    cleanup(&store);
}

#[test]
fn test_uncoercible_filter_is_validation_error() {
    let store = seeded("bad_filter", &[Credential::for_host("queue")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let err = resolver.resolve_by_filters(&Filters::new().with(Field::Port, "abc")).unwrap_err();

    assert!(matches!(err, RedlineError::ValidationFailed(_)));
    cleanup(&store);
}

#[test]
fn test_no_match_names_conditions_without_password() {
    let store = seeded("no_match", &[Credential::for_host("queue")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let filters = Filters::new().with(Field::Host, "cache").with(Field::Password, "hunter2");
    let err = resolver.resolve_by_filters(&filters).unwrap_err();

    assert!(matches!(err, RedlineError::ConnectionFailed(_)));
    let message = err.to_string();
    assert!(message.contains("No matching credentials were found for the conditions"));
    assert!(message.contains("host=cache"));
    assert!(!message.contains("hunter2"));
    cleanup(&store);
}

#[test]
fn test_get_connection_opens_resolved_credential() {
    let (narrow, generic) = narrow_and_generic();
    let store = seeded("get_connection", &[narrow, generic.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let session = resolver.get_connection(&Filters::new().with(Field::Host, "queue")).unwrap();

    assert_eq!(session.params(), &generic);
    assert_eq!(resolver.connector().opened(), vec![generic]);
    cleanup(&store);
}

// ============================================================================
// Resolution By Host
// ============================================================================

#[test]
fn test_resolve_by_host_picks_that_host() {
    let store = seeded("by_host", &[Credential::for_host("a"), Credential::for_host("b")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let session = resolver.resolve_by_host("b", &Overrides::new()).unwrap();

    assert_eq!(session.params().host, "b");
    cleanup(&store);
}

#[test]
fn test_resolve_by_host_prefers_least_specific() {
    let (narrow, generic) = narrow_and_generic();
    assert_eq!(narrow.specificity(), 0.2);
    assert_eq!(generic.specificity(), 0.1);

    let store = seeded("host_least_specific", &[narrow, generic.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let session = resolver.resolve_by_host("queue", &Overrides::new()).unwrap();

    assert_eq!(session.params(), &generic);
    assert_eq!(resolver.connector().opened(), vec![generic]);
    cleanup(&store);
}

#[test]
fn test_resolve_by_host_tie_keeps_first_saved() {
    let first = Credential {
        db: 4,
        ..Credential::for_host("queue")
    };
    let second = Credential {
        port: 7000,
        ..Credential::for_host("queue")
    };
    assert_eq!(first.specificity(), second.specificity());

    let store = seeded("host_tie", &[first.clone(), second]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let session = resolver.resolve_by_host("queue", &Overrides::new()).unwrap();

    assert_eq!(session.params(), &first);
    cleanup(&store);
}

#[test]
fn test_resolve_unknown_host_is_lookup_error() {
    let store = seeded("unknown_host", &[Credential::for_host("a"), Credential::for_host("b")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let err = resolver.resolve_by_host("c", &Overrides::new()).unwrap_err();

    assert!(matches!(err, RedlineError::LookupFailed(_)));
    assert!(err.to_string().contains("There are no saved connections to 'c'"));
    assert!(resolver.connector().opened().is_empty());
    cleanup(&store);
}

#[test]
fn test_overrides_win_over_stored_values() {
    let saved = Credential {
        db: 2,
        ..Credential::for_host("queue")
    };
    let store = seeded("overrides", &[saved.clone()]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let overrides = Overrides::new().with(Field::Db, 9_i64).with(Field::ClientName, "adhoc");
    let session = resolver.get_connection_by_host("queue", &overrides).unwrap();

    assert_eq!(session.params().db, 9);
    assert_eq!(session.params().client_name.as_deref(), Some("adhoc"));
    // Overrides apply to this connection only
    assert_eq!(store.load_all().unwrap(), vec![saved]);
    cleanup(&store);
}

#[test]
fn test_invalid_override_is_validation_error() {
    let store = seeded("bad_override", &[Credential::for_host("queue")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());

    let overrides = Overrides::new().with(Field::SslCertReqs, "sometimes");
    let err = resolver.resolve_by_host("queue", &overrides).unwrap_err();

    assert!(matches!(err, RedlineError::ValidationFailed(_)));
    cleanup(&store);
}

#[test]
fn test_resolve_by_host_requires_ping() {
    let store = seeded("host_down", &[Credential::for_host("queue")]);
    let connector = MemoryConnector::with_down_host("queue");
    let resolver = Resolver::with_connector(store.clone(), connector);

    let err = resolver.resolve_by_host("queue", &Overrides::new()).unwrap_err();

    assert_eq!(err.error_code(), "CONNECTION_FAILED");
    cleanup(&store);
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_saves_session_params() {
    let store = temp_store("register");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());
    let params = Credential {
        username: Some("app".to_string()),
        password: Some("s3cret".to_string()),
        ..Credential::for_host("queue")
    };
    let mut session = MemorySession::new(params.clone());

    let outcome = resolver.register_connection(&mut session);

    assert_eq!(
        describe_registration(&outcome),
        "Connection to 'redis://app:<password>@queue:6379/0' registered."
    );
    assert_eq!(store.load_all().unwrap(), vec![params]);
    cleanup(&store);
}

#[test]
fn test_register_twice_keeps_one_row() {
    let store = temp_store("register_twice");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());
    let mut session = MemorySession::new(Credential::for_host("queue"));

    resolver.register_connection(&mut session).unwrap();
    resolver.register_connection(&mut session).unwrap();

    assert_eq!(store.load_all().unwrap().len(), 1);
    cleanup(&store);
}

#[test]
fn test_register_unreachable_session_is_described() {
    let store = temp_store("register_down");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());
    let mut session = MemorySession {
        alive: false,
        ..MemorySession::new(Credential::for_host("queue"))
    };

    let outcome = resolver.register_connection(&mut session);
    let message = describe_registration(&outcome);

    assert!(outcome.is_err());
    assert!(message.starts_with("Could not register connection:"));
    assert!(message.contains("a connection could not be made"));
    assert!(store.load_all().unwrap().is_empty());
    cleanup(&store);
}

#[test]
fn test_registered_credential_resolves_by_host() {
    let store = temp_store("register_resolve");
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());
    let params = Credential {
        port: 6380,
        ..Credential::for_host("queue")
    };

    resolver.register_connection(&mut MemorySession::new(params.clone())).unwrap();
    let session = resolver.get_connection_by_host("queue", &Overrides::new()).unwrap();

    assert_eq!(session.params(), &params);
    cleanup(&store);
}

// ============================================================================
// Commands Over A Resolved Session
// ============================================================================

#[test]
fn test_set_then_get_over_resolved_session() {
    let store = seeded("commands", &[Credential::for_host("queue")]);
    let resolver = Resolver::with_connector(store.clone(), MemoryConnector::default());
    let mut session = resolver.get_connection_by_host("queue", &Overrides::new()).unwrap();

    let set = commands::set(&mut session, &redline::SetRequest::new("greeting", "hello")).unwrap();
    let get = commands::get(&mut session, "greeting").unwrap();
    let missing = commands::get(&mut session, "farewell").unwrap();

    assert_eq!(set, Reply::Text("OK".to_string()));
    assert_eq!(get, Reply::Text("hello".to_string()));
    assert_eq!(missing, Reply::Nil);
    cleanup(&store);
}
