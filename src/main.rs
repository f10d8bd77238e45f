//! Redline CLI Entry Point
//!
//! Global options (`--host`, `--username`, ...) are filters used to pick a saved
//! credential. With `--saved-host`, the host's saved credential is used and the
//! same options become per-call overrides.
//!
//! Subcommands:
//! - `ping` / `get` / `set` - Run a command against the resolved connection
//! - `register` - Connect with the given options and save them
//! - `list` - Show saved credentials (passwords masked)
//!
//! All output to stdout is JSON-only. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use redline::{
    commands, describe_registration, Credential, CredentialStore, ErrorEnvelope, ErrorInfo,
    Expiry, Field, FieldMap, Metadata, RedisSession, RedlineError, Reply, Resolver, Session,
    SetCondition, SetRequest, StoreConfig, SuccessEnvelope,
};

/// Redline - Run commands against a redis instance using saved credentials
#[derive(Parser)]
#[command(name = "redline")]
#[command(about = "Run commands against a redis instance using saved credentials")]
#[command(version)]
struct Cli {
    /// The host to connect to
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// A specific username to use to connect
    #[arg(short = 'u', long, global = true)]
    username: Option<String>,

    /// A specific password to use to connect
    #[arg(short = 'p', long, global = true)]
    password: Option<String>,

    /// The data namespace to connect to
    #[arg(long, global = true)]
    db: Option<i64>,

    /// The specific port to connect to
    #[arg(short = 'P', long, global = true)]
    port: Option<u16>,

    /// Only use TLS credentials
    #[arg(long, global = true)]
    ssl: bool,

    /// Use the saved credential for this host; other options become overrides
    #[arg(long, global = true, conflicts_with = "host")]
    saved_host: Option<String>,

    /// Credential store file (defaults to ~/.redis_pass.db)
    #[arg(long, global = true, env = "REDLINE_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the connection to the redis instance
    Ping,

    /// Get the value for a simple key
    Get {
        /// The key whose value to get
        key: String,
    },

    /// Set a simple value
    Set {
        /// The key to set
        name: String,

        /// The value for the key
        value: String,

        /// Only set the value if the key does not exist
        #[arg(long, conflicts_with = "if_exists")]
        if_not_exists: bool,

        /// Only set the value if it exists
        #[arg(long)]
        if_exists: bool,

        /// Return the previous value of the key
        #[arg(long = "get")]
        return_value: bool,

        #[command(flatten)]
        expiry: ExpiryArgs,
    },

    /// Connect with the given options and save them for later use
    Register(RegisterArgs),

    /// List saved credentials
    List,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Get { .. } => "get",
            Self::Set { .. } => "set",
            Self::Register(_) => "register",
            Self::List => "list",
        }
    }
}

#[derive(Args)]
#[group(multiple = false)]
struct ExpiryArgs {
    /// The seconds in the future to expire this value
    #[arg(long = "expire-in-seconds")]
    ex: Option<u64>,

    /// The milliseconds in the future to expire this value
    #[arg(long = "expire-in-milliseconds")]
    px: Option<u64>,

    /// RFC 3339 datetime to expire at
    #[arg(long = "expire-at", value_parser = parse_deadline)]
    at: Option<DateTime<Utc>>,

    /// Maintain the TTL of the key
    #[arg(long)]
    keep_ttl: bool,
}

impl ExpiryArgs {
    fn expiry(&self) -> Option<Expiry> {
        if let Some(seconds) = self.ex {
            Some(Expiry::Seconds(seconds))
        } else if let Some(millis) = self.px {
            Some(Expiry::Milliseconds(millis))
        } else if let Some(at) = self.at {
            Some(Expiry::At(at))
        } else if self.keep_ttl {
            Some(Expiry::KeepTtl)
        } else {
            None
        }
    }
}

#[derive(Args)]
struct RegisterArgs {
    /// Prompt for the password instead of passing it on the command line
    #[arg(long)]
    ask_password: bool,

    /// Name registered with CLIENT SETNAME
    #[arg(long)]
    client_name: Option<String>,

    /// Socket read/write timeout in seconds
    #[arg(long)]
    socket_timeout: Option<f64>,

    /// Socket connect timeout in seconds
    #[arg(long)]
    socket_connect_timeout: Option<f64>,

    /// Retry commands once when they time out
    #[arg(long)]
    retry_on_timeout: bool,

    /// Decode replies with the configured encoding
    #[arg(long)]
    decode_responses: bool,

    /// Reply encoding (utf-8, ascii, latin-1)
    #[arg(long)]
    encoding: Option<String>,

    /// Encoding error policy (strict, ignore, replace)
    #[arg(long)]
    encoding_errors: Option<String>,

    /// Seconds of idleness before a health check PING
    #[arg(long)]
    health_check_interval: Option<i64>,

    /// Private key for TLS client authentication
    #[arg(long)]
    ssl_keyfile: Option<String>,

    /// Certificate for TLS client authentication
    #[arg(long)]
    ssl_certfile: Option<String>,

    /// Server certificate validation (none, optional, required)
    #[arg(long)]
    ssl_cert_reqs: Option<String>,

    /// CA bundle used to verify the server
    #[arg(long)]
    ssl_ca_certs: Option<String>,
}

impl RegisterArgs {
    fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        let optional = [
            (Field::ClientName, self.client_name.clone()),
            (Field::Encoding, self.encoding.clone()),
            (Field::EncodingErrors, self.encoding_errors.clone()),
            (Field::SslKeyfile, self.ssl_keyfile.clone()),
            (Field::SslCertfile, self.ssl_certfile.clone()),
            (Field::SslCertReqs, self.ssl_cert_reqs.clone()),
            (Field::SslCaCerts, self.ssl_ca_certs.clone()),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                fields.insert(field, value);
            }
        }
        if let Some(seconds) = self.socket_timeout {
            fields.insert(Field::SocketTimeout, seconds);
        }
        if let Some(seconds) = self.socket_connect_timeout {
            fields.insert(Field::SocketConnectTimeout, seconds);
        }
        if let Some(seconds) = self.health_check_interval {
            fields.insert(Field::HealthCheckInterval, seconds);
        }
        if self.retry_on_timeout {
            fields.insert(Field::RetryOnTimeout, true);
        }
        if self.decode_responses {
            fields.insert(Field::DecodeResponses, true);
        }
        fields
    }
}

fn parse_deadline(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|deadline| deadline.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 datetime: {e}"))
}

impl Cli {
    /// Connection options given on the command line, as filters or overrides
    fn connection_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(host) = &self.host {
            fields.insert(Field::Host, host.as_str());
        }
        if let Some(username) = &self.username {
            fields.insert(Field::Username, username.as_str());
        }
        if let Some(password) = &self.password {
            fields.insert(Field::Password, password.as_str());
        }
        if let Some(db) = self.db {
            fields.insert(Field::Db, db);
        }
        if let Some(port) = self.port {
            fields.insert(Field::Port, port);
        }
        if self.ssl {
            fields.insert(Field::Ssl, true);
        }
        fields
    }

    fn store(&self) -> redline::Result<CredentialStore> {
        let config = match &self.store {
            Some(path) => StoreConfig::at(path),
            None => StoreConfig::from_env()?,
        };
        Ok(CredentialStore::new(config))
    }
}

/// Successful result of one invocation
struct Outcome {
    target: String,
    data: serde_json::Value,
    credentials: Option<usize>,
}

#[derive(Serialize)]
struct ListedCredential {
    uri: String,
    specificity: f64,
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let command = cli.command.name();
    let start = Instant::now();

    match run(&cli) {
        Ok(outcome) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = match outcome.credentials {
                Some(count) => Metadata::with_credentials(elapsed, count),
                None => Metadata::new(elapsed),
            };
            print_json(&SuccessEnvelope::new(outcome.target, command, outcome.data, meta));
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_json(&error_envelope(command, &err));
            ExitCode::FAILURE
        }
    }
}

/// Envelope for a failed invocation
///
/// With added context (registration), the context is the message and the code
/// comes from the underlying `RedlineError`.
fn error_envelope(command: &str, err: &anyhow::Error) -> ErrorEnvelope {
    match err.downcast_ref::<RedlineError>() {
        Some(cause) if err.chain().count() == 1 => ErrorEnvelope::from_error("", command, cause),
        Some(cause) => {
            ErrorEnvelope::new("", command, ErrorInfo::new(cause.error_code(), err.to_string()))
        }
        None => {
            ErrorEnvelope::new("", command, ErrorInfo::new("INVALID_INPUT", format!("{err:#}")))
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).init();
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Could not serialize output: {e}"),
    }
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let store = cli.store()?;

    match &cli.command {
        Commands::List => list(&store),
        Commands::Register(args) => register(cli, args, store),
        Commands::Ping => {
            let mut session = open_session(cli, store)?;
            let reply = commands::ping(&mut session)?;
            reply_outcome(&session, &reply)
        }
        Commands::Get { key } => {
            let mut session = open_session(cli, store)?;
            let reply = commands::get(&mut session, key)?;
            reply_outcome(&session, &reply)
        }
        Commands::Set { name, value, if_not_exists, if_exists, return_value, expiry } => {
            let condition = if *if_not_exists {
                Some(SetCondition::IfNotExists)
            } else if *if_exists {
                Some(SetCondition::IfExists)
            } else {
                None
            };
            let request = SetRequest {
                condition,
                return_value: *return_value,
                expiry: expiry.expiry(),
                ..SetRequest::new(name.as_str(), value.as_str())
            };

            let mut session = open_session(cli, store)?;
            let reply = commands::set(&mut session, &request)?;
            reply_outcome(&session, &reply)
        }
    }
}

fn open_session(cli: &Cli, store: CredentialStore) -> redline::Result<RedisSession> {
    let resolver = Resolver::new(store);
    let fields = cli.connection_fields();

    match &cli.saved_host {
        Some(host) => resolver.get_connection_by_host(host, &fields),
        None => resolver.get_connection(&fields),
    }
}

fn reply_outcome(session: &RedisSession, reply: &Reply) -> anyhow::Result<Outcome> {
    Ok(Outcome {
        target: session.params().to_string(),
        data: serde_json::to_value(reply).context("Could not serialize reply")?,
        credentials: None,
    })
}

fn list(store: &CredentialStore) -> anyhow::Result<Outcome> {
    let listed: Vec<ListedCredential> = store
        .load_all()?
        .iter()
        .map(|credential| ListedCredential {
            uri: credential.to_string(),
            specificity: credential.specificity(),
        })
        .collect();

    Ok(Outcome {
        target: String::new(),
        credentials: Some(listed.len()),
        data: serde_json::to_value(&listed).context("Could not serialize credentials")?,
    })
}

fn register(cli: &Cli, args: &RegisterArgs, store: CredentialStore) -> anyhow::Result<Outcome> {
    let mut fields = cli.connection_fields();
    for (field, value) in args.fields().iter() {
        fields.insert(field, value.clone());
    }

    if args.ask_password {
        let password = dialoguer::Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()
            .context("Could not read password")?;
        fields.insert(Field::Password, password);
    }

    let resolver = Resolver::new(store);
    let outcome = Credential::default()
        .connect(&fields)
        .and_then(|mut session| resolver.register_connection(&mut session));
    let message = describe_registration(&outcome);

    match outcome {
        Ok(registered) => Ok(Outcome {
            target: registered.credential.to_string(),
            data: serde_json::json!({ "message": message }),
            credentials: None,
        }),
        Err(err) => {
            warn!("{message}");
            Err(anyhow::Error::new(err).context(message))
        }
    }
}
