use std::process;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use punchcard::auth::{TokenAuthority, UserDirectory};
use punchcard::store::SqliteStore;
use punchcard::transport::AppState;
use punchcard::{Config, PackService, transport};

#[tokio::main]
async fn main() {
    init_tracing();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error loading configuration: {e}");
            process::exit(2);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    if let Err(msg) = apply_args(&mut config, &args) {
        eprintln!("error: {msg}");
        eprintln!();
        eprintln!("Usage: punchcard [--db <path>] [--addr <host:port>]");
        process::exit(2);
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server error");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.db_path)?);

    let state = AppState {
        packs: Arc::new(PackService::new(Arc::clone(&store) as Arc<dyn punchcard::Store>)),
        tokens: Arc::new(TokenAuthority::new(config.hmac_secret.as_bytes())),
        users: Arc::new(UserDirectory::new(store)),
    };

    transport::serve(&config, state).await
}

/// Apply `--db` and `--addr` flag overrides on top of the env config.
fn apply_args(config: &mut Config, args: &[String]) -> Result<(), String> {
    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                i += 1;
                config.db_path = args.get(i).ok_or("--db requires a value")?.into();
            }
            "--addr" => {
                i += 1;
                let addr = args.get(i).ok_or("--addr requires a value")?;
                let (host, port) = addr
                    .rsplit_once(':')
                    .ok_or_else(|| format!("invalid address '{addr}', expected host:port"))?;
                config.host = host.to_string();
                config.port = port
                    .parse()
                    .map_err(|_| format!("invalid port in address '{addr}'"))?;
            }
            "--help" | "-h" => return Err("".to_string()),
            arg => return Err(format!("unknown flag: {arg}")),
        }
        i += 1;
    }
    Ok(())
}

fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("punchcard=info")
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
