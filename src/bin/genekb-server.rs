extern crate genekb;

use std::path::Path;
use std::process;
use std::sync::Arc;

use axum::{extract::Request, ServiceExt};
use getopts::Options;
use tower::layer::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing_subscriber::EnvFilter;

use genekb::api::cache::CacheBackend;
use genekb::api::query_exec::QueryExec;
use genekb::web::config::Config;
use genekb::web::server::{build_router, AllState};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

#[tokio::main]
async fn main() {
    println!("{} v{}", PKG_NAME, VERSION);

    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("c", "config-file", "Configuration file name", "CONFIG");
    opts.optopt("b", "bind-address-and-port", "The address:port to bind to", "BIND_ADDRESS_AND_PORT");
    opts.optopt("d", "database", "SQLite database built by genekb-build", "DATABASE");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => panic!("Invalid options\n{}", f)
    };

    let program = args[0].clone();

    if matches.opt_present("help") {
        print_usage(&program, opts);
        process::exit(0);
    }
    if !matches.opt_present("database") {
        println!("no -d|--database option");
        print_usage(&program, opts);
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("genekb=info,tower_http=warn"))
                .unwrap(),
        )
        .init();

    let config =
        if let Some(config_file_name) = matches.opt_str("config-file") {
            match Config::read(Path::new(&config_file_name)) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("{:#}", err);
                    process::exit(1);
                }
            }
        } else {
            Config::default()
        };

    let database_path = matches.opt_str("database").unwrap();

    if !Path::new(&database_path).exists() {
        eprintln!("database not found: {}", database_path);
        process::exit(1);
    }

    let cache = match CacheBackend::from_config(&config.cache) {
        Ok(cache) => cache,
        Err(err) => {
            eprintln!("failed to set up the search cache: {:#}", err);
            process::exit(1);
        }
    };

    let query_exec = QueryExec::new(Path::new(&database_path), cache, config.admin_token());

    let bind_address_and_port = matches.opt_str("bind-address-and-port");
    let listener =
        if let Some(bind_address_and_port) = bind_address_and_port {
           tokio::net::TcpListener::bind(bind_address_and_port).await.unwrap()
        } else {
           tokio::net::TcpListener::bind("0.0.0.0:8500").await.unwrap()
        };

    let all_state = AllState {
        query_exec,
    };

    println!("Starting server ...");
    let app = build_router(Arc::new(all_state));

    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .unwrap();
}
