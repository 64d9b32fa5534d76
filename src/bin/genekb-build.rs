extern crate genekb;

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use getopts::{Options, ParsingStyle};
use tracing_subscriber::EnvFilter;

use genekb::build::{BuildAction, DatabaseBuilder};
use genekb::web::config::Config;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] ACTION\n\n\
                         Actions: build, import-clinical, import-constraint, import-traits,\n\
                         \x20        import-summaries, rebuild-corpus, all, check", program);
    print!("{}", opts.usage(&brief));
}

fn main() {
    println!("{} v{}", PKG_NAME, VERSION);

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();
    let opts = opts.parsing_style(ParsingStyle::StopAtFirstFree);

    opts.optflag("h", "help", "print this help message");
    opts.optopt("d", "database", "SQLite database file to build or update", "DATABASE");
    opts.optopt("c", "config-file", "Configuration file name", "CONFIG");
    opts.optopt("D", "data-dir", "Directory holding the source files (default: data)", "DATA_DIR");

    let program = args[0].clone();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            print_usage(&program, opts);
            println!("\nerror: {}", e);
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        print_usage(&program, opts);
        process::exit(0);
    }

    if !matches.opt_present("database") {
        println!("no -d|--database option");
        print_usage(&program, opts);
        process::exit(1);
    }

    if matches.free.len() != 1 {
        println!("needs one ACTION argument");
        print_usage(&program, opts);
        process::exit(1);
    }

    let action = match matches.free[0].parse::<BuildAction>() {
        Ok(action) => action,
        Err(err) => {
            println!("{}", err);
            print_usage(&program, opts);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("genekb=info"))
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

    let db_path = PathBuf::from(matches.opt_str("database").unwrap());
    let data_dir = PathBuf::from(matches.opt_str("data-dir").unwrap_or_else(|| "data".into()));

    let builder = DatabaseBuilder::new(&config, &db_path, &data_dir);

    if let Err(err) = builder.run(action) {
        eprintln!("{} failed: {:#}", action, err);
        process::exit(1);
    }
}
