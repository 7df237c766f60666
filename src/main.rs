//! quill-worker - isolated engine process
//!
//! Speaks the line protocol on stdin/stdout. Logs go to stderr; set
//! `RUST_LOG` to raise the level.

use std::io::{self, BufWriter};

use env_logger::Env;
use log::{error, info};
use quill::{NAME, VERSION};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    info!("{} worker v{} starting", NAME, VERSION);

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    if let Err(e) = quill::process::serve(stdin, stdout) {
        error!("worker failed: {}", e);
        std::process::exit(1);
    }
}
