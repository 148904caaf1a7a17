// demos/src/bin/config_check.rs
//
// Loads and validates a mirror configuration file, printing the effective
// settings with every default filled in.
//
// Run this example with:
//   cargo run --bin config_check -- path/to/config.json
//   (from the demos directory)

use liquidity_mirror::prelude::*;
use tracing::{error, info};

fn main() {
    setup_logger();

    let Some(path) = std::env::args().nth(1) else {
        error!("usage: config_check <config.json>");
        std::process::exit(2);
    };

    match MirrorConfig::from_path(&path) {
        Ok(config) => {
            let rendered = serde_json::to_string_pretty(&config)
                .unwrap_or_else(|_| format!("{config:?}"));
            info!("{} is valid:\n{}", path, rendered);
        }
        Err(err) => {
            error!("{} rejected: {}", path, err);
            std::process::exit(1);
        }
    }
}
