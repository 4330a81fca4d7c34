use clap::Parser;

use itaskorg_lib::config::{Cli, ServerConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match ServerConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("itaskorg-server: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = rolling_logger::init_logger(config.log_dir.clone(), "iTaskOrg") {
        eprintln!("itaskorg-server: failed to init rolling logger: {}", e);
    }
    log::info!("Starting with {:?}", config);

    if let Err(e) = itaskorg_lib::run(config).await {
        let _ = rolling_logger::error(&format!("Server exited with error: {}", e));
        eprintln!("itaskorg-server: {}", e);
        std::process::exit(1);
    }
}
