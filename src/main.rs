use log::{error, info};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                shutdown.cancel();
            }
            Err(e) => error!("Unable to listen for shutdown signal: {e}"),
        }
    });

    if let Err(e) = livewatch::worker::run(token).await {
        error!("{e}");
        std::process::exit(1);
    }
}
