use shareboard_hub::config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);

    if let Err(e) = shareboard_hub::run(config).await {
        log::error!(target: "shareboard.hub", "{}", e);
        std::process::exit(1);
    }
}
