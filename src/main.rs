use tokio::net::TcpListener;

use chatbroker::config::Config;
use chatbroker::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbroker=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let state = AppState::new(&config);
    let app = chatbroker::routes::router(state);

    let listener = TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on {}:{actual_port}\x1b[0m", config.bind);
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mchatbroker\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!(
        "  \x1b[2mheartbeat\x1b[0m    {}s / timeout {}s",
        config.heartbeat.interval.as_secs(),
        config.heartbeat.timeout.as_secs()
    );
    eprintln!("  \x1b[2mqueue\x1b[0m        {}", config.broker.outbound_queue);
    eprintln!(
        "  \x1b[2mrate limit\x1b[0m   {}+{} frames/min",
        config.limits.rate_limit, config.limits.rate_burst
    );
    eprintln!();
}
