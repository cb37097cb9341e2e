use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use iris_gate::{shutdown_signal, Config, ServerError, Service};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "iris-gate stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config = Config::load()?;
    info!(
        model = %config.model_path.display(),
        limit = config.rate_limit_per_minute,
        "starting iris-gate"
    );

    let service = Service::start(&config).await?;
    let listener = TcpListener::bind(&config.bind_address).await?;
    service.serve(listener, shutdown_signal()).await
}
