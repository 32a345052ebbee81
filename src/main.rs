use pawnledger::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "invalid ledger configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        database = %config.database_path,
        daily_penalty_rate_percent = %config.daily_penalty_rate_percent,
        at_risk_window_days = config.at_risk_window_days,
        "starting pawn ledger"
    );

    // The ledger file must be writable before any till or loan route is served.
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, path = %config.database_path, "cannot open ledger database");
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = api::create_router(api::AppState::new(Arc::new(Repository::new(pool)), config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %addr, "cannot bind ledger listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, "pawn ledger accepting cashier requests");

    match axum::serve(listener, app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ledger server stopped");
            ExitCode::FAILURE
        }
    }
}
