use anyhow::Result;
use audit_gateway::config::{LoggingSettings, Settings};
use audit_gateway::Application;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let settings = Settings::new()?;
    init_tracing(&settings.logging);

    if let Err(e) = dotenv {
        warn!(error = %e, "No .env file loaded, using the process environment only");
    }

    let app = Application::new(settings).await?;
    app.run().await?;

    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(false).init();
    } else {
        builder.pretty().init();
    }
}
