//! watchmux demo - runs subscription scenarios and reports what each
//! subscriber saw.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchmux_demo::{run, Args};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchmux=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.engine_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        scenario = ?args.scenario,
        delivery = %config.delivery,
        "starting watchmux demo"
    );

    let reports = run(args.scenario, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        for line in &report.deliveries {
            tracing::info!(scenario = report.name, "{line}");
        }
        tracing::info!(
            scenario = report.name,
            records = report.stats.records_seen,
            deliveries = report.stats.deliveries,
            failures = report.stats.failures,
            rearms = report.stats.rearms,
            drained = report.stats.drained,
            "scenario finished"
        );
    }

    Ok(())
}
