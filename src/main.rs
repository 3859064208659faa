use std::sync::Arc;
use std::time::SystemTime;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use log::{info, Level};
use logship::aws::{self, CloudWatchLogsClient};
use logship::config::AppConfig;
use logship::lines::ship_lines;
use logship::utilities::daily_stream_name;
use logship::{
    build_strategy, Destination, DestinationResolver, ExitHooks, LogRecord, MessageFormat,
    SendableError, Transport,
};
use tokio::io::BufReader;

pub fn setup_logger() -> Result<(), SendableError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let level = match record.level() {
                Level::Error => record.level().to_string().red(),
                Level::Warn => record.level().to_string().yellow(),
                Level::Info => record.level().to_string().green(),
                Level::Debug | Level::Trace => record.level().to_string().dimmed(),
            };
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                level,
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SendableError> {
    setup_logger()?;

    let app_config = AppConfig::parse();
    info!("Starting application with args: {:?}", app_config);

    let config = aws::build_config(&app_config).await?;
    let client = Arc::new(CloudWatchLogsClient::new(&config));

    let hooks = ExitHooks::default();
    let strategy = build_strategy(
        app_config.strategy,
        client,
        app_config.strategy_options(),
        &hooks,
    )?;

    let group = app_config.group.clone();
    let resolver = match app_config.stream.clone() {
        Some(stream) => DestinationResolver::Static(Destination::new(group, stream)),
        None => DestinationResolver::computed(move |record: &LogRecord| {
            let at = record.timestamp.unwrap_or_else(Utc::now);
            Destination::new(group.clone(), daily_stream_name(at))
        }),
    };
    let format = if app_config.json {
        MessageFormat::Json
    } else {
        MessageFormat::Text
    };
    let transport = Transport::new(strategy, resolver, format);

    let stdin = BufReader::new(tokio::io::stdin());
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    ship_lines(stdin, &transport, &hooks, interrupt).await?;

    info!("Done!");
    Ok(())
}
