use anyhow::Result;
use callscope::app::{self, AppStateBuilder};
use callscope::config::{Cli, Config};
use clap::Parser;
use std::fs::File;
use tokio::select;
use tracing::{info, level_filters::LevelFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.conf {
        Some(ref conf) => Config::load(conf)?,
        None => Config::default(),
    };
    config.apply_env();

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let _log_guard = if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        log_fmt.with_writer(non_blocking).try_init().ok();
        Some(guard)
    } else {
        log_fmt.try_init().ok();
        None
    };

    let state = AppStateBuilder::new().config(config).build()?;

    info!("starting callscope on {}", state.config.http_addr);
    select! {
        result = app::run(state.clone()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received CTRL+C, shutting down");
            state.token.cancel();
        }
    }
    Ok(())
}
