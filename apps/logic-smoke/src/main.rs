mod config;
mod driver;
mod fake_backend;
mod logging;

use std::process::ExitCode;

use tracing::{error, info};

use crate::config::SmokeConfig;

fn main() -> ExitCode {
    logging::init();
    info!("starting logic-smoke");

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid smoke configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        base_url = %config.context.base_url,
        device = ?config.context.device,
        authenticated = config.context.auth.is_some(),
        pages = config.pages,
        page_size = config.page_size,
        "smoke configuration loaded"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("logic-background")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(driver::run(&config)) {
        Ok(report) => {
            info!(
                user = ?report.user_name,
                forums = report.forums,
                spans = report.spans,
                vote_delta = report.vote_delta,
                topics = report.topics,
                replies = report.replies,
                user_topics = report.user_topics,
                user_posts = report.user_posts,
                retries = report.retries,
                "smoke run finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "smoke run failed");
            ExitCode::FAILURE
        }
    }
}
