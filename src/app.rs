use crate::{
    logging::init_logging,
    scheduler::Scheduler,
    shutdown,
    Args,
    Config,
    SpeedtestJob,
};
use color_eyre::Result;
use eyre::Context as _;
use tokio_util::sync::CancellationToken;

/// Width of the setting labels in the startup summary.
const LABEL_WIDTH: usize = 32;

pub struct App {
    config: Config,
}

impl App {
    /// Load and validate the configuration, then set up logging. Nothing is scheduled yet.
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args).wrap_err("Invalid configuration")?;
        init_logging(config.debug, config.log_file.as_deref())?;

        info!("DEBUG: {}", config.debug);
        debug!("Running with the below settings:");
        for (name, value) in config.display_settings() {
            let padding = LABEL_WIDTH.saturating_sub(name.len());
            info!("    {name}:{:padding$}{value}", "");
        }

        Ok(Self { config })
    }

    pub async fn run(self) -> Result<()> {
        let job = SpeedtestJob::new(&self.config).wrap_err("Failed to load the service account key")?;
        job.speedtest().locate()?;
        job.speedtest()
            .ensure_license_accepted()
            .await
            .wrap_err("Failed to accept the speedtest license")?;

        info!("Creating scheduler...");
        let token = CancellationToken::new();
        let signals = shutdown::install(token.clone()).wrap_err("Failed to register signal handlers")?;

        let scheduler = Scheduler::new(self.config.schedule.clone(), job, token.clone());
        scheduler.run().await;

        // Ends the signal task when the scheduler stopped on its own (no future run).
        token.cancel();
        signals.await.wrap_err("Signal handler task failed")?;
        Ok(())
    }
}
