use crate::{
    appender::append_row,
    measurement::{
        format_mbps,
        SpeedtestCli,
    },
    row::SheetRow,
    Config,
    Result,
};
use gsheets_client::{
    Client,
    ClientOptions,
    ServiceAccountKey,
};
use std::{
    future::Future,
    pin::Pin,
};

/// Work the scheduler triggers.
pub trait Job: Send + Sync {
    /// Run one cycle. Errors end the cycle, not the scheduler.
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Get the name of this job
    fn name(&self) -> &'static str;
}

/// Measure, map the result to a row, append it to the sheet.
#[derive(Debug, Clone)]
pub struct SpeedtestJob {
    server_id: String,
    doc_key: String,
    sheet_name: String,
    service_key: ServiceAccountKey,
    sheets: ClientOptions,
    speedtest: SpeedtestCli,
}

impl SpeedtestJob {
    /// Reads the service-account key once, so a missing or malformed key fails at startup.
    pub fn new(config: &Config) -> Result<Self> {
        let service_key = ServiceAccountKey::from_file(&config.gsheets_service_key_filename)?;
        debug!(?service_key, "loaded service account key");

        Ok(Self {
            server_id: config.server_id.clone(),
            doc_key: config.gsheet_doc_key.clone(),
            sheet_name: config.gsheet_sheet_name.clone(),
            service_key,
            sheets: ClientOptions {
                timeout: config.gsheets_timeout,
                ..Default::default()
            },
            speedtest: SpeedtestCli::new(&config.speedtest),
        })
    }

    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.sheets = options;
        self
    }

    pub fn speedtest(&self) -> &SpeedtestCli {
        &self.speedtest
    }

    /// One full cycle. Returns the sheet row the measurement was written to.
    pub async fn run_once(&self) -> Result<u32> {
        info!("==========================================");
        info!("Starting next run...");

        info!("Getting data...");
        let record = self.speedtest.measure(&self.server_id).await?;
        info!(
            "{} Mbps / {} Mbps (D/U) --> {}",
            format_mbps(record.download.mbps()),
            format_mbps(record.upload.mbps()),
            record.result.url
        );
        debug!("Data:\n{record:#?}");

        let row = SheetRow::try_from(&record)?;

        let client = Client::authorize(&self.service_key, self.sheets.clone()).await?;
        let worksheet = client.open_by_key(&self.doc_key).await?.worksheet(&self.sheet_name)?;

        let written = append_row(&worksheet, &row).await?;
        info!("Wrote row {written} to worksheet '{}'", worksheet.title());
        Ok(written)
    }
}

impl Job for SpeedtestJob {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.run_once().await?;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "speedtest"
    }
}
