//! # Speedtest to Google Sheets
//!
//! Runs the Ookla speedtest CLI on a schedule and appends every result as a new row of a
//! Google Sheet:
//!
//! 1. `measurement`: run `speedtest --format=json` and parse its output
//! 2. `row`: map the measurement onto the fixed 24-column layout of the sheet
//! 3. `appender`: find the next empty row and write the cells in one request
//! 4. `job`: one full measure-map-append cycle
//! 5. `scheduler`: trigger the job by cron expression or fixed interval until shutdown

#[macro_use]
extern crate tracing;

mod app;
pub mod appender;
pub mod errors;
pub mod job;
pub mod logging;
pub mod measurement;
pub mod row;
pub mod schedule;
pub mod scheduler;
pub mod shutdown;

pub use app::App;
pub use errors::{
    init_errors,
    Error,
    Result,
};
pub use job::{
    Job,
    SpeedtestJob,
};
pub use measurement::{
    MeasurementRecord,
    SpeedtestCli,
};
pub use row::SheetRow;
pub use scheduler::{
    Scheduler,
    SchedulerState,
};
pub use speedtest_gsheet_config::{
    Args,
    Config,
    Schedule,
};
