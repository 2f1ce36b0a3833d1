use clap::Parser;
use color_eyre::Result;
use speedtest_to_gsheet::{
    init_errors,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    App::new(Args::parse())?.run().await
}
