use anyhow::Result;

mod app;
mod logging;

fn main() -> Result<()> {
    let args = linkmove::cli::parse();
    app::run(args)
}
