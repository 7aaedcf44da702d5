use std::path::PathBuf;

use clap::Parser;
use primeweb_scraping::parser::parse_journal;
use scraper::Html;

#[derive(Parser)]
struct Opts {
    input: PathBuf,
    /// Year of the first day in the report.
    #[arg(long)]
    start_year: i32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();
    let html = Html::parse_document(&fs_err::read_to_string(opts.input)?);
    let journal = parse_journal(&html, opts.start_year)?;
    println!("{}", serde_json::to_string_pretty(&journal)?);
    Ok(())
}
