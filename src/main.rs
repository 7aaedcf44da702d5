use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::info;
use primeweb_scraping::{
    api::{LoggedIn, PrimeWebClient},
    checkout::CheckoutProjection,
    chrono_util::{local_now, parse_date_arg},
    config::{load_password, resolve_login, save_password, Config, LoginOverrides},
    parser::parse_journal,
    schema::DateRange,
};
use primeweb_scraping_utils::fs_json_util::write_json_pretty;
use scraper::Html;

/// Track your today's working hours.
#[derive(Parser)]
#[command(version)]
struct Opts {
    /// Only output the delta of work time, nothing more.
    #[arg(short, long)]
    delta: bool,
    /// Only output the target check-out time, nothing more.
    #[arg(short = 'c', long = "check-out")]
    check_out: bool,
    /// Increase the level of verbosity of the command.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// URL of your company's PrimeWeb website.
    #[arg(short = 'U', long)]
    url: Option<String>,
    /// Username to use to log in.
    #[arg(short, long)]
    user: Option<String>,
    /// Password to use to log in.
    #[arg(short, long)]
    pass: Option<String>,
    /// Save the URL and username in the config file, and the password in the
    /// system keyring, so that -U, -u and -p can be omitted next time.
    #[arg(short, long)]
    save_login: bool,
    /// Config file to use instead of the one in the user's config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    sub: Option<Sub>,
}

#[derive(Subcommand)]
enum Sub {
    /// Print the journal for a range of days as JSON.
    Journal(JournalArgs),
}

#[derive(Args)]
struct JournalArgs {
    /// First day (YYYY-MM-DD, DD.MM.YYYY, today or yesterday).
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,
    /// Last day; defaults to today.
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,
    /// Write the JSON to this file instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also save the raw report HTML to this file.
    #[arg(long)]
    save_html: Option<PathBuf>,
}

#[derive(Clone, Copy)]
enum StatusOutput {
    Full,
    Delta,
    CheckOut,
}

macro_rules! say {
    ($verbosity: expr, $level: expr, $($arg: tt)*) => {
        if $verbosity >= $level {
            println!($($arg)*);
        }
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let opts = Opts::parse();

    let output = if opts.delta {
        StatusOutput::Delta
    } else if opts.check_out {
        StatusOutput::CheckOut
    } else {
        StatusOutput::Full
    };
    let verbosity = match (opts.verbose, output) {
        (0, StatusOutput::Full) => 0,
        (0, _) => -1,
        (count, _) => i8::try_from(count).unwrap_or(i8::MAX),
    };

    let config_path = match opts.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load(&config_path)?;
    let overrides = LoginOverrides {
        url: opts.url,
        user: opts.user,
        password: opts.pass,
    };
    let (url, credentials) = resolve_login(overrides, &config, load_password)?;

    if opts.save_login {
        config.url = Some(url.clone());
        config.username = Some(credentials.user_name.clone());
        config.save(&config_path)?;
        save_password(&credentials.user_name, &credentials.password)?;
        info!("Saved login details to {config_path:?} and the system keyring");
    }

    let mut client = PrimeWebClient::new(&url, config.timeout())?
        .login(&credentials)
        .await?;
    if let Some(name) = client.display_name() {
        say!(verbosity, 2, "Login successful as: {name}");
    }

    match opts.sub {
        Some(Sub::Journal(args)) => journal(&mut client, &config, args).await,
        None => status(&mut client, &config, output, verbosity).await,
    }
}

async fn status(
    client: &mut PrimeWebClient<LoggedIn>,
    config: &Config,
    output: StatusOutput,
    verbosity: i8,
) -> anyhow::Result<()> {
    let now = local_now();
    let today = now.date();
    let journal = client.journal(DateRange::new(today, today)).await?;
    let projection = CheckoutProjection::from_day(journal.get(&today), config.lunch_break)?;

    if let Some(core_time) = projection.core_time() {
        say!(verbosity, 2, "Your core time from PrimeWeb: {core_time}");
    }
    say!(
        verbosity,
        1,
        "Downloaded check-in time from PrimeWeb:   {}",
        projection.check_in()
    );
    say!(
        verbosity,
        2,
        "Your current period's balance was: {}",
        projection.day_balance()
    );
    say!(
        verbosity,
        1,
        "Your target check-out time from PrimeWeb: {}",
        projection.check_out()
    );

    match output {
        StatusOutput::Delta => println!("{}", projection.delta(now)),
        StatusOutput::CheckOut => println!("{}", projection.check_out()),
        StatusOutput::Full => println!("{}", projection.status(now)),
    }
    Ok(())
}

async fn journal(
    client: &mut PrimeWebClient<LoggedIn>,
    config: &Config,
    args: JournalArgs,
) -> anyhow::Result<()> {
    let range = DateRange::resolve(
        args.start,
        args.end,
        local_now().date(),
        config.default_days,
    )?;
    let html = client.fetch_journal_html(range).await?;
    if let Some(path) = &args.save_html {
        fs_err::write(path, &html)?;
        info!("Saved the report HTML to {path:?}");
    }
    let journal = parse_journal(&Html::parse_document(&html), range.start().year())?;

    match &args.output {
        Some(path) => write_json_pretty(path, &journal)?,
        None => println!("{}", serde_json::to_string_pretty(&journal)?),
    }
    Ok(())
}
