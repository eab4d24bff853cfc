use std::{
    error::Error,
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kakeibo::{
    Amount, ExpenseRecord, LedgerConfig, RecordCache, RecordDate, RecordId, SQLiteRecordStore,
    aggregation::{
        RecordFilter, coerce_amount, filter, order_by_members, sum_by_month, sum_by_name,
        to_chart_series, total,
    },
    csv_file::{export_records, parse_drafts},
    currency::format_yen,
    local_today,
};

/// A command line tool for the household expense ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// File path to the ledger SQLite database.
    #[arg(long)]
    db_path: PathBuf,

    /// File path to a JSON file with the household members and their colors.
    #[arg(long)]
    config: Option<PathBuf>,

    /// The canonical name of the local timezone, used for today's date.
    #[arg(long, default_value = "Asia/Tokyo")]
    timezone: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new expense.
    Add {
        /// The household member who spent the money.
        #[arg(long)]
        name: String,
        /// When the money was spent as YYYY-MM-DD, today if not given.
        #[arg(long)]
        date: Option<String>,
        /// What the money was spent on.
        #[arg(long)]
        item: String,
        /// How much was spent, in yen.
        #[arg(long)]
        amount: String,
    },
    /// Change fields of an existing expense.
    Edit {
        /// The ID of the expense to change.
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        item: Option<String>,
        #[arg(long)]
        amount: Option<String>,
    },
    /// Delete an expense.
    Delete {
        /// The ID of the expense to delete.
        id: String,
    },
    /// List expenses, newest first.
    List(FilterArgs),
    /// Show totals per member and per month.
    Summary(FilterArgs),
    /// Write every expense to a CSV file.
    Export {
        /// The CSV file to write.
        path: PathBuf,
    },
    /// Add every row of a CSV file with a `name,date,item,amount` header.
    Import {
        /// The CSV file to read.
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Only expenses of this member.
    #[arg(long)]
    name: Option<String>,
    /// Only expenses in this month, as YYYY-MM.
    #[arg(long)]
    month: Option<String>,
    /// Only expenses on this day, as YYYY-MM-DD.
    #[arg(long)]
    day: Option<String>,
}

impl From<FilterArgs> for RecordFilter {
    fn from(args: FilterArgs) -> Self {
        RecordFilter {
            name: args.name,
            month: args.month,
            day: args.day,
        }
        .without_blanks()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_path(path)?,
        None => LedgerConfig::default(),
    };
    let store = Arc::new(SQLiteRecordStore::open(&cli.db_path)?);
    let mut cache = RecordCache::new(store, config)?;
    cache.next_snapshot().await?;

    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Add {
            name,
            date,
            item,
            amount,
        } => {
            let date = match date {
                Some(date) => RecordDate::new(date),
                None => RecordDate::from_date(local_today(&cli.timezone)?),
            };
            let draft = ExpenseRecord::build(
                &name,
                date.as_str(),
                &item,
                Amount::from_input(&amount),
            );

            let id = cache.submit(draft).await?;
            writeln!(stdout, "Added expense {id}")?;
        }
        Command::Edit {
            id,
            name,
            date,
            item,
            amount,
        } => {
            let id = RecordId::new(id);
            let Some(record) = cache.records().iter().find(|record| record.id == id) else {
                return Err(format!("No expense with ID {id}").into());
            };

            let mut draft = record.to_draft();
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(date) = date {
                draft.date = RecordDate::new(date);
            }
            if let Some(item) = item {
                draft.item = item;
            }
            if let Some(amount) = amount {
                draft.amount = Amount::from_input(&amount);
            }

            cache.submit(draft).await?;
            writeln!(stdout, "Updated expense {id}")?;
        }
        Command::Delete { id } => {
            let id = RecordId::new(id);
            cache.remove(&id).await?;
            writeln!(stdout, "Deleted expense {id}")?;
        }
        Command::List(args) => {
            let records = filter(cache.records(), &args.into());

            for record in &records {
                writeln!(
                    stdout,
                    "{:>6}  {}  {}  {}  {}",
                    record.id,
                    record.date,
                    record.name,
                    record.item,
                    format_yen(coerce_amount(&record.amount))
                )?;
            }
            writeln!(
                stdout,
                "{} expenses, {}",
                records.len(),
                format_yen(total(&records))
            )?;
        }
        Command::Summary(args) => {
            let records = filter(cache.records(), &args.into());
            let members = order_by_members(
                to_chart_series(&sum_by_name(&records)),
                &cache.config().members,
            );

            writeln!(stdout, "By member")?;
            for point in members {
                writeln!(stdout, "  {}  {}", point.label, format_yen(point.value))?;
            }

            writeln!(stdout, "By month")?;
            for (month, value) in sum_by_month(&records) {
                writeln!(stdout, "  {month}  {}", format_yen(value))?;
            }

            writeln!(stdout, "Total  {}", format_yen(total(&records)))?;
        }
        Command::Export { path } => {
            let file = File::create(&path)?;
            export_records(cache.records(), file)?;
            writeln!(
                stdout,
                "Exported {} expenses to {}",
                cache.records().len(),
                path.display()
            )?;
        }
        Command::Import { path } => {
            let file = File::open(&path)?;
            let drafts = parse_drafts(BufReader::new(file))?;

            // Check every row first so a bad file adds nothing.
            for (index, draft) in drafts.iter().enumerate() {
                draft
                    .validate(cache.config())
                    .map_err(|error| format!("row {}: {error}", index + 1))?;
            }

            for draft in drafts.iter().cloned() {
                cache.submit(draft).await?;
            }
            writeln!(stdout, "Imported {} expenses", drafts.len())?;
        }
    }

    cache.close();

    Ok(())
}

/// Log warnings, such as malformed rows in the database, to stderr.
///
/// Set `RUST_LOG` for more detail, e.g. `RUST_LOG=kakeibo=debug`.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
