use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use emistats::{
    aggregate::YearFilter,
    config::{DuplicateYears, Settings},
    dataset::{DatasetDescriptor, Registry},
    import,
    page::{DatasetPage, DeleteOutcome},
    record::RecordId,
    store::{ParquetStore, RecordStore, UniqueYears},
};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Filipino emigrant statistics: import, edit and summarize datasets"
)]
struct Args {
    /// YAML settings file
    #[arg(long, env = "EMISTATS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding one folder per collection (overrides the config)
    #[arg(long, env = "EMISTATS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known datasets and whether they have data on disk
    Datasets,
    #[command(flatten)]
    Dataset(DatasetCommand),
}

/// Commands that act on one dataset's collection.
#[derive(Subcommand, Debug)]
enum DatasetCommand {
    /// Import a .csv file into a dataset
    Import { dataset: String, file: PathBuf },
    /// Show the records of a dataset
    List { dataset: String },
    /// Add one record
    Add {
        dataset: String,
        #[arg(long)]
        year: String,
        /// `field=value`, by key or label; repeatable
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Edit one record and save it
    Update {
        dataset: String,
        id: String,
        #[arg(long)]
        year: Option<String>,
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Delete one record
    Delete {
        dataset: String,
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Totals and shares per category
    Summary {
        dataset: String,
        /// `All` or a year
        #[arg(long, default_value = "All")]
        year: YearFilter,
        #[arg(long)]
        json: bool,
    },
    /// Distinct years present
    Years { dataset: String },
    /// Per-year sums for each category
    Series {
        dataset: String,
        #[arg(long)]
        json: bool,
    },
    /// Write a dataset back out as CSV
    Export { dataset: String, out: PathBuf },
}

impl DatasetCommand {
    fn dataset(&self) -> &str {
        match self {
            DatasetCommand::Import { dataset, .. }
            | DatasetCommand::List { dataset }
            | DatasetCommand::Add { dataset, .. }
            | DatasetCommand::Update { dataset, .. }
            | DatasetCommand::Delete { dataset, .. }
            | DatasetCommand::Summary { dataset, .. }
            | DatasetCommand::Years { dataset }
            | DatasetCommand::Series { dataset, .. }
            | DatasetCommand::Export { dataset, .. } => dataset,
        }
    }
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got `{}`", s))?;
    Ok((k.trim().to_string(), v.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }
    let registry = settings.registry()?;

    let command = match args.command {
        Command::Datasets => return list_datasets(&registry, &settings),
        Command::Dataset(command) => command,
    };
    let descriptor = registry.get(command.dataset())?.clone();
    let store = ParquetStore::open(&settings.data_dir, &descriptor)
        .with_context(|| format!("opening store under {}", settings.data_dir.display()))?;
    let ttl = settings.notice_ttl()?;

    match settings.duplicate_years {
        DuplicateYears::Allow => run(open(descriptor, store, ttl).await?, command).await,
        DuplicateYears::Reject => {
            run(open(descriptor, UniqueYears::new(store), ttl).await?, command).await
        }
    }
}

async fn open<S: RecordStore>(
    descriptor: DatasetDescriptor,
    store: S,
    ttl: Duration,
) -> Result<DatasetPage<S>> {
    let page = DatasetPage::open(descriptor, store).await?;
    Ok(page.with_notice_ttl(ttl))
}

fn list_datasets(registry: &Registry, settings: &Settings) -> Result<()> {
    let present = ParquetStore::collections(&settings.data_dir)?;
    println!(
        "{: <14} {: <24} {: <11} {:>10}  {}",
        "Name", "Collection", "Chart", "Categories", "On disk"
    );
    println!("{:-<72}", "");
    for d in registry.iter() {
        println!(
            "{: <14} {: <24} {: <11} {:>10}  {}",
            d.name,
            d.collection,
            format!("{:?}", d.chart).to_lowercase(),
            d.categories.len(),
            if present.contains(&d.collection) { "yes" } else { "no" }
        );
    }
    Ok(())
}

async fn run<S: RecordStore>(mut page: DatasetPage<S>, command: DatasetCommand) -> Result<()> {
    match command {
        DatasetCommand::Import { file, .. } => {
            let report = page.import_file(&file).await?;
            if !report.skipped_lines.is_empty() {
                println!(
                    "skipped {} row(s) without a year: lines {:?}",
                    report.skipped_lines.len(),
                    report.skipped_lines
                );
            }
            print_notice(&page);
        }
        DatasetCommand::List { .. } => print_rows(&page),
        DatasetCommand::Add { year, set, .. } => {
            let mut form = page.blank_form();
            form.year = year;
            for (field, value) in &set {
                form.set(page.descriptor(), field, value)?;
            }
            let id = page.add(&form).await?;
            print_notice(&page);
            println!("id: {}", id);
        }
        DatasetCommand::Update { id, year, set, .. } => {
            let id = RecordId::from(id);
            page.begin_edit(&id)?;
            if let Some(year) = year {
                page.set_field("year", &year)?;
            }
            for (field, value) in &set {
                page.set_field(field, value)?;
            }
            page.save_edit().await?;
            print_notice(&page);
        }
        DatasetCommand::Delete { id, yes, .. } => {
            let id = RecordId::from(id);
            let outcome = page
                .delete(&id, |id| yes || confirm(&format!("Delete record {}?", id)))
                .await?;
            match outcome {
                DeleteOutcome::Cancelled => println!("cancelled"),
                DeleteOutcome::Missing => println!("no record {}; nothing to delete", id),
                DeleteOutcome::Deleted => print_notice(&page),
            }
        }
        DatasetCommand::Summary { year, json, .. } => {
            page.select_year(year);
            let summary = page.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{} ({} record(s), year: {})",
                    page.descriptor().title,
                    summary.records,
                    summary.filter
                );
                println!("{: <48} {:>12} {:>8}", "Category", "Total", "%");
                println!("{:-<70}", "");
                for c in &summary.categories {
                    println!("{: <48} {:>12} {:>8.1}", c.label, c.total, c.percentage);
                }
                println!("{: <48} {:>12}", "Total", summary.grand_total);
            }
        }
        DatasetCommand::Years { .. } => {
            for y in page.years() {
                println!("{}", y);
            }
        }
        DatasetCommand::Series { json, .. } => {
            let series = page.series();
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                let keys: Vec<&str> = page.descriptor().keys().collect();
                println!("year,{},total", keys.join(","));
                for p in &series {
                    let values: Vec<String> = p.values.iter().map(u64::to_string).collect();
                    println!("{},{},{}", p.year, values.join(","), p.total);
                }
            }
        }
        DatasetCommand::Export { out, .. } => {
            import::export_file(&out, page.descriptor(), page.records())?;
            info!(path = %out.display(), records = page.records().len(), "exported");
            println!("wrote {} record(s) to {}", page.records().len(), out.display());
        }
    }
    Ok(())
}

fn print_rows<S: RecordStore>(page: &DatasetPage<S>) {
    let labels: Vec<&str> = page
        .descriptor()
        .categories
        .iter()
        .map(|c| c.key.as_str())
        .collect();
    println!("{: <34} {: >6} {}", "id", "year", labels.join(" | "));
    for row in page.rows() {
        println!(
            "{: <34} {: >6} {}",
            row.id.as_str(),
            row.year,
            row.cells.join(" | ")
        );
    }
}

fn print_notice<S: RecordStore>(page: &DatasetPage<S>) {
    if let Some(n) = page.notice(Utc::now()) {
        println!("{}", n.message);
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasets_needs_no_dataset_argument() {
        let args = Args::try_parse_from(["emistats", "datasets"]).unwrap();
        assert!(matches!(args.command, Command::Datasets));
    }

    #[test]
    fn dataset_commands_carry_their_dataset() {
        let args =
            Args::try_parse_from(["emistats", "summary", "sex", "--year", "2019", "--json"])
                .unwrap();
        let Command::Dataset(cmd) = args.command else {
            panic!("expected a dataset command");
        };
        assert_eq!(cmd.dataset(), "sex");
        assert!(matches!(
            cmd,
            DatasetCommand::Summary {
                year: YearFilter::Year(2019),
                json: true,
                ..
            }
        ));

        let args = Args::try_parse_from([
            "emistats", "add", "civil-status", "--year", "2020", "--set", "Single=4",
        ])
        .unwrap();
        let Command::Dataset(DatasetCommand::Add { set, .. }) = args.command else {
            panic!("expected add");
        };
        assert_eq!(set, vec![("Single".to_string(), "4".to_string())]);
    }
}
