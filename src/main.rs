use anyhow::{Result, anyhow};
use blobtable::config::{CONNECTION_ENV_VAR, TABLE_ENV_VAR};
use blobtable::{Config, Ingestor, MemoryStore, NotificationEvent, set_up_logger};
use clap::{Arg, ArgAction, Command};
use log::debug;
use std::env;
use std::fs;
use std::io::{self, Read};

#[derive(Debug)]
struct Args {
    verbose: bool,
    file: Option<String>,
    connection: Option<String>,
    table: Option<String>,
    dry_run: bool,
}

fn parse_args() -> Args {
    let matches = Command::new("blobtable")
        .version("0.1")
        .author("Jacob Luszcz")
        .about("Stores a blob change notification as a table row.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Verbose mode. Outputs DEBUG and higher log messages."),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .help("Notification event JSON file. Reads stdin if omitted."),
        )
        .arg(
            Arg::new("connection")
                .short('c')
                .long("connection")
                .help("Table store connection descriptor, e.g. 'Region=us-west-2'."),
        )
        .arg(
            Arg::new("table")
                .short('t')
                .long("table")
                .help("Table name."),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Store the record in memory and print it instead of writing to the table store."),
        )
        .get_matches();

    Args {
        verbose: matches.get_flag("verbose"),
        file: matches.get_one::<String>("file").cloned(),
        connection: matches.get_one::<String>("connection").cloned(),
        table: matches.get_one::<String>("table").cloned(),
        dry_run: matches.get_flag("dry-run"),
    }
}

impl Args {
    fn config(&self) -> Config {
        Config::from_settings(
            self.connection
                .clone()
                .or_else(|| env::var(CONNECTION_ENV_VAR).ok()),
            self.table.clone().or_else(|| env::var(TABLE_ENV_VAR).ok()),
        )
    }

    fn read_event(&self) -> Result<NotificationEvent> {
        let raw = match &self.file {
            Some(path) => fs::read_to_string(path)?,
            None => {
                let mut raw = String::new();
                io::stdin().read_to_string(&mut raw)?;
                raw
            }
        };

        Ok(serde_json::from_str(&raw)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    set_up_logger(module_path!(), args.verbose)?;
    debug!("Args: {:?}", args);

    let config = args.config();
    let event = args.read_event()?;

    if args.dry_run {
        let ingestor = Ingestor::new(MemoryStore::new(), config.table_name);
        ingestor.ingest(&event).await?;

        let record = ingestor
            .store()
            .get(ingestor.table_name(), event.partition_key()?, event.row_key()?)
            .ok_or_else(|| anyhow!("Record for {} not found after insert", event.id))?;

        println!("{}", serde_json::to_string_pretty(&record)?);
    } else if !Ingestor::connect(&config).await?.ingest_or_log(&event).await {
        return Err(anyhow!("Event {} was not stored", event.id));
    }

    Ok(())
}
