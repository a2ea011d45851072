//! Command-line surface: subcommands, the wiring between pipeline stages, and text rendering.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Subcommand, ValueEnum};

use crate::auth::CredentialStore;
use crate::client::{HttpPricingClient, PricingClient};
use crate::config::{Args, Config};
use crate::dispatch::{BUSY_MESSAGE, Dispatcher};
use crate::errors::Error;
use crate::events::EventReporter;
use crate::export::{DirectorySink, ExportEngine, LogOpener};
use crate::filter::{OnDemandRow, PlanRow, PlanType, ResultFilter, ResultView, RowBody, TermFilter};
use crate::history::{ExportHistory, ExportKind, ExportRecord};
use crate::ingest::{SelectedFile, UploadPolicy, accept_files};
use crate::storage::FileSlot;
use crate::store::{BatchResultSet, ResultStatus, ResultStore, StoreSnapshot};
use crate::types::{PaymentOption, PricingRequest};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Price every instance in an inventory file and optionally export the results
    Price(PriceArgs),
    /// Price a single instance
    Quote(QuoteArgs),
    /// List the export history, newest first
    History {
        /// Remove every recorded export
        #[arg(long)]
        clear: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct PriceArgs {
    /// Inventory files (.csv, .xls or .xlsx)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Purchasing options to show
    #[arg(long, value_enum, default_value_t = PlanType::All)]
    pub plan_type: PlanType,

    /// Commitment terms to show
    #[arg(long, value_enum, default_value_t = TermFilter::All)]
    pub term: TermFilter,

    /// Operating systems to show, comma separated
    #[arg(long, value_delimiter = ',', default_value = "linux,windows")]
    pub os: Vec<String>,

    /// Export the priced batch; repeat for several targets
    #[arg(long = "export", value_enum)]
    pub exports: Vec<ExportFormat>,
}

#[derive(clap::Args, Debug)]
pub struct QuoteArgs {
    #[arg(long)]
    pub region: String,
    #[arg(long)]
    pub instance_type: String,
    #[arg(long)]
    pub operation: String,
    #[arg(long)]
    pub os: String,
    #[arg(long, default_value = "Shared")]
    pub tenancy: String,
    #[arg(long, default_value_t = 1)]
    pub qty: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    /// Remote spreadsheet; needs stored credentials
    Sheets,
}

impl From<ExportFormat> for ExportKind {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Csv => ExportKind::TabularFile,
            ExportFormat::Xlsx => ExportKind::SpreadsheetFile,
            ExportFormat::Sheets => ExportKind::RemoteSpreadsheet,
        }
    }
}

/// Text rendering of the result store as seen through its filter.
pub struct ResultReport<'a> {
    snapshot: &'a StoreSnapshot,
}

impl<'a> ResultReport<'a> {
    pub fn new(snapshot: &'a StoreSnapshot) -> Self {
        Self { snapshot }
    }
}

fn write_on_demand(f: &mut fmt::Formatter<'_>, rows: &[OnDemandRow]) -> fmt::Result {
    writeln!(f, "  On-Demand")?;
    for row in rows {
        writeln!(
            f,
            "    {}: ${:.4}/hr, ${:.2} total",
            row.term.label(),
            row.hourly_rate,
            row.total_cost
        )?;
    }
    Ok(())
}

fn write_plan_row(f: &mut fmt::Formatter<'_>, row: &PlanRow) -> fmt::Result {
    write!(
        f,
        "    {} {}: ${:.4}/hr, ${:.2} total",
        row.term.label(),
        row.payment.label(),
        row.hourly_rate,
        row.total_cost
    )?;
    if let (PaymentOption::PartialUpfront, Some((fee, plan))) = (row.payment, row.partial_breakdown) {
        write!(f, " (${fee:.2} upfront + ${plan:.2} plan)")?;
    }
    writeln!(f, ", discount {}", row.discount)
}

fn write_view(f: &mut fmt::Formatter<'_>, view: &ResultView<'_>) -> fmt::Result {
    let input = view.input;
    writeln!(f)?;
    writeln!(
        f,
        "{} in {} ({}, {}, {}) x{}",
        input.instance_type, input.region_code, input.operating_system, input.product_tenancy, input.operation, input.qty
    )?;
    match &view.body {
        RowBody::Errors(errors) => {
            writeln!(f, "  Errors:")?;
            for error in errors {
                writeln!(f, "    - {error}")?;
            }
        }
        RowBody::Priced { on_demand, plans } => {
            if let Some(rows) = on_demand {
                write_on_demand(f, rows)?;
            }
            for table in plans {
                writeln!(f, "  {}", table.family.label())?;
                for row in &table.rows {
                    write_plan_row(f, row)?;
                }
            }
        }
    }
    Ok(())
}

impl fmt::Display for ResultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batch = &self.snapshot.batch;
        match batch.status() {
            ResultStatus::Error => {
                writeln!(f, "Pricing Error")?;
                writeln!(f, "{}", batch.error.as_deref().unwrap_or_default())
            }
            ResultStatus::Loading => writeln!(f, "{BUSY_MESSAGE}"),
            ResultStatus::Welcome => writeln!(f, "No pricing data yet. Upload an EC2 inventory to get started."),
            ResultStatus::Results => {
                writeln!(f, "Pricing Results")?;
                writeln!(f, "{}", batch.summary())?;
                let views = self.snapshot.filtered();
                if views.is_empty() {
                    writeln!(f)?;
                    writeln!(f, "No results match the current filters.")?;
                }
                for view in &views {
                    write_view(f, view)?;
                }
                Ok(())
            }
        }
    }
}

/// One line describing an audited export.
pub fn describe_record(record: &ExportRecord) -> String {
    let mut line = format!(
        "{}  {:<13}  {:<7}  {:>4} record(s)",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.kind.as_str(),
        format!("{:?}", record.status).to_lowercase(),
        record.record_count
    );
    if let Some(file_name) = &record.file_name {
        line.push_str(&format!("  {file_name}"));
    }
    if let Some(url) = &record.spreadsheet_url {
        line.push_str(&format!("  {url}"));
    }
    if let Some(error) = &record.error {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

/// Long-lived collaborators built from configuration.
pub struct App {
    config: Config,
    client: Arc<HttpPricingClient>,
    history: ExportHistory,
    credentials: CredentialStore,
    events: EventReporter,
}

impl App {
    pub fn from_config(config: Config) -> crate::errors::Result<Self> {
        let client = Arc::new(HttpPricingClient::from_config(&config.pricing_api)?);
        let history = ExportHistory::hydrate(Arc::new(FileSlot::new(&config.storage.history_path)));
        let credentials = CredentialStore::new(Arc::new(FileSlot::new(&config.storage.credentials_path)));

        let events = if config.telemetry.enabled {
            let user_id = credentials.load().user.map(|u| u.id);
            EventReporter::new(client.clone()).with_user(user_id)
        } else {
            EventReporter::disabled()
        };

        Ok(Self {
            config,
            client,
            history,
            credentials,
            events,
        })
    }

    fn export_engine(&self) -> ExportEngine<HttpPricingClient> {
        ExportEngine::new(
            self.client.clone(),
            self.history.clone(),
            Arc::new(DirectorySink::new(&self.config.export.output_dir)),
        )
        .with_opener(Arc::new(LogOpener), self.config.export.open_spreadsheet)
        .with_events(self.events.clone())
    }

    pub async fn price(&self, args: PriceArgs) -> anyhow::Result<()> {
        // Gate on metadata; content is only read for accepted files.
        let selected = args
            .files
            .iter()
            .map(|path| SelectedFile::from_path(path))
            .collect::<Result<Vec<_>, _>>()?;

        let (accepted, rejections) = accept_files(selected, UploadPolicy::from(&self.config.upload));
        for rejection in &rejections {
            eprintln!("{rejection}");
        }
        if accepted.is_empty() {
            return Err(Error::Validation { messages: rejections }.into());
        }

        let store = ResultStore::new();
        store.set_filter(ResultFilter::new(args.plan_type, args.term, &args.os));
        let dispatcher = Dispatcher::new(self.client.clone(), store.clone()).with_events(self.events.clone());
        let engine = self.export_engine();

        let mut failures = Vec::new();
        for selected in accepted {
            let outcome = dispatcher.submit(selected.load()?).await?;
            let snapshot = store.snapshot();
            print!("{}", ResultReport::new(&snapshot));

            if let Some(message) = outcome.error_message() {
                failures.push(message.to_string());
                continue;
            }

            if !args.exports.is_empty() {
                let session = self.credentials.load();
                println!();
                for format in &args.exports {
                    let record = engine.export((*format).into(), &snapshot.batch, &session).await;
                    println!("{}", describe_record(&record));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(failures.join("; ")))
        }
    }

    pub async fn quote(&self, args: QuoteArgs) -> anyhow::Result<()> {
        let mut request = PricingRequest::new(args.region, args.instance_type, args.operation, args.os);
        request.product_tenancy = args.tenancy;
        request.qty = args.qty.max(1);

        let outcome = self.client.price_instance(&request).await?;
        let snapshot = StoreSnapshot {
            filter: ResultFilter::new(PlanType::All, TermFilter::All, [&request.operating_system]),
            batch: BatchResultSet {
                results: vec![outcome],
                ..Default::default()
            },
        };
        print!("{}", ResultReport::new(&snapshot));
        Ok(())
    }

    pub fn history(&self, clear: bool) -> anyhow::Result<()> {
        if clear {
            self.history.clear_history();
            println!("Export history cleared.");
            return Ok(());
        }

        let records = self.history.history();
        if records.is_empty() {
            println!("No exports yet.");
        }
        for record in &records {
            println!("{}", describe_record(record));
        }
        Ok(())
    }
}

/// Run the parsed command.
pub async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let app = App::from_config(config)?;
    match command {
        Command::Price(price) => app.price(price).await,
        Command::Quote(quote) => app.quote(quote).await,
        Command::History { clear } => app.history(clear),
    }
}
