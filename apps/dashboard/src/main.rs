use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, DashboardClient, PatientListController, PredictionFormController,
};
use shared::{
    domain::{
        BiomarkerField, BiomarkerInput, PageSize, PatientId, SortDirection, SortField, ViewMode,
    },
    protocol::ListQuery,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "MedPredict patient dashboard client")]
struct Cli {
    /// Base URL of the prediction/patient service; overrides dashboard.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Print raw JSON instead of formatted text.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict disease labels per year from five biomarkers.
    Predict {
        #[arg(long)]
        age: String,
        #[arg(long)]
        cholesterol: String,
        #[arg(long)]
        blood_pressure: String,
        #[arg(long)]
        glucose: String,
        #[arg(long)]
        bmi: String,
    },
    /// Browse one page of the patient list.
    Patients {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_parser = parse_page_size)]
        page_size: Option<PageSize>,
        #[arg(long, default_value = "patient_id")]
        sort_by: SortField,
        #[arg(long, default_value = "asc")]
        sort_dir: SortDirection,
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value = "table")]
        view: ViewMode,
    },
    /// Show a single patient record.
    Patient { id: i64 },
}

fn parse_page_size(raw: &str) -> Result<PageSize, String> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    PageSize::try_from(value).map_err(|err| format!("{err}; expected 15, 30 or 50"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    let client = Arc::new(DashboardClient::new(&settings).context("invalid client settings")?);
    info!(base_url = %client.base_url(), "dashboard client ready");

    match cli.command {
        Command::Predict {
            age,
            cholesterol,
            blood_pressure,
            glucose,
            bmi,
        } => {
            let form = PredictionFormController::new_with_settings(client, &settings);
            form.fill(
                BiomarkerInput::default()
                    .with(BiomarkerField::Age, age)
                    .with(BiomarkerField::Cholesterol, cholesterol)
                    .with(BiomarkerField::BloodPressure, blood_pressure)
                    .with(BiomarkerField::Glucose, glucose)
                    .with(BiomarkerField::Bmi, bmi),
            )
            .await;
            form.submit().await.context("prediction failed")?;

            let predictions = form.predictions().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&predictions)?);
            } else {
                print!("{}", render::render_predictions(&predictions));
            }
        }
        Command::Patients {
            page,
            page_size,
            sort_by,
            sort_dir,
            q,
            view,
        } => {
            let listing = PatientListController::new_with_settings(client, &settings);
            listing.set_view_mode(view).await;

            let defaults = listing.query().await;
            listing
                .set_list_query(ListQuery {
                    page,
                    page_size: page_size.unwrap_or(defaults.page_size),
                    sort_by,
                    sort_dir,
                    q,
                })
                .await
                .context("failed to load patients")?;

            let snapshot = listing.snapshot().await;
            if page > snapshot.total_pages.max(1) {
                anyhow::bail!(
                    "page {page} is out of range; the listing has {} page(s)",
                    snapshot.total_pages
                );
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snapshot.patients)?);
            } else {
                print!("{}", render::render_patient_list(&snapshot));
            }
        }
        Command::Patient { id } => {
            let patient = client
                .fetch_patient(PatientId(id))
                .await
                .with_context(|| format!("failed to fetch patient {id}"))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&patient)?);
            } else {
                print!("{}", render::render_patient(&patient));
            }
        }
    }

    Ok(())
}
