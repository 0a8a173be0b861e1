use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::PatientId,
    error::ApiError,
    protocol::{
        ListQuery, PatientPage, PatientRecord, PredictRequest, PredictResponse,
        PredictionTimeline, YearPrediction,
    },
};
use tracing::debug;
use url::Url;

pub mod config;
pub mod error;
pub mod listing;
pub mod prediction;

pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use listing::{PatientListController, PatientListSnapshot};
pub use prediction::PredictionFormController;

/// Capacity of each controller's event channel; slow subscribers lag rather
/// than block the controller.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, request: PredictRequest) -> Result<PredictionTimeline, ClientError>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn list_patients(&self, query: ListQuery) -> Result<PatientPage, ClientError>;
}

/// What happened to a response once it came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response replaced the displayed state.
    Applied,
    /// A newer request (or a reset) superseded this one; nothing changed.
    Stale,
    /// The operation was a no-op and no request was sent.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    PredictionForm,
    PatientList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    PredictionsUpdated {
        generation: u64,
        predictions: Vec<YearPrediction>,
    },
    PredictionFailed {
        generation: u64,
        error: ClientError,
    },
    FormCleared {
        generation: u64,
    },
    PatientsUpdated {
        generation: u64,
        page: u32,
        total_pages: u32,
        count: usize,
    },
    PatientListFailed {
        generation: u64,
        error: ClientError,
    },
    StaleResponseDiscarded {
        source: EventSource,
        generation: u64,
        latest: u64,
    },
}

/// HTTP collaborator for the prediction and patient endpoints.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: Client,
    base_url: Url,
}

impl DashboardClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = config::normalize_base_url(&settings.api_base_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self { http, base_url })
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ClientError> {
        Self::new(&ClientSettings {
            api_base_url: base_url.to_string(),
            ..ClientSettings::default()
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::Config(format!("invalid endpoint '{path}': {err}")))
    }

    pub async fn fetch_patient(&self, patient_id: PatientId) -> Result<PatientRecord, ClientError> {
        let url = self.endpoint(&format!("patient/{}", patient_id.0))?;
        debug!(%url, "fetching patient detail");
        let response = self.http.get(url).send().await?;
        decode_response(response, "patient detail").await
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: Response,
    context: &'static str,
) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::from_api_error(
            status.as_u16(),
            ApiError::from_response_body(status.as_u16(), &body),
        ));
    }
    serde_json::from_str(&body).map_err(|err| ClientError::decode(context, err))
}

#[async_trait]
impl PredictionService for DashboardClient {
    async fn predict(&self, request: PredictRequest) -> Result<PredictionTimeline, ClientError> {
        let url = self.endpoint("predict")?;
        debug!(%url, "posting prediction request");
        let response = self.http.post(url).json(&request).send().await?;
        let body: PredictResponse = decode_response(response, "prediction").await?;
        Ok(body.predictions)
    }
}

#[async_trait]
impl PatientDirectory for DashboardClient {
    async fn list_patients(&self, query: ListQuery) -> Result<PatientPage, ClientError> {
        let url = self.endpoint("patients")?;
        debug!(%url, page = query.page, "listing patients");
        let response = self.http.get(url).query(&query).send().await?;
        decode_response(response, "patient list").await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
