//! Biomarker form: submit gating, one request per submit, and discard of
//! responses that land after a newer submit or a `clear()`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::{
    domain::{BiomarkerField, BiomarkerInput},
    protocol::{PredictRequest, YearPrediction},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    ClientError, ClientSettings, ControllerEvent, EventSource, Outcome, PredictionService,
    EVENT_CHANNEL_CAPACITY,
};

#[derive(Default)]
struct FormState {
    input: BiomarkerInput,
    can_submit: bool,
    generation: u64,
    predictions: Vec<YearPrediction>,
    last_error: Option<ClientError>,
}

/// Resets the in-flight flag however the submit future ends.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PredictionFormController {
    service: Arc<dyn PredictionService>,
    inner: Mutex<FormState>,
    submitting: AtomicBool,
    sort_years: bool,
    events: broadcast::Sender<ControllerEvent>,
}

impl PredictionFormController {
    pub fn new(service: Arc<dyn PredictionService>) -> Self {
        Self::new_with_settings(service, &ClientSettings::default())
    }

    pub fn new_with_settings(service: Arc<dyn PredictionService>, settings: &ClientSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            inner: Mutex::new(FormState::default()),
            submitting: AtomicBool::new(false),
            sort_years: settings.sort_prediction_years,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn update_field(&self, field: BiomarkerField, value: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.input.set(field, value);
        state.can_submit = state.input.is_complete();
    }

    pub async fn update_field_by_name(
        &self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ClientError> {
        let field = name.parse::<BiomarkerField>()?;
        self.update_field(field, value).await;
        Ok(())
    }

    /// Replaces all five raw values at once.
    pub async fn fill(&self, input: BiomarkerInput) {
        let mut state = self.inner.lock().await;
        state.can_submit = input.is_complete();
        state.input = input;
    }

    pub async fn field(&self, field: BiomarkerField) -> String {
        self.inner.lock().await.input.get(field).to_string()
    }

    pub async fn input(&self) -> BiomarkerInput {
        self.inner.lock().await.input.clone()
    }

    pub async fn can_submit(&self) -> bool {
        self.inner.lock().await.can_submit
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub async fn predictions(&self) -> Vec<YearPrediction> {
        self.inner.lock().await.predictions.clone()
    }

    pub async fn last_error(&self) -> Option<ClientError> {
        self.inner.lock().await.last_error.clone()
    }

    /// Sends the form to the prediction service.
    ///
    /// Rejected without a request when a field is empty or not a finite
    /// number, or when another submit is still running. Transport and decode
    /// failures keep the previous predictions and are returned as `Err`.
    pub async fn submit(&self) -> Result<Outcome, ClientError> {
        let (generation, request) = {
            let mut state = self.inner.lock().await;
            if self.is_submitting() {
                return Err(ClientError::Busy);
            }

            let request = match build_request(&state.input) {
                Ok(request) => request,
                Err(error) => {
                    warn!(%error, "prediction form rejected before dispatch");
                    state.last_error = Some(error.clone());
                    let _ = self.events.send(ControllerEvent::PredictionFailed {
                        generation: state.generation,
                        error: error.clone(),
                    });
                    return Err(error);
                }
            };

            self.submitting.store(true, Ordering::Release);
            state.generation += 1;
            (state.generation, request)
        };
        let _guard = SubmittingGuard(&self.submitting);

        debug!(generation, "dispatching prediction request");
        let result = self.service.predict(request).await;

        let mut state = self.inner.lock().await;
        if state.generation != generation {
            debug!(
                generation,
                latest = state.generation,
                "discarding stale prediction response"
            );
            let _ = self.events.send(ControllerEvent::StaleResponseDiscarded {
                source: EventSource::PredictionForm,
                generation,
                latest: state.generation,
            });
            return Ok(Outcome::Stale);
        }

        match result {
            Ok(mut timeline) => {
                if self.sort_years {
                    timeline.sort_by_year();
                }
                state.predictions = timeline.into_entries();
                state.last_error = None;
                info!(
                    generation,
                    years = state.predictions.len(),
                    "prediction results updated"
                );
                let _ = self.events.send(ControllerEvent::PredictionsUpdated {
                    generation,
                    predictions: state.predictions.clone(),
                });
                Ok(Outcome::Applied)
            }
            Err(error) => {
                warn!(generation, %error, "prediction request failed");
                state.last_error = Some(error.clone());
                let _ = self.events.send(ControllerEvent::PredictionFailed {
                    generation,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Empties the form and the results. A request still in flight keeps
    /// running but its response will be discarded.
    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.input = BiomarkerInput::default();
        state.can_submit = false;
        state.predictions.clear();
        state.last_error = None;
        state.generation += 1;
        debug!(generation = state.generation, "prediction form cleared");
        let _ = self.events.send(ControllerEvent::FormCleared {
            generation: state.generation,
        });
    }
}

fn build_request(input: &BiomarkerInput) -> Result<PredictRequest, ClientError> {
    let missing = input.missing_fields();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|field| field.as_str()).collect();
        return Err(ClientError::validation(format!(
            "missing biomarker values: {}",
            names.join(", ")
        )));
    }

    let value = |field: BiomarkerField| -> Result<f64, ClientError> {
        let raw = input.get(field).trim();
        match raw.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(ClientError::validation(format!(
                "{field} must be a finite number, got '{raw}'"
            ))),
        }
    };

    Ok(PredictRequest {
        cholesterol: value(BiomarkerField::Cholesterol)?,
        blood_pressure: value(BiomarkerField::BloodPressure)?,
        age: value(BiomarkerField::Age)?,
        glucose: value(BiomarkerField::Glucose)?,
        bmi: value(BiomarkerField::Bmi)?,
    })
}

#[cfg(test)]
#[path = "tests/prediction_tests.rs"]
mod tests;
