//src/importer_client.rs
use crate::session::SessionLog;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_ENDPOINT_URL: &str =
    "https://s8afs561v2.execute-api.eu-south-1.amazonaws.com/update-activity-description";
pub const ACTIVITY_TYPE: &str = "WeightTraining";
pub const ALREADY_HAS_DESCRIPTION_MARKER: &str = "The activity found already has a description";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("Failed to send request to strava-importer-api: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response body from strava-importer-api: {source}. Body: {body}")]
    InvalidResponse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Body of `POST /update-activity-description`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescriptionRequest {
    pub after_ts: i64,
    pub before_ts: i64,
    pub description: String,
    pub activity_type: String,
    pub name: String,
    // The importer expects "true"/"false" strings, not JSON booleans.
    #[serde(serialize_with = "bool_as_str")]
    pub do_stop_if_description_not_null: bool,
}

fn bool_as_str<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

impl UpdateDescriptionRequest {
    pub fn new(log: &SessionLog, require_no_existing_description: bool) -> Self {
        Self {
            after_ts: log.time_window.day_start,
            before_ts: log.time_window.day_end,
            description: log.description.clone(),
            activity_type: ACTIVITY_TYPE.to_string(),
            name: log.activity_name.clone(),
            do_stop_if_description_not_null: require_no_existing_description,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRef {
    pub id: u64,
}

impl ActivityRef {
    pub fn url(&self, base: &str) -> String {
        format!("{base}{}", self.id)
    }
}

/// The only status the importer uses for "already has a description".
pub const CONFLICT_STATUS: u16 = 400;

/// How the importer answered a single update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Updated(ActivityRef),
    /// The matched activity already has a description and the request asked not to overwrite it.
    /// Always answered with `CONFLICT_STATUS`.
    AlreadyHasDescription { body: String },
    Rejected { status: u16, body: String },
}

/// Sorts a raw importer response into a `SubmitOutcome`.
///
/// # Errors
/// Returns `ClientError::InvalidResponse` if a success body has no numeric `id`.
pub fn classify_response(status: u16, body: String) -> Result<SubmitOutcome, ClientError> {
    if status == CONFLICT_STATUS && body.contains(ALREADY_HAS_DESCRIPTION_MARKER) {
        return Ok(SubmitOutcome::AlreadyHasDescription { body });
    }
    if status > 299 {
        return Ok(SubmitOutcome::Rejected { status, body });
    }
    match serde_json::from_str::<ActivityRef>(&body) {
        Ok(activity) => Ok(SubmitOutcome::Updated(activity)),
        Err(source) => Err(ClientError::InvalidResponse { body, source }),
    }
}

/// Anything that can update an activity description.
pub trait ActivityApi {
    fn update_activity_description(
        &self,
        request: &UpdateDescriptionRequest,
    ) -> Result<SubmitOutcome, ClientError>;
}

pub struct ImporterClient {
    http_client: Client,
    endpoint_url: String,
    api_secret: String,
}

impl ImporterClient {
    pub fn new(endpoint_url: String, api_secret: String) -> Result<Self, ClientError> {
        let http_client = Client::builder().build().map_err(ClientError::Build)?;
        Ok(Self {
            http_client,
            endpoint_url,
            api_secret,
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl ActivityApi for ImporterClient {
    /// Sends one POST to the importer. No retries.
    ///
    /// # Errors
    /// Returns `ClientError` if the request cannot be sent, the body cannot be read,
    /// or a success response is not the expected JSON.
    fn update_activity_description(
        &self,
        request: &UpdateDescriptionRequest,
    ) -> Result<SubmitOutcome, ClientError> {
        info!(
            "START request to {} (afterTs={}, beforeTs={}, doStopIfDescriptionNotNull={})",
            self.endpoint_url, request.after_ts, request.before_ts, request.do_stop_if_description_not_null
        );
        debug!("Request payload: {:?}", request);

        let response = self
            .http_client
            .post(&self.endpoint_url)
            .header(AUTHORIZATION, &self.api_secret)
            .json(request)
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        debug!("Response body: {}", body);

        let outcome = classify_response(status, body)?;
        match &outcome {
            SubmitOutcome::Updated(activity) => info!("END request: updated activity {}", activity.id),
            SubmitOutcome::AlreadyHasDescription { .. } => {
                warn!("END request: the activity found already has a description")
            }
            SubmitOutcome::Rejected { status, body } => {
                error!("END request: failed with status {}. Body: {}", status, body)
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Exercise, TimeWindow};
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    fn sample_log() -> SessionLog {
        SessionLog {
            date: NaiveDate::from_ymd_opt(2024, 2, 6).unwrap(),
            time_window: TimeWindow {
                day_start: 1_707_174_000,
                day_end: 1_707_260_399,
            },
            activity_name: "Weight training: legs".to_string(),
            description: "Squat: 5 reps x 3 sets\n".to_string(),
            exercises: vec![Exercise {
                name: "Squat".to_string(),
                target_reps: "5".to_string(),
                sets: 3,
            }],
        }
    }

    #[test]
    fn request_serializes_flag_as_string() {
        let strict = serde_json::to_value(UpdateDescriptionRequest::new(&sample_log(), true)).unwrap();
        assert_eq!(
            strict,
            json!({
                "afterTs": 1_707_174_000,
                "beforeTs": 1_707_260_399,
                "description": "Squat: 5 reps x 3 sets\n",
                "activityType": "WeightTraining",
                "name": "Weight training: legs",
                "doStopIfDescriptionNotNull": "true",
            })
        );

        let lenient = serde_json::to_value(UpdateDescriptionRequest::new(&sample_log(), false)).unwrap();
        assert_eq!(lenient["doStopIfDescriptionNotNull"], json!("false"));
    }

    #[test]
    fn classifies_responses() {
        assert_eq!(
            classify_response(200, r#"{"id": 10709853894, "name": "x"}"#.to_string()).unwrap(),
            SubmitOutcome::Updated(ActivityRef { id: 10_709_853_894 })
        );

        let conflict = r#"{"message": "The activity found already has a description: id=1 description=old"}"#;
        assert!(matches!(
            classify_response(400, conflict.to_string()).unwrap(),
            SubmitOutcome::AlreadyHasDescription { .. }
        ));
        // The marker alone is not enough on any other status
        assert_eq!(
            classify_response(409, conflict.to_string()).unwrap(),
            SubmitOutcome::Rejected {
                status: 409,
                body: conflict.to_string()
            }
        );

        assert_eq!(
            classify_response(400, "Posted body must include the key 'afterTs'".to_string()).unwrap(),
            SubmitOutcome::Rejected {
                status: 400,
                body: "Posted body must include the key 'afterTs'".to_string()
            }
        );

        // The marker only means a conflict on 400
        assert!(matches!(
            classify_response(500, conflict.to_string()).unwrap(),
            SubmitOutcome::Rejected { status: 500, .. }
        ));

        assert!(matches!(
            classify_response(200, "not json".to_string()),
            Err(ClientError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn posts_json_with_authorization_header() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/update-activity-description")
                .header("authorization", "s3cret")
                .header("content-type", "application/json")
                .json_body(json!({
                    "afterTs": 1_707_174_000,
                    "beforeTs": 1_707_260_399,
                    "description": "Squat: 5 reps x 3 sets\n",
                    "activityType": "WeightTraining",
                    "name": "Weight training: legs",
                    "doStopIfDescriptionNotNull": "true",
                }));
            then.status(200).json_body(json!({ "id": 42, "type": "WeightTraining" }));
        });

        let client = ImporterClient::new(server.url("/update-activity-description"), "s3cret".to_string()).unwrap();
        let outcome = client
            .update_activity_description(&UpdateDescriptionRequest::new(&sample_log(), true))
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Updated(ActivityRef { id: 42 }));
        m.assert();
    }

    #[test]
    fn maps_conflict_and_errors_from_server() {
        let server = MockServer::start();
        let conflict = server.mock(|when, then| {
            when.method(POST).path("/conflict");
            then.status(400)
                .body("The activity found already has a description: id=42 description=Old");
        });
        let missing = server.mock(|when, then| {
            when.method(POST).path("/missing");
            then.status(404).body("No activity found in the given time range");
        });

        let request = UpdateDescriptionRequest::new(&sample_log(), true);

        let client = ImporterClient::new(server.url("/conflict"), "k".to_string()).unwrap();
        match client.update_activity_description(&request).unwrap() {
            SubmitOutcome::AlreadyHasDescription { body } => assert!(body.contains("id=42")),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let client = ImporterClient::new(server.url("/missing"), "k".to_string()).unwrap();
        assert_eq!(
            client.update_activity_description(&request).unwrap(),
            SubmitOutcome::Rejected {
                status: 404,
                body: "No activity found in the given time range".to_string()
            }
        );

        conflict.assert();
        missing.assert();
    }
}
