use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// --- Declare modules ---
mod config;
pub mod importer_client;
pub mod presenter;
pub mod session;
pub mod sheet;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, Error as ConfigError, StandardColor, Theme,
    API_SECRET_ENV_VAR,
};
pub use importer_client::{
    classify_response, ActivityApi, ActivityRef, ClientError, ImporterClient, SubmitOutcome,
    UpdateDescriptionRequest, CONFLICT_STATUS,
};
pub use presenter::{Presenter, TerminalPresenter};
pub use session::{CellValue, Exercise, SessionLog, SessionRange, TimeWindow, ValidationError};
pub use sheet::{A1Range, Sheet, SheetError};

const OVERWRITE_QUESTION: &str = "Found an activity with a description already. Overwrite?";
const OPENING_MESSAGE: &str = "Opening Strava...";

/// Where one run of the update flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Updated(ActivityRef),
    /// The activity already had a description and the user chose to keep it.
    Declined,
    Invalid(ValidationError),
    Rejected { status: u16, body: String },
}

impl SubmissionOutcome {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Invalid(_) | Self::Rejected { .. })
    }
}

fn rejection_message(status: u16, body: &str) -> String {
    format!("** Error response from strava-importer-api! **\n\nStatus code: {status}\nBody: {body}")
}

/// Validates the selected range and pushes it to the importer, asking before
/// overwriting an existing description.
///
/// The first request refuses to overwrite. If the importer reports a description
/// already there and the user agrees, exactly one more request is sent that does.
///
/// # Errors
/// Returns an error if the presenter fails or the request cannot complete
/// (transport failure, malformed success body).
pub fn run_update_flow<A, P, Tz>(
    api: &A,
    presenter: &mut P,
    range: &SessionRange,
    tz: &Tz,
    activity_url_base: &str,
) -> Result<SubmissionOutcome>
where
    A: ActivityApi + ?Sized,
    P: Presenter + ?Sized,
    Tz: TimeZone,
{
    let log = match SessionLog::extract(range, tz) {
        Ok(log) => log,
        Err(e) => {
            warn!("Invalid session log: {}", e);
            presenter.show_message(&e.to_string())?;
            return Ok(SubmissionOutcome::Invalid(e));
        }
    };
    presenter.show_message(&log.summary())?;

    let strict = UpdateDescriptionRequest::new(&log, true);
    let outcome = api
        .update_activity_description(&strict)
        .context("Failed to update the Strava activity description")?;

    let final_outcome = match outcome {
        SubmitOutcome::AlreadyHasDescription { .. } => {
            if !presenter.ask_yes_no(OVERWRITE_QUESTION)? {
                info!("Keeping the existing description");
                return Ok(SubmissionOutcome::Declined);
            }
            info!("Overwriting the existing description");
            let lenient = UpdateDescriptionRequest::new(&log, false);
            api.update_activity_description(&lenient)
                .context("Failed to overwrite the Strava activity description")?
        }
        other => other,
    };

    match final_outcome {
        SubmitOutcome::Updated(activity) => {
            presenter.open_link(&activity.url(activity_url_base), OPENING_MESSAGE)?;
            Ok(SubmissionOutcome::Updated(activity))
        }
        // A second conflict is not retried.
        SubmitOutcome::AlreadyHasDescription { body } => {
            presenter.show_message(&rejection_message(CONFLICT_STATUS, &body))?;
            Ok(SubmissionOutcome::Rejected {
                status: CONFLICT_STATUS,
                body,
            })
        }
        SubmitOutcome::Rejected { status, body } => {
            presenter.show_message(&rejection_message(status, &body))?;
            Ok(SubmissionOutcome::Rejected { status, body })
        }
    }
}

pub struct AppService {
    pub config: Config,
    pub config_path: PathBuf,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if the config path cannot be determined or the config cannot be loaded.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reads the sheet at `path` and selects `range`, or the trailing session block if none is given.
    /// # Errors
    /// - `SheetError` if the file or the A1 notation is invalid.
    /// - `ValidationError::InvalidHeight` / `InvalidWidth` if `range` cannot hold a session log;
    ///   no cells are copied in that case.
    pub fn load_session_range(&self, path: &Path, range: Option<&str>) -> Result<SessionRange> {
        let requested = range.map(A1Range::parse).transpose()?;
        if let Some(a1) = &requested {
            session::check_shape(a1.height(), a1.width())?;
        }
        let sheet = Sheet::from_path(path, &self.config.date_formats)
            .with_context(|| format!("Failed to read sheet {path:?}"))?;
        let selection = match requested {
            Some(a1) => sheet.select(&a1),
            None => sheet.trailing_block(session::SESSION_HEIGHT),
        };
        Ok(selection)
    }

    /// Extracts the session log in the local timezone, without sending anything.
    /// # Errors
    /// Returns `ValidationError` if the range is not a valid session log.
    pub fn preview(&self, range: &SessionRange) -> Result<SessionLog, ValidationError> {
        SessionLog::extract(range, &Local)
    }

    /// Builds the importer client from the configured endpoint and secret.
    /// # Errors
    /// - `ConfigError::ApiSecretNotSet` if no secret is configured.
    /// - `ClientError` if the HTTP client cannot be built.
    pub fn importer_client(&self) -> Result<ImporterClient> {
        self.importer_client_with(self.config.resolve_api_secret())
    }

    fn importer_client_with(&self, secret: Option<String>) -> Result<ImporterClient> {
        let secret =
            secret.ok_or_else(|| ConfigError::ApiSecretNotSet(self.config_path.clone()))?;
        Ok(ImporterClient::new(self.config.endpoint_url.clone(), secret)?)
    }

    /// Runs the update flow against the configured importer, in the local timezone.
    /// # Errors
    /// See `run_update_flow` and `importer_client`.
    pub fn update_strava_description<P: Presenter + ?Sized>(
        &self,
        range: &SessionRange,
        presenter: &mut P,
    ) -> Result<SubmissionOutcome> {
        let client = self.importer_client()?;
        run_update_flow(
            &client,
            presenter,
            range,
            &Local,
            &self.config.activity_url_base,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_without_secret(dir: &Path) -> AppService {
        AppService {
            config: Config::default(),
            config_path: dir.join("config.toml"),
        }
    }

    #[test]
    fn missing_secret_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_without_secret(dir.path());

        // No environment value and nothing configured
        let secret = config::resolve_api_secret_with(None, service.config.api_secret.as_deref());
        let err = service.importer_client_with(secret).err().unwrap();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::ApiSecretNotSet(path)) => assert_eq!(path, &service.config_path),
            other => panic!("expected ApiSecretNotSet, got {other:?}"),
        }

        // A blank environment value does not count either
        let secret = config::resolve_api_secret_with(Some("   ".to_string()), None);
        assert!(service.importer_client_with(secret).is_err());
    }

    #[test]
    fn configured_secret_builds_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service_without_secret(dir.path());
        service.config.api_secret = Some("from-config".to_string());
        service.config.endpoint_url = "http://localhost:1/update".to_string();

        let secret = config::resolve_api_secret_with(None, service.config.api_secret.as_deref());
        let client = service.importer_client_with(secret).unwrap();
        assert_eq!(client.endpoint_url(), "http://localhost:1/update");
    }
}
