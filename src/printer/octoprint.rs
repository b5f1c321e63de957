//! OctoPrint REST client.
//!
//! Uses the job and printer endpoints of the OctoPrint API:
//! - `GET /api/printer` for state flags
//! - `POST /api/job` for pause, resume and cancel
//! - `POST /api/printer/command` for raw G-code

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{JobPhase, PrinterControl, PrinterState};
use crate::core::{ButtonsError, ButtonsResult, OctoPrintConfig};

/// State flags reported by `GET /api/printer`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StateFlags {
    pub paused: bool,
    pub printing: bool,
    pub ready: bool,
    pub pausing: bool,
    pub resuming: bool,
    pub finishing: bool,
    pub cancelling: bool,
}

#[derive(Debug, Deserialize)]
struct PrinterStateBody {
    flags: StateFlags,
}

#[derive(Debug, Deserialize)]
struct PrinterResponse {
    state: PrinterStateBody,
}

/// Body of `POST /api/job`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct JobCommand {
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
}

impl JobCommand {
    pub(crate) const TOGGLE_PAUSE: Self = Self { command: "pause", action: Some("toggle") };
    pub(crate) const RESUME: Self = Self { command: "pause", action: Some("resume") };
    pub(crate) const CANCEL: Self = Self { command: "cancel", action: None };
}

/// Body of `POST /api/printer/command`.
#[derive(Debug, Serialize)]
struct GcodeCommand<'a> {
    commands: [&'a str; 1],
}

impl StateFlags {
    pub(crate) fn to_state(&self) -> PrinterState {
        if self.paused {
            PrinterState::Paused
        } else if self.printing {
            PrinterState::Printing
        } else if self.ready {
            PrinterState::Ready
        } else {
            PrinterState::Unknown
        }
    }

    pub(crate) fn to_phase(&self) -> JobPhase {
        if self.cancelling {
            JobPhase::Cancelling
        } else if self.paused || self.printing || self.pausing || self.resuming || self.finishing {
            JobPhase::Running
        } else if self.ready {
            JobPhase::Idle
        } else {
            JobPhase::Unknown
        }
    }
}

/// Blocking client for one OctoPrint instance.
pub struct OctoPrintClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OctoPrintClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctoPrintClient").field("base_url", &self.base_url).finish()
    }
}

impl OctoPrintClient {
    /// Create a client for the configured instance.
    pub fn new(config: &OctoPrintConfig) -> ButtonsResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(format!("printbuttons/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ButtonsResult<()> {
        let response =
            self.client.post(self.url(path)).header("X-Api-Key", &self.api_key).json(body).send()?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            Err(ButtonsError::Printer { status, message })
        }
    }

    fn fetch_flags(&self) -> ButtonsResult<StateFlags> {
        let response = self
            .client
            .get(self.url("/api/printer"))
            .query(&[("exclude", "temperature,sd")])
            .header("X-Api-Key", &self.api_key)
            .send()?;

        // 409: printer is not operational
        if response.status().as_u16() == 409 {
            return Ok(StateFlags::default());
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ButtonsError::Printer { status, message });
        }

        let body: PrinterResponse = response.json()?;
        Ok(body.state.flags)
    }
}

impl PrinterControl for OctoPrintClient {
    fn state(&self) -> PrinterState {
        match self.fetch_flags() {
            Ok(flags) => flags.to_state(),
            Err(e) => {
                tracing::warn!("Could not read printer state: {}", e);
                PrinterState::Unknown
            }
        }
    }

    fn job_phase(&self) -> JobPhase {
        match self.fetch_flags() {
            Ok(flags) => flags.to_phase(),
            Err(e) => {
                tracing::warn!("Could not read printer state: {}", e);
                JobPhase::Unknown
            }
        }
    }

    fn toggle_pause(&self) -> ButtonsResult<()> {
        self.post("/api/job", &JobCommand::TOGGLE_PAUSE)
    }

    fn resume(&self) -> ButtonsResult<()> {
        self.post("/api/job", &JobCommand::RESUME)
    }

    fn cancel(&self) -> ButtonsResult<()> {
        self.post("/api/job", &JobCommand::CANCEL)
    }

    fn send_command(&self, gcode: &str) -> ButtonsResult<()> {
        self.post("/api/printer/command", &GcodeCommand { commands: [gcode] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_to_state() {
        let printing = StateFlags { printing: true, ..Default::default() };
        assert_eq!(printing.to_state(), PrinterState::Printing);

        // OctoPrint keeps `printing` false while paused, but be strict anyway.
        let paused = StateFlags { paused: true, printing: true, ..Default::default() };
        assert_eq!(paused.to_state(), PrinterState::Paused);

        let ready = StateFlags { ready: true, ..Default::default() };
        assert_eq!(ready.to_state(), PrinterState::Ready);

        assert_eq!(StateFlags::default().to_state(), PrinterState::Unknown);

        let pausing = StateFlags { pausing: true, ..Default::default() };
        assert_eq!(pausing.to_state(), PrinterState::Unknown);
    }

    #[test]
    fn test_flags_to_phase() {
        for flags in [
            StateFlags { printing: true, ..Default::default() },
            StateFlags { paused: true, ..Default::default() },
            StateFlags { pausing: true, ..Default::default() },
            StateFlags { resuming: true, ..Default::default() },
            StateFlags { finishing: true, ..Default::default() },
        ] {
            assert_eq!(flags.to_phase(), JobPhase::Running, "{flags:?}");
        }

        let cancelling = StateFlags { cancelling: true, printing: true, ..Default::default() };
        assert_eq!(cancelling.to_phase(), JobPhase::Cancelling);

        let ready = StateFlags { ready: true, ..Default::default() };
        assert_eq!(ready.to_phase(), JobPhase::Idle);

        assert_eq!(StateFlags::default().to_phase(), JobPhase::Unknown);
    }

    #[test]
    fn test_parse_pausing_response() {
        let json = r#"{
            "state": {
                "text": "Pausing",
                "flags": {
                    "operational": true,
                    "paused": false,
                    "printing": false,
                    "cancelling": false,
                    "pausing": true,
                    "resuming": false,
                    "finishing": false,
                    "error": false,
                    "ready": false,
                    "closedOrError": false
                }
            }
        }"#;

        let body: PrinterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.state.flags.to_state(), PrinterState::Unknown);
        assert_eq!(body.state.flags.to_phase(), JobPhase::Running);
    }

    #[test]
    fn test_parse_printer_response() {
        let json = r#"{
            "state": {
                "text": "Printing",
                "flags": {
                    "operational": true,
                    "paused": false,
                    "printing": true,
                    "cancelling": false,
                    "pausing": false,
                    "sdReady": true,
                    "error": false,
                    "ready": false,
                    "closedOrError": false
                }
            }
        }"#;

        let body: PrinterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.state.flags.to_state(), PrinterState::Printing);
    }

    #[test]
    fn test_job_command_bodies() {
        assert_eq!(
            serde_json::to_string(&JobCommand::TOGGLE_PAUSE).unwrap(),
            r#"{"command":"pause","action":"toggle"}"#
        );
        assert_eq!(
            serde_json::to_string(&JobCommand::RESUME).unwrap(),
            r#"{"command":"pause","action":"resume"}"#
        );
        assert_eq!(serde_json::to_string(&JobCommand::CANCEL).unwrap(), r#"{"command":"cancel"}"#);
    }

    #[test]
    fn test_gcode_command_body() {
        let body = GcodeCommand { commands: ["M117 Emergency Stop"] };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"commands":["M117 Emergency Stop"]}"#);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config =
            OctoPrintConfig { url: "http://octopi.local/".to_string(), ..Default::default() };
        let client = OctoPrintClient::new(&config).unwrap();
        assert_eq!(client.url("/api/job"), "http://octopi.local/api/job");
    }

    #[test]
    fn test_unreachable_host_reports_unknown() {
        let config = OctoPrintConfig { url: "http://127.0.0.1:1".to_string(), ..Default::default() };
        let client = OctoPrintClient::new(&config).unwrap();
        assert_eq!(client.state(), PrinterState::Unknown);
        assert_eq!(client.job_phase(), JobPhase::Unknown);
        assert!(client.cancel().is_err());
    }
}
