//! Line protocol between the parent and a worker process.
//!
//! The parent writes one JSON [`AnalysisRequest`] to the worker's stdin and
//! closes it. The worker writes exactly one line starting with
//! [`REPLY_MARKER`] to stdout; any other stdout line is ignored, and logs go
//! to stderr.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::pipeline::analyze_video_use_case::PalsyReport;
use crate::pipeline::pipeline_executor::{AnalysisRequest, PipelineExecutor};
use crate::shared::error::{FailureReport, PalsyError};

pub const REPLY_MARKER: &str = "@@palsy-reply ";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Ok { report: PalsyReport },
    Failed { failure: FailureReport },
}

impl WorkerReply {
    pub fn from_result(result: &Result<PalsyReport, PalsyError>) -> Self {
        match result {
            Ok(report) => WorkerReply::Ok {
                report: report.clone(),
            },
            Err(e) => WorkerReply::Failed {
                failure: FailureReport::from(e),
            },
        }
    }

    pub fn into_result(self) -> Result<PalsyReport, PalsyError> {
        match self {
            WorkerReply::Ok { report } => Ok(report),
            WorkerReply::Failed { failure } => Err(PalsyError::from(failure)),
        }
    }

    /// The marker-prefixed line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{REPLY_MARKER}{}", serde_json::to_string(self)?))
    }
}

/// `None` for ordinary output lines, otherwise the decoded reply.
pub fn parse_reply_line(line: &str) -> Option<Result<WorkerReply, serde_json::Error>> {
    line.strip_prefix(REPLY_MARKER)
        .map(|json| serde_json::from_str(json.trim_end()))
}

/// Worker side: reads one request from `input`, runs it, writes the reply.
///
/// Pipeline failures are replies, not errors; only I/O on the reply channel
/// itself fails this function.
pub fn serve<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    executor: &dyn PipelineExecutor,
) -> io::Result<()> {
    let mut payload = String::new();
    input.read_to_string(&mut payload)?;

    let result = match serde_json::from_str::<AnalysisRequest>(&payload) {
        Ok(request) => {
            log::debug!("Worker analyzing {}", request.video.display());
            executor.execute(&request)
        }
        Err(e) => Err(PalsyError::WorkerProtocol(format!("malformed request: {e}"))),
    };

    let line = WorkerReply::from_result(&result)
        .to_line()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(output, "{line}")?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::settings::Settings;
    use std::path::PathBuf;

    struct EchoExecutor;

    impl PipelineExecutor for EchoExecutor {
        fn execute(&self, request: &AnalysisRequest) -> Result<PalsyReport, PalsyError> {
            if request.video.ends_with("bad.mp4") {
                return Err(PalsyError::VideoOpen {
                    path: request.video.clone(),
                    reason: "no such file".into(),
                });
            }
            Ok(PalsyReport {
                video: request.video.display().to_string(),
                probability: 0.25,
                label: 0,
            })
        }
    }

    fn request(video: &str) -> String {
        serde_json::to_string(&AnalysisRequest {
            video: PathBuf::from(video),
            artefact: PathBuf::from("xgb_stroke.json"),
            settings: Settings::default(),
        })
        .unwrap()
    }

    fn served(input: &str) -> String {
        let mut out = Vec::new();
        serve(input.as_bytes(), &mut out, &EchoExecutor).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_success_reply() {
        let out = served(&request("a.mp4"));
        assert!(out.ends_with('\n'));
        let reply = parse_reply_line(out.trim_end()).unwrap().unwrap();
        let report = reply.into_result().unwrap();
        assert_eq!(report.video, "a.mp4");
        assert_eq!(report.probability, 0.25);
    }

    #[test]
    fn test_failure_is_rebuilt_into_same_variant() {
        let out = served(&request("bad.mp4"));
        let err = parse_reply_line(out.trim_end())
            .unwrap()
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(
            err,
            PalsyError::VideoOpen {
                path: PathBuf::from("bad.mp4"),
                reason: "no such file".into(),
            }
        );
    }

    #[test]
    fn test_malformed_request_gets_protocol_reply() {
        let out = served("{not json");
        let err = parse_reply_line(out.trim_end())
            .unwrap()
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, PalsyError::WorkerProtocol(_)));
    }

    #[test]
    fn test_request_settings_default_when_absent() {
        let parsed: AnalysisRequest =
            serde_json::from_str(r#"{"video": "v.mp4", "artefact": "m.json"}"#).unwrap();
        assert_eq!(parsed.settings, Settings::default());
    }

    #[test]
    fn test_ordinary_lines_are_not_replies() {
        assert!(parse_reply_line("Loading model...").is_none());
        assert!(parse_reply_line(&format!("{REPLY_MARKER}{{oops")).unwrap().is_err());
    }
}
