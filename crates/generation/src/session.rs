use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use project::{AspectRatio, Project, ProjectError, ResultSource, Workspace};
use sse::{EventFramer, StreamFrame};

use crate::event::GenerationEvent;
use crate::transport::{HttpTransport, StreamTransport, TransportError};

/// What the UI shows when the stream dies without a terminal frame.
const CONNECTION_LOST: &str = "connection lost";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("not signed in")]
    Auth,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("could not reach the generation service: {0}")]
    Transport(String),
}

/// Request body for the streaming generation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub project_name: String,
    pub prompt: String,
    pub slide_context: String,
    pub slide_image: String,
    pub variant_count: u32,
    pub creativity: f32,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub variant_count: u32,
    pub creativity: f32,
    /// Provenance stamped on every appended result.
    pub source: ResultSource,
    /// Upper bound on each wait for the next chunk; `None` disables
    /// the bound and a silent backend can stall the session forever.
    pub stall_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            variant_count: 3,
            creativity: 0.5,
            source: ResultSource::Api,
            stall_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Validates the project and assembles the request body. Runs before
/// any network call so validation faults never open a transport.
pub fn build_request(
    project: &Project,
    options: &SessionOptions,
) -> Result<GenerationRequest, GenerationError> {
    let slide_image = project
        .slide_image
        .clone()
        .ok_or(GenerationError::Validation(
            "upload a slide image before generating",
        ))?;
    let selection = project.selection.ok_or(GenerationError::Validation(
        "draw a selection on the slide before generating",
    ))?;
    if !selection.meets_minimum() {
        return Err(GenerationError::Validation("the selection is too small"));
    }
    Ok(GenerationRequest {
        project_name: project.name.clone(),
        prompt: project.prompt.clone().unwrap_or_default(),
        slide_context: project.slide_context.clone().unwrap_or_default(),
        slide_image,
        variant_count: options.variant_count,
        creativity: options.creativity,
        aspect_ratio: selection.aspect_ratio(),
    })
}

/// Client for the generation endpoint. One instance per configured
/// base address; cheap to clone.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Starts a session: validates, gates on the project not already
    /// generating, marks it generating with `variant_count` pending
    /// slots, and opens the streaming transport. The returned session
    /// must be driven (or aborted) to completion.
    pub async fn start(
        &self,
        workspace: &mut Workspace,
        options: SessionOptions,
    ) -> Result<GenerationSession<HttpTransport>, GenerationError> {
        let request = build_request(workspace.project(), &options)?;
        let token = self.token.as_deref().ok_or(GenerationError::Auth)?;

        workspace.begin_generation(options.variant_count)?;

        let response = self
            .http
            .post(format!("{}/generate/stream", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await;
        let response = match response.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(err) => {
                workspace.fail_generation(CONNECTION_LOST);
                return Err(GenerationError::Transport(err.to_string()));
            }
        };

        Ok(GenerationSession::new(
            HttpTransport::new(response),
            options,
        ))
    }
}

enum FrameOutcome {
    Continue,
    Terminal,
}

/// Lifecycle of one generation request, from an opened transport to a
/// terminal `done`/`error` (or loss of the connection). The transport
/// is released on every exit path.
pub struct GenerationSession<T: StreamTransport> {
    transport: T,
    framer: EventFramer,
    source: ResultSource,
    stall_timeout: Option<Duration>,
}

impl<T: StreamTransport> GenerationSession<T> {
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self {
            transport,
            framer: EventFramer::new(),
            source: options.source,
            stall_timeout: options.stall_timeout,
        }
    }

    /// Consumes the stream, applying frames in arrival order until a
    /// terminal event or a transport fault. The project ends idle or
    /// error; never stuck generating.
    pub async fn drive(mut self, workspace: &mut Workspace) {
        loop {
            let chunk = match self.wait_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    debug!("stream closed without a terminal frame");
                    workspace.fail_generation(CONNECTION_LOST);
                    break;
                }
                Err(err) => {
                    warn!("generation transport fault: {err}");
                    workspace.fail_generation(CONNECTION_LOST);
                    break;
                }
            };

            let frames = self.framer.push(&chunk);
            if self.apply_frames(workspace, frames) {
                break;
            }
        }
        self.transport.cancel();
    }

    /// Explicit teardown mid-stream: releases the transport and puts
    /// the project back to idle.
    pub fn abort(mut self, workspace: &mut Workspace) {
        self.transport.cancel();
        workspace.complete_generation();
    }

    async fn wait_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.stall_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.transport.next_chunk()).await {
                Ok(chunk) => chunk.transpose(),
                Err(_) => Err(TransportError(format!(
                    "no frames for {}s, treating stream as dead",
                    limit.as_secs()
                ))),
            },
            None => self.transport.next_chunk().await.transpose(),
        }
    }

    /// Returns true once a terminal frame was applied; later frames in
    /// the same chunk are dropped.
    fn apply_frames(&self, workspace: &mut Workspace, frames: Vec<StreamFrame>) -> bool {
        for frame in frames {
            match handle_frame(workspace, &frame, self.source) {
                FrameOutcome::Continue => {}
                FrameOutcome::Terminal => return true,
            }
        }
        false
    }
}

fn handle_frame(
    workspace: &mut Workspace,
    frame: &StreamFrame,
    source: ResultSource,
) -> FrameOutcome {
    match GenerationEvent::decode(frame) {
        Ok(GenerationEvent::Result(payload)) => {
            workspace.push_result(payload.into_result(source));
            workspace.take_pending_slot();
            FrameOutcome::Continue
        }
        Ok(GenerationEvent::Error(payload)) => {
            workspace.fail_generation(payload.message);
            FrameOutcome::Terminal
        }
        Ok(GenerationEvent::Done) => {
            workspace.complete_generation();
            FrameOutcome::Terminal
        }
        Ok(GenerationEvent::Unknown) => FrameOutcome::Continue,
        Err(err) => {
            // A malformed result is dropped, not fatal; the promised
            // slot is still consumed so the placeholder count stays
            // honest.
            warn!("dropping undecodable '{}' frame: {err}", frame.event);
            workspace.take_pending_slot();
            FrameOutcome::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use project::{GenerationStatus, Selection, SelectionRatio};

    fn ready_project() -> Project {
        let mut project = Project::new("Deck");
        project.slide_image = Some("data:image/png;base64,AAAA".into());
        project.prompt = Some("a rocket".into());
        project.selection = Some(Selection {
            x: 10.0,
            y: 10.0,
            width: 320.0,
            height: 180.0,
            ratio: SelectionRatio::Custom,
        });
        project
    }

    fn result_frame(id: u32) -> String {
        format!(
            "event: result\ndata: {{\"id\":\"{id}\",\"image\":\"images/{id}.png\",\"description\":\"variant {id}\",\"created_at\":\"2025-06-01T10:00:00Z\"}}\n\n"
        )
    }

    fn session(transport: ScriptedTransport) -> GenerationSession<ScriptedTransport> {
        GenerationSession::new(transport, SessionOptions::default())
    }

    #[test]
    fn build_request_maps_selection_to_aspect_ratio() {
        let request = build_request(&ready_project(), &SessionOptions::default()).unwrap();
        assert_eq!(request.aspect_ratio, AspectRatio::Landscape16x9);
        assert_eq!(request.project_name, "Deck");
        assert_eq!(request.prompt, "a rocket");
        assert_eq!(request.variant_count, 3);
    }

    #[test]
    fn build_request_rejects_missing_slide_image() {
        let mut project = ready_project();
        project.slide_image = None;
        assert!(matches!(
            build_request(&project, &SessionOptions::default()),
            Err(GenerationError::Validation(_))
        ));
    }

    #[test]
    fn build_request_rejects_missing_or_undersized_selection() {
        let mut project = ready_project();
        project.selection = None;
        assert!(matches!(
            build_request(&project, &SessionOptions::default()),
            Err(GenerationError::Validation(_))
        ));

        let mut project = ready_project();
        if let Some(selection) = project.selection.as_mut() {
            selection.width = 5.0;
        }
        assert!(matches!(
            build_request(&project, &SessionOptions::default()),
            Err(GenerationError::Validation(_))
        ));
    }

    #[test]
    fn pending_slots_count_down_per_result_then_done_goes_idle() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(3).unwrap();
        let source = ResultSource::Api;

        let mut observed = vec![ws.project().pending_slots];
        for id in 1..=3 {
            let frames = sse::EventFramer::new().push(result_frame(id).as_bytes());
            assert!(matches!(
                handle_frame(&mut ws, &frames[0], source),
                FrameOutcome::Continue
            ));
            observed.push(ws.project().pending_slots);
        }
        let done = StreamFrame {
            event: "done".into(),
            data: String::new(),
        };
        assert!(matches!(
            handle_frame(&mut ws, &done, source),
            FrameOutcome::Terminal
        ));
        ws.complete_generation();
        observed.push(ws.project().pending_slots);

        assert_eq!(observed, vec![3, 2, 1, 0, 0]);
        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
        assert_eq!(ws.project().results.len(), 3);
    }

    #[tokio::test]
    async fn full_session_appends_results_and_finishes_idle() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(3).unwrap();

        let chunks: Vec<String> = vec![
            result_frame(1),
            result_frame(2),
            result_frame(3),
            "event: done\ndata: \n\n".into(),
        ];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        let transport = ScriptedTransport::new(&refs);
        let released = transport.cancel_flag();
        session(transport).drive(&mut ws).await;

        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
        assert_eq!(ws.project().pending_slots, 0);
        assert_eq!(ws.project().results.len(), 3);
        let ids: Vec<&str> = ws.project().results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn error_frame_terminates_and_later_frames_are_not_processed() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(3).unwrap();

        let chunks: Vec<String> = vec![
            "event: error\ndata: {\"message\":\"timeout\"}\n\n".into(),
            result_frame(9),
        ];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        let transport = ScriptedTransport::new(&refs);
        let released = transport.cancel_flag();
        session(transport).drive(&mut ws).await;

        assert_eq!(ws.project().generation_status, GenerationStatus::Error);
        assert_eq!(ws.project().generation_error.as_deref(), Some("timeout"));
        assert_eq!(ws.project().pending_slots, 0);
        assert!(ws.project().results.is_empty());
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn terminal_frame_mid_chunk_drops_the_rest_of_the_chunk() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(2).unwrap();

        let chunk = format!(
            "event: error\ndata: {{\"message\":\"quota\"}}\n\n{}",
            result_frame(5)
        );
        session(ScriptedTransport::new(&[&chunk])).drive(&mut ws).await;

        assert!(ws.project().results.is_empty());
        assert_eq!(ws.project().generation_error.as_deref(), Some("quota"));
    }

    #[tokio::test]
    async fn stream_closing_without_terminal_frame_is_connection_lost() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(2).unwrap();

        let chunks: Vec<String> = vec![result_frame(1)];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        session(ScriptedTransport::new(&refs)).drive(&mut ws).await;

        assert_eq!(ws.project().generation_status, GenerationStatus::Error);
        assert_eq!(
            ws.project().generation_error.as_deref(),
            Some("connection lost")
        );
        assert_eq!(ws.project().pending_slots, 0);
        assert_eq!(ws.project().results.len(), 1);
    }

    #[tokio::test]
    async fn transport_fault_normalizes_to_connection_lost() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(2).unwrap();

        let transport = ScriptedTransport::new(&[]).with_fault("tls reset");
        session(transport).drive(&mut ws).await;

        assert_eq!(
            ws.project().generation_error.as_deref(),
            Some("connection lost")
        );
    }

    #[tokio::test]
    async fn malformed_result_is_skipped_but_consumes_its_slot() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(2).unwrap();

        let chunks: Vec<String> = vec![
            "event: result\ndata: {broken\n\n".into(),
            result_frame(2),
            "event: done\ndata: \n\n".into(),
        ];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        session(ScriptedTransport::new(&refs)).drive(&mut ws).await;

        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
        assert_eq!(ws.project().results.len(), 1);
        assert_eq!(ws.project().results[0].id, "2");
        assert_eq!(ws.project().pending_slots, 0);
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(1).unwrap();

        let chunks: Vec<String> = vec![
            "event: heartbeat\ndata: {}\n\n".into(),
            result_frame(1),
            "event: done\ndata: \n\n".into(),
        ];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        session(ScriptedTransport::new(&refs)).drive(&mut ws).await;

        assert_eq!(ws.project().results.len(), 1);
        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
    }

    #[tokio::test]
    async fn stall_timeout_fails_the_session() {
        struct SilentTransport;
        #[async_trait::async_trait]
        impl StreamTransport for SilentTransport {
            async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
                futures_util::future::pending().await
            }
            fn cancel(&mut self) {}
        }

        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(1).unwrap();

        let options = SessionOptions {
            stall_timeout: Some(Duration::from_millis(10)),
            ..SessionOptions::default()
        };
        GenerationSession::new(SilentTransport, options)
            .drive(&mut ws)
            .await;

        assert_eq!(ws.project().generation_status, GenerationStatus::Error);
        assert_eq!(
            ws.project().generation_error.as_deref(),
            Some("connection lost")
        );
    }

    #[tokio::test]
    async fn abort_releases_transport_and_goes_idle() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(2).unwrap();

        let chunks: Vec<String> = vec![result_frame(1), result_frame(2)];
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        let transport = ScriptedTransport::new(&refs);
        let released = transport.cancel_flag();
        session(transport).abort(&mut ws);

        assert_eq!(ws.project().generation_status, GenerationStatus::Idle);
        assert_eq!(ws.project().pending_slots, 0);
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn results_evict_past_twelve_during_one_session() {
        let mut ws = Workspace::detached(ready_project());
        ws.begin_generation(15).unwrap();

        let mut chunks: Vec<String> = (1..=15).map(result_frame).collect();
        chunks.push("event: done\ndata: \n\n".into());
        let refs: Vec<&str> = chunks.iter().map(|c| c.as_str()).collect();
        session(ScriptedTransport::new(&refs)).drive(&mut ws).await;

        assert_eq!(ws.project().results.len(), project::MAX_RESULTS);
        assert_eq!(ws.project().results.first().unwrap().id, "4");
        assert_eq!(ws.project().results.last().unwrap().id, "15");
    }
}
