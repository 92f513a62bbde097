use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use client_core::{
    load_settings, CaptureDevice, ControllerOptions, DebouncedPreferenceWriter, DeniedDevice,
    HttpInterviewBackend, InterviewBackend, MountOutcome, PreferenceStore, SessionBootstrap,
    SessionController, SessionMarkers, SurfaceKind, TranscriptionAdapter, WavFileDevice,
};
use shared::domain::{SetupInput, SetupPreferences};
use storage::{prepare_database_url, MemoryKvStore, SqliteKvStore};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines},
    task::JoinHandle,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Surface {
    Panel,
    Focus,
}

impl From<Surface> for SurfaceKind {
    fn from(value: Surface) -> Self {
        match value {
            Surface::Panel => SurfaceKind::Panel,
            Surface::Focus => SurfaceKind::Focus,
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long, value_enum, default_value_t = Surface::Panel)]
    surface: Surface,
    /// WAV clip served as the microphone recording.
    #[arg(long)]
    audio_clip: Option<PathBuf>,
    #[arg(long)]
    context: Option<String>,
    #[arg(long)]
    background: Option<String>,
    #[arg(long)]
    goals: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = &args.backend_url {
        settings.backend_url = url.clone();
    }
    if let Some(url) = &args.database_url {
        settings.database_url = url.clone();
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let durable = SqliteKvStore::new(&database_url).await.map_err(|error| {
        error!(%database_url, "failed to open preference database: {error:#}");
        error
    })?;
    durable
        .health_check()
        .await
        .context("preference database is not usable")?;
    let preferences = PreferenceStore::new(Arc::new(durable));
    let markers = SessionMarkers::new(Arc::new(MemoryKvStore::new()));
    let http = HttpInterviewBackend::with_timeout(&settings.backend_url, settings.request_timeout)
        .context("invalid backend url")?;
    info!(backend_url = http.server_url(), "terminal: using interview backend");
    let backend: Arc<dyn InterviewBackend> = Arc::new(http);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let input = collect_setup(&args, &preferences, &settings, &mut lines).await?;

    let first = SessionBootstrap::new(backend.clone(), markers.clone())
        .with_preferences(preferences)
        .with_payload_style(settings.initialize_payload)
        .start(&input)
        .await
        .context("could not start the interview")?;
    info!(session_id = %first.session_id, "terminal: interview started");

    let transcription = settings.voice_input_enabled.then(|| {
        let device: Arc<dyn CaptureDevice> = match &args.audio_clip {
            Some(path) => Arc::new(WavFileDevice::new(path)),
            None => Arc::new(DeniedDevice::new("no capture device; pass --audio-clip")),
        };
        TranscriptionAdapter::new(device, backend.clone())
    });
    let controller = SessionController::new(
        backend,
        transcription,
        ControllerOptions {
            auto_send_transcription: settings.auto_send_transcription,
        },
    );

    let renderer = spawn_renderer(&controller, args.surface.into());
    if controller.mount(&markers).await == MountOutcome::RedirectToSetup {
        renderer.abort();
        bail!("session flag missing after bootstrap");
    }
    println!("(type an answer, /record, /stop, /send, /retry, /show or /quit)");

    run_input_loop(&controller, args.surface.into(), &mut lines).await?;

    controller.unmount();
    renderer.abort();
    Ok(())
}

/// Fills missing setup fields from saved preferences, then prompts for anything still required.
async fn collect_setup<R>(
    args: &Args,
    preferences: &PreferenceStore,
    settings: &client_core::Settings,
    lines: &mut Lines<R>,
) -> Result<SetupInput>
where
    R: AsyncBufRead + Unpin,
{
    let saved = preferences.load().await;
    let mut fields = SetupPreferences {
        context: args.context.clone().unwrap_or(saved.context),
        background: args.background.clone().unwrap_or(saved.background),
        goals: args.goals.clone().unwrap_or(saved.goals),
        last_updated: None,
    };
    if !fields.context.trim().is_empty() && !fields.goals.trim().is_empty() {
        return Ok(SetupInput::from(&fields));
    }

    let writer = DebouncedPreferenceWriter::spawn(preferences.clone(), settings.preference_debounce);
    let prompted = prompt_missing_fields(&mut fields, &writer, lines).await;
    writer.close().await;
    prompted?;
    Ok(SetupInput::from(&fields))
}

fn field_mut<'a>(fields: &'a mut SetupPreferences, name: &str) -> &'a mut String {
    match name {
        "context" => &mut fields.context,
        "background" => &mut fields.background,
        _ => &mut fields.goals,
    }
}

/// Each answered field is handed to the debounced writer as soon as it is typed.
async fn prompt_missing_fields<R>(
    fields: &mut SetupPreferences,
    writer: &DebouncedPreferenceWriter,
    lines: &mut Lines<R>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    for name in ["context", "background", "goals"] {
        if !field_mut(fields, name).trim().is_empty() {
            continue;
        }
        println!("{name}>");
        let Some(line) = lines.next_line().await? else {
            bail!("stdin closed during setup");
        };
        *field_mut(fields, name) = line.trim().to_string();
        writer.record(fields.clone());
    }
    Ok(())
}

fn spawn_renderer(controller: &Arc<SessionController>, kind: SurfaceKind) -> JoinHandle<()> {
    let mut events = controller.subscribe();
    let recording = controller.subscribe_recording();
    tokio::spawn(async move {
        let recording_task = recording.map(|mut rx| {
            tokio::spawn(async move {
                while let Ok(state) = rx.recv().await {
                    if let Some(line) = render::recording_line(state) {
                        println!("{line}");
                    }
                }
            })
        });
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render::event_line(kind, &event) {
                        println!("{line}");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "terminal: renderer fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        if let Some(task) = recording_task {
            task.abort();
        }
    })
}

async fn run_input_loop<R>(
    controller: &Arc<SessionController>,
    kind: SurfaceKind,
    lines: &mut Lines<R>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/show" => {
                let snapshot = controller.snapshot().await;
                for line in render::screen(kind, &snapshot.transcript) {
                    println!("{line}");
                }
                if !snapshot.draft.is_empty() {
                    println!("draft: {}", snapshot.draft);
                }
            }
            "/record" => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(err) = controller.start_recording().await {
                        if !err.kind().is_silent() {
                            println!("(cannot record: {err})");
                        }
                    }
                });
            }
            "/stop" => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    match controller.stop_recording().await {
                        Ok(outcome) => {
                            if let Some(line) = render::voice_line(&outcome) {
                                println!("{line}");
                            }
                        }
                        Err(err) => info!("terminal: stop ignored: {err}"),
                    }
                });
            }
            "/retry" => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Some(line) = render::submit_line(controller.retry_last_failed().await) {
                        println!("{line}");
                    }
                });
            }
            "/send" => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Some(line) = render::submit_line(controller.submit_draft().await) {
                        println!("{line}");
                    }
                });
            }
            text => {
                let controller = controller.clone();
                let text = text.to_string();
                tokio::spawn(async move {
                    if let Some(line) = render::submit_line(controller.submit(&text).await) {
                        println!("{line}");
                    }
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use client_core::{
        capture::ActiveCapture,
        error::{BackendError, DeviceError},
        ControllerPhase,
    };
    use shared::protocol::InitializeInterviewRequest;
    use storage::KeyValueStore;

    struct EchoBackend;

    #[async_trait]
    impl InterviewBackend for EchoBackend {
        async fn initialize_interview(
            &self,
            _request: &InitializeInterviewRequest,
        ) -> std::result::Result<String, BackendError> {
            Ok("Welcome".to_string())
        }

        async fn chat(&self, message: &str) -> std::result::Result<String, BackendError> {
            Ok(format!("reply: {message}"))
        }

        async fn transcribe(
            &self,
            _wav: Vec<u8>,
        ) -> std::result::Result<Option<String>, BackendError> {
            Ok(None)
        }
    }

    /// A permission prompt nobody answers.
    struct UnansweredPrompt;

    #[async_trait]
    impl CaptureDevice for UnansweredPrompt {
        async fn arm(&self) -> std::result::Result<Box<dyn ActiveCapture>, DeviceError> {
            std::future::pending().await
        }
    }

    fn bare_args() -> Args {
        Args::parse_from(["terminal"])
    }

    fn quick_settings() -> client_core::Settings {
        client_core::Settings {
            preference_debounce: Duration::from_millis(10),
            ..client_core::Settings::default()
        }
    }

    #[tokio::test]
    async fn record_command_does_not_block_typed_answers() {
        let backend: Arc<dyn InterviewBackend> = Arc::new(EchoBackend);
        let adapter = TranscriptionAdapter::new(Arc::new(UnansweredPrompt), backend.clone());
        let controller = SessionController::new(backend, Some(adapter), ControllerOptions::default());
        let markers = SessionMarkers::new(Arc::new(MemoryKvStore::new()));
        markers.begin("Welcome").await.expect("begin");
        controller.mount(&markers).await;
        let mut lines = BufReader::new(&b"/record\nmy answer\n/quit\n"[..]).lines();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_input_loop(&controller, SurfaceKind::Panel, &mut lines),
        )
        .await
        .expect("input loop finished")
        .expect("input loop");

        let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = controller.snapshot().await;
                if snapshot.transcript.len() == 3 && snapshot.phase == ControllerPhase::Ready {
                    break snapshot;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("typed answer delivered while the prompt is open");

        assert_eq!(snapshot.transcript[2].text, "reply: my answer");
        assert_eq!(
            snapshot.recording,
            Some(client_core::RecordingState::RequestingDevice)
        );
    }

    #[tokio::test]
    async fn prompted_fields_are_saved_before_setup_finishes() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
        let preferences = PreferenceStore::new(store);
        let mut lines = BufReader::new(&b"ethics panel\n"[..]).lines();

        let err = collect_setup(&bare_args(), &preferences, &quick_settings(), &mut lines)
            .await
            .expect_err("stdin closes before goals");

        assert!(err.to_string().contains("stdin closed"));
        let saved = preferences.load().await;
        assert_eq!(saved.context, "ethics panel");
        assert_eq!(saved.goals, "");
    }

    #[tokio::test]
    async fn prompts_only_for_missing_fields() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
        let preferences = PreferenceStore::new(store);
        let args = Args::parse_from(["terminal", "--context", "ethics panel"]);
        let mut lines = BufReader::new(&b"prior survey\ndecide policy\n"[..]).lines();

        let input = collect_setup(&args, &preferences, &quick_settings(), &mut lines)
            .await
            .expect("setup");

        assert_eq!(
            input,
            SetupInput::new("ethics panel", "prior survey", "decide policy")
        );
        assert_eq!(preferences.load().await.goals, "decide policy");
    }
}
