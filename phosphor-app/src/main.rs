//! Phosphor - terminal audio player with a phosphor-trail visualizer

mod config;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Terminal,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use phosphor_analysis::{tap_pair, AnalysisTap, TapConfig};
use phosphor_audio::{AudioEngine, AudioEvent, PlaybackState, TransportStatus};
use phosphor_render::{Surface, Visualizer, BACKDROP, WAVEFORM};

use crate::config::Config;

/// Frame rate for UI updates
const FPS: u64 = 30;
/// Arrow-key seek step in seconds
const SEEK_STEP_SECS: f64 = 5.0;
/// Volume step for the -/+ keys
const VOLUME_STEP: f32 = 0.05;
/// Rows reserved for the status bar
const STATUS_ROWS: u16 = 1;
/// Status bar accent, matched to the waveform trace
const ACCENT: Color = Color::Rgb(WAVEFORM.r, WAVEFORM.g, WAVEFORM.b);

#[derive(Parser)]
#[command(
    name = "phosphor",
    version,
    about = "Terminal audio player with a phosphor-trail spectrum visualizer"
)]
struct Cli {
    /// Audio file to play; defaults to the last opened file
    path: Option<PathBuf>,

    /// Initial master volume, 0.0 to 2.0
    #[arg(long)]
    volume: Option<f32>,
}

/// What the audio thread hands back once the stream is up
type AudioInit = anyhow::Result<(AudioEngine, AnalysisTap)>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = Config::load();
    let startup_file = cli.path.or_else(|| config.last_file.clone());
    let volume = cli.volume.unwrap_or(config.volume);

    // Bring the audio stack up before entering the alternate screen so an
    // init failure prints to a normal terminal
    let (init_tx, init_rx) = bounded(1);
    let audio_handle = thread::spawn(move || run_audio_thread(init_tx));
    let (engine, mut tap) = init_rx
        .recv_timeout(Duration::from_secs(10))
        .map_err(|_| anyhow!("audio initialization timed out"))??;

    engine.set_volume(volume);
    if let Some(ref path) = startup_file {
        engine.load(path.clone());
    }

    // Initialize terminal
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut current_file = startup_file;
    let result = run_app(&mut terminal, &engine, &mut tap, &mut current_file);

    // Cleanup
    engine.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Wait for the audio thread to drop the stream
    let _ = audio_handle.join();

    config.last_file = current_file;
    config.volume = engine.status().volume;
    if let Err(e) = config.save() {
        warn!(error = %e, "failed to save config");
    }

    result
}

fn run_audio_thread(init_tx: Sender<AudioInit>) {
    // Get audio host and device
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = init_tx.send(Err(anyhow!("no audio output device found")));
        return;
    };

    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = init_tx.send(Err(anyhow!("failed to get audio config: {e}")));
            return;
        }
    };
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    info!(sample_rate, channels, "opening output stream");

    let (feed, tap) = match tap_pair(TapConfig::default()) {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(anyhow!("analysis tap setup failed: {e}")));
            return;
        }
    };
    let engine = AudioEngine::new(sample_rate, feed);
    let engine_state = engine.callback_state();
    let shutdown = engine.shutdown_flag();

    // Pre-allocated stereo scratch for devices that are not two-channel
    let mut stereo_scratch = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        &supported.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // try_lock so the real-time thread never waits; contention
            // (rare) turns into one silent buffer
            let Some(mut state) = engine_state.try_lock() else {
                data.fill(0.0);
                return;
            };
            if channels == 2 {
                state.process(data);
                return;
            }

            // Render stereo into the scratch, then adapt to the device layout
            let frames = data.len() / channels.max(1);
            let stereo_len = frames * 2;
            if stereo_len > stereo_scratch.len() {
                stereo_scratch.resize(stereo_len, 0.0);
            }
            let stereo = &mut stereo_scratch[..stereo_len];
            state.process(stereo);

            if channels == 1 {
                for (i, sample) in data.iter_mut().enumerate() {
                    *sample = (stereo[i * 2] + stereo[i * 2 + 1]) * 0.5;
                }
            } else {
                for (i, frame) in data.chunks_exact_mut(channels).enumerate() {
                    frame.fill(0.0);
                    frame[0] = stereo[i * 2];
                    frame[1] = stereo[i * 2 + 1];
                }
            }
        },
        |err| {
            error!(error = %err, "audio stream error");
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = init_tx.send(Err(anyhow!("failed to create audio stream: {e}")));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = init_tx.send(Err(anyhow!("failed to start audio: {e}")));
        return;
    }

    let _ = init_tx.send(Ok((engine, tap)));

    // Hold the stream until shutdown so no callback outlives the session
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &AudioEngine,
    tap: &mut AnalysisTap,
    current_file: &mut Option<PathBuf>,
) -> anyhow::Result<()> {
    let visualizer = Visualizer::new();
    let mut surface = Surface::new(0, 0, BACKDROP);

    let frame_duration = Duration::from_millis(1000 / FPS);
    let mut last_frame = Instant::now();

    loop {
        // Process load completions
        while let Ok(audio_event) = engine.events().try_recv() {
            match audio_event {
                AudioEvent::TrackLoaded {
                    name,
                    duration_secs,
                } => {
                    info!(name = %name, duration_secs, "track ready");
                    engine.play();
                }
                AudioEvent::LoadFailed { message } => {
                    warn!(message = %message, "track load failed");
                }
            }
        }

        let status = engine.status();
        let frame = tap.frame();

        // Geometry comes from the terminal every frame, two pixels per cell row
        let size = terminal.size()?;
        let canvas_rows = size.height.saturating_sub(STATUS_ROWS);
        surface.resize(size.width as u32, canvas_rows as u32 * 2);
        visualizer.render(&frame, &mut surface);

        terminal.draw(|f| draw_shell(f, &surface, &status))?;

        // Handle input
        let timeout = frame_duration.saturating_sub(last_frame.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        break;
                    }
                    match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Char(' ') => engine.toggle(),
                        KeyCode::Char('s') => engine.stop(),
                        KeyCode::Char('o') => {
                            if let Some(path) = current_file.clone() {
                                engine.load(path);
                            }
                        }
                        KeyCode::Left => {
                            engine.seek((status.position_secs - SEEK_STEP_SECS).max(0.0));
                        }
                        KeyCode::Right => {
                            engine.seek(status.position_secs + SEEK_STEP_SECS);
                        }
                        KeyCode::Char('-') => engine.adjust_volume(-VOLUME_STEP),
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            engine.adjust_volume(VOLUME_STEP)
                        }
                        _ => {}
                    }
                }
                // Geometry is re-read next iteration; playback is unaffected
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        // Maintain frame rate
        let elapsed = last_frame.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
        last_frame = Instant::now();
    }

    Ok(())
}

fn draw_shell(frame: &mut ratatui::Frame, surface: &Surface, status: &TransportStatus) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }
    let canvas = Rect {
        height: area.height.saturating_sub(STATUS_ROWS),
        ..area
    };

    // Each cell carries two vertically stacked pixels through '▀':
    // foreground is the upper pixel, background the lower
    {
        let buf = frame.buffer_mut();
        for row in 0..canvas.height {
            for col in 0..canvas.width {
                let top = surface.pixel(col as u32, row as u32 * 2);
                let bottom = surface.pixel(col as u32, row as u32 * 2 + 1);
                let (Some(top), Some(bottom)) = (top, bottom) else {
                    continue;
                };
                let cell = &mut buf[(canvas.x + col, canvas.y + row)];
                cell.set_char('▀');
                cell.set_fg(Color::Rgb(top[0], top[1], top[2]));
                cell.set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
            }
        }
    }

    let status_area = Rect::new(
        area.x,
        area.y + canvas.height,
        area.width,
        area.height - canvas.height,
    );
    if status_area.height > 0 {
        frame.render_widget(Paragraph::new(status_line(status)), status_area);
    }
}

fn status_line(status: &TransportStatus) -> Line<'static> {
    let glyph = match status.state {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Stopped => "■",
    };
    let name = status.track_name.as_deref().unwrap_or("no track");
    let head = format!(
        " {glyph} {name}  {} / {}  vol {:.0}%",
        fmt_time(status.position_secs),
        fmt_time(status.duration_secs),
        status.volume * 100.0
    );

    let mut spans = vec![Span::styled(head, Style::default().fg(ACCENT))];
    if status.is_loading {
        spans.push(Span::styled(
            "  loading...",
            Style::default().fg(Color::Yellow),
        ));
    } else if let Some(ref message) = status.error {
        spans.push(Span::styled(
            format!("  {message}"),
            Style::default().fg(Color::Red),
        ));
    } else {
        spans.push(Span::styled(
            "  space play/pause | s stop | o reopen | arrows seek | -/+ vol | q quit",
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn fmt_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn init_logging() -> anyhow::Result<()> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phosphor");
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::File::create(dir.join("phosphor.log"))?;

    // The terminal owns stdout while in raw mode, so logs go to a file
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
