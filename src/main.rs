use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use playexl::audio::export::export_wav;
use playexl::messaging::notification::NotificationLevel;
use playexl::sequencer::ThreadScheduler;
use playexl::session::DirectoryFetcher;
use playexl::{
    AudioEngine, AudioSource, ClickTrackRenderer, GridStatus, PlayerConfig, Session, SongRecord,
    StemBank, Tempo, TimeSignature, TimeSignatureMap, TrackId, create_notification_channel,
};
use ringbuf::traits::Consumer;

const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;
const CLICK_RENDER_SAMPLE_RATE: u32 = 44100;
const DISPLAY_INTERVAL: Duration = Duration::from_millis(100);

const USAGE: &str = "\
usage:
  playexl <song.json|song.ron> [--measure N] [--hold] [--mute ID]... [--solo ID]... [--click-off] [--seconds S]
  playexl --render-click <out.wav> [--bpm B] [--measures N] [--signature 4/4]";

#[derive(Debug, Default)]
struct PlayArgs {
    song: PathBuf,
    measure: Option<u32>,
    hold: bool,
    mute: Vec<String>,
    solo: Vec<String>,
    click_off: bool,
    seconds: Option<f64>,
}

#[derive(Debug)]
struct RenderArgs {
    output: PathBuf,
    bpm: f64,
    measures: u32,
    signature: String,
}

#[derive(Debug)]
enum Mode {
    Play(PlayArgs),
    RenderClick(RenderArgs),
}

fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> Result<T, String> {
    let raw = raw.ok_or_else(|| format!("{} needs a value", flag))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {}: {}", flag, raw))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Mode, String> {
    let first = args.next().ok_or("missing song file")?;

    if first == "--render-click" {
        let mut render = RenderArgs {
            output: PathBuf::from(args.next().ok_or("--render-click needs an output path")?),
            bpm: 120.0,
            measures: 8,
            signature: "4/4".to_string(),
        };
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--bpm" => render.bpm = value(&flag, args.next())?,
                "--measures" => render.measures = value(&flag, args.next())?,
                "--signature" => render.signature = value(&flag, args.next())?,
                other => return Err(format!("unknown option {}", other)),
            }
        }
        return Ok(Mode::RenderClick(render));
    }

    let mut play = PlayArgs {
        song: PathBuf::from(first),
        ..Default::default()
    };
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--measure" => play.measure = Some(value(&flag, args.next())?),
            "--hold" => play.hold = true,
            "--mute" => play.mute.push(value(&flag, args.next())?),
            "--solo" => play.solo.push(value(&flag, args.next())?),
            "--click-off" => play.click_off = true,
            "--seconds" => play.seconds = Some(value(&flag, args.next())?),
            other => return Err(format!("unknown option {}", other)),
        }
    }
    Ok(Mode::Play(play))
}

fn render_click(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tempo = Tempo::new(args.bpm)?;
    let signature: TimeSignature = args.signature.parse()?;
    let signatures = TimeSignatureMap::with_initial(signature, []);

    let click = ClickTrackRenderer::new(CLICK_RENDER_SAMPLE_RATE).render(tempo, &signatures, args.measures, 0.0);
    export_wav(&args.output, &click.samples, click.sample_rate, 1)?;

    println!(
        "Rendered {} measures of {} at {} ({} clicks, {:.2}s) to {}",
        args.measures,
        signature,
        tempo,
        click.beat_times.len(),
        click.duration_secs(),
        args.output.display()
    );
    Ok(())
}

fn play(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = PlayerConfig::load_or_default();
    let song = SongRecord::load(&args.song)?;
    let song_dir = args.song.parent().unwrap_or(Path::new(".")).to_path_buf();

    let sample_rate = AudioEngine::default_sample_rate()?;
    let bank = Arc::new(StemBank::new(sample_rate));

    let (notification_tx, mut notification_rx) = create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let notification_tx = Arc::new(Mutex::new(notification_tx));

    let mut session = Session::new(
        Arc::clone(&bank) as Arc<dyn AudioSource>,
        Arc::new(ThreadScheduler),
        Box::new(DirectoryFetcher::new(song_dir)),
        &config,
    )
    .with_notifications(Arc::clone(&notification_tx));

    let loaded = session.load_song(song)?;
    println!("=== {} ===", loaded.record.title);
    for line in loaded.record.credits() {
        println!("{}", line);
    }
    match &loaded.grid_status {
        GridStatus::Ready { beats, bpm } => println!("Beat grid: {} beats, {:.1} BPM", beats, bpm),
        GridStatus::NoClickTrack => println!("No click track: measure display disabled"),
        GridStatus::InsufficientBeats { found } => println!("Click track unusable ({} beats found)", found),
        GridStatus::ClickUnavailable => println!("Click track could not be loaded"),
    }
    for failure in &loaded.failures {
        eprintln!("Skipped {}: {}", failure.id, failure.error);
    }

    let _engine = AudioEngine::new(Arc::clone(&bank), config.output.master_volume, notification_tx)?;

    let transport = session.transport_mut();
    for id in &args.mute {
        transport.set_mute(&TrackId::new(id.clone()), true)?;
    }
    for id in &args.solo {
        transport.set_solo(&TrackId::new(id.clone()), true)?;
    }
    transport.set_click_muted(args.click_off);
    transport.set_loop_hold(args.hold);
    if let Some(measure) = args.measure {
        transport.jump_to_measure(measure)?;
    }

    let report = transport.play()?;
    for (id, error) in &report.failed {
        eprintln!("{} failed to start: {}", id, error);
    }

    let started = Instant::now();
    let limit = args.seconds.map(Duration::from_secs_f64);
    loop {
        thread::sleep(DISPLAY_INTERVAL);

        while let Some(notification) = notification_rx.try_pop() {
            if notification.level != NotificationLevel::Info {
                eprintln!("\n[{:?}] {}", notification.category, notification.message);
            }
        }

        let transport = session.transport();
        print!("\r{:>10}  {:7.2}s", transport.position_display(), transport.current_time());
        let _ = std::io::stdout().flush();

        if transport.is_finished() || limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }
    println!();

    session.transport_mut().stop()?;
    session.unload();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();

    let mode = match parse_args(env::args().skip(1)) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("error: {}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let result = match mode {
        Mode::Play(args) => play(args),
        Mode::RenderClick(args) => render_click(args),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
