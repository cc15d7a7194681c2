use std::sync::{Arc, Mutex};

use playexl::audio::export::export_wav;
use playexl::messaging::create_notification_channel;
use playexl::messaging::notification::NotificationCategory;
use playexl::sequencer::timeline::{Tempo, TimeSignature, TimeSignatureChange, TimeSignatureMap};
use playexl::sequencer::{ClickTrackRenderer, ManualScheduler};
use playexl::session::DirectoryFetcher;
use playexl::{AudioSource, GridStatus, PlayerConfig, Session, SongRecord, StemBank, TrackId};
use ringbuf::traits::Consumer;
use tempfile::TempDir;

const RATE: u32 = 44100;

struct Fixture {
    _dir: TempDir,
    song: SongRecord,
    bank: Arc<StemBank>,
    session: Session,
}

/// A 6/8-then-4/4 song on disk: click, tenor and a missing bass stem
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("stems")).unwrap();

    let signatures = TimeSignatureMap::with_initial(
        TimeSignature::six_eight(),
        [TimeSignatureChange::new(3, TimeSignature::four_four())],
    );
    let click = ClickTrackRenderer::new(RATE).render(Tempo::new(150.0).unwrap(), &signatures, 5, 0.5);
    export_wav(&dir.path().join("stems/click.wav"), &click.samples, RATE, 1).unwrap();

    let tenor: Vec<f32> = (0..click.samples.len() * 2)
        .map(|i| if (i / 2) % 200 < 100 { 0.2 } else { -0.2 })
        .collect();
    export_wav(&dir.path().join("stems/tenor.wav"), &tenor, RATE, 2).unwrap();

    let json = r#"{
        "title": "Shenandoah",
        "timeSignature": "6/8",
        "timeSignatureChanges": [{ "measure": 3, "timeSignature": "4/4" }],
        "tracks": [
            { "id": "click", "type": "click", "filePath": "/stems/click.wav" },
            { "id": "tenor", "type": "tenor_1", "filePath": "/stems/tenor.wav" },
            { "id": "bass", "type": "bass", "filePath": "/stems/bass.mp3" }
        ],
        "composers": ["Traditional"]
    }"#;
    let song_path = dir.path().join("song.json");
    std::fs::write(&song_path, json).unwrap();
    let song = SongRecord::load(&song_path).unwrap();

    let bank = Arc::new(StemBank::new(RATE));
    let session = Session::new(
        bank.clone(),
        Arc::new(ManualScheduler::new()),
        Box::new(DirectoryFetcher::new(dir.path())),
        &PlayerConfig::default(),
    );

    Fixture {
        _dir: dir,
        song,
        bank,
        session,
    }
}

#[test]
fn test_song_from_disk_loads_with_grid() {
    let (tx, mut rx) = create_notification_channel(16);
    let Fixture {
        _dir,
        song,
        bank,
        session,
    } = fixture();
    let mut session = session.with_notifications(Arc::new(Mutex::new(tx)));

    let loaded = session.load_song(song).unwrap();
    assert_eq!(loaded.record.credits(), vec!["Composed by Traditional".to_string()]);
    assert!(loaded.grid_status.is_ready(), "{:?}", loaded.grid_status);
    assert_eq!(loaded.failures.len(), 1);
    assert_eq!(loaded.failures[0].id, TrackId::from("bass"));

    // 6 + 6 + 4 + 4 + 4 clicks
    let grid = session.transport().grid().unwrap();
    assert_eq!(grid.len(), 24);
    assert_eq!(grid.measure_count(), 5);
    assert_eq!(grid.first_beat_of_measure(2).unwrap().beats_in_measure, 6);
    assert_eq!(grid.first_beat_of_measure(3).unwrap().beats_in_measure, 4);

    let projector = session.projector().unwrap();
    let labelled: Vec<u32> = projector
        .measures()
        .iter()
        .filter(|m| m.show_signature)
        .map(|m| m.number)
        .collect();
    assert_eq!(labelled, vec![1, 3]);

    let width = projector.content_width();
    session.resize(PlayerConfig::default().timeline.container_width / 2.0);
    assert!((session.projector().unwrap().content_width() - width / 2.0).abs() < 1e-9);

    assert_eq!(bank.len(), 2);
    assert!(std::iter::from_fn(|| rx.try_pop()).any(|n| n.category == NotificationCategory::Track));
}

#[test]
fn test_playback_position_and_autoscroll() {
    let Fixture {
        _dir,
        song,
        bank,
        mut session,
    } = fixture();
    session.load_song(song).unwrap();

    session.transport_mut().jump_to_measure(4).unwrap();
    let report = session.transport_mut().play().unwrap();
    assert_eq!(report.started.len(), 2);

    let click = session.transport().click_track().unwrap().handle;
    let tenor = session.transport().tracks()[0].handle;
    bank.advance_secs(0.2);
    session.transport().poll_now();

    assert_eq!(session.transport().position().measure, 4);
    assert!(session.transport().position_display().starts_with("4.1."));
    let drift = bank.current_time(click).unwrap() - bank.current_time(tenor).unwrap();
    assert!(drift.abs() < 1e-6);

    // At the default zoom measure 4 is inside the comfort zone
    assert_eq!(session.follow_playhead(0.0), None);

    // Zoomed to two measures it is past the right margin
    session.projector_mut().unwrap().set_visible_measures(2);
    let scroll = session.follow_playhead(0.0);
    assert!(scroll.is_some_and(|s| s > 0.0), "{:?}", scroll);
}

#[test]
fn test_song_without_click_plays_free_running() {
    let dir = TempDir::new().unwrap();
    export_wav(&dir.path().join("piano.wav"), &vec![0.1; RATE as usize], RATE, 1).unwrap();
    let song = SongRecord::from_json(
        r#"{ "title": "Solo Piano", "tracks": [{ "id": "p", "type": "piano", "filePath": "piano.wav" }] }"#,
    )
    .unwrap();

    let bank = Arc::new(StemBank::new(RATE));
    let mut session = Session::new(
        bank.clone(),
        Arc::new(ManualScheduler::new()),
        Box::new(DirectoryFetcher::new(dir.path())),
        &PlayerConfig::default(),
    );
    let loaded = session.load_song(song).unwrap();
    assert_eq!(loaded.grid_status, GridStatus::NoClickTrack);

    let transport = session.transport_mut();
    assert!(transport.jump_to_measure(1).is_err());
    transport.play().unwrap();
    bank.advance_secs(0.5);
    transport.poll_now();
    assert!((transport.current_time() - 0.5).abs() < 1e-6);
    assert_eq!(transport.position_display(), "1.1.1");
}
