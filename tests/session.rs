//! End-to-end session behavior: frame determinism across seeks and the
//! audio command stream over a full linear traversal.

use std::path::PathBuf;

use quizreel::{
    AudioCommand, CancelToken, EngineConfig, QuizEngine, SessionAssets, Slide, SlideMedia,
    audio::Utterance,
};

fn slides(n: usize) -> Vec<Slide> {
    (0..n)
        .map(|i| Slide {
            question: format!("Question number {i}"),
            options: vec![
                "Alpha".into(),
                "Beta".into(),
                "Gamma".into(),
                "Delta".into(),
            ],
            correct_answer_index: i % 4,
            difficulty: None,
        })
        .collect()
}

fn small_config() -> EngineConfig {
    EngineConfig {
        width: 64,
        height: 36,
        ..EngineConfig::default()
    }
}

// Raw 16-bit LE PCM at 24 kHz, the narration wire format.
fn narration_bytes(ms: u64) -> Vec<u8> {
    vec![0u8; (24_000 * ms / 1000) as usize * 2]
}

/// Minimal mono PCM16 WAV so ffmpeg-backed decoding has a real container.
fn write_test_wav(path: &PathBuf, ms: u64) {
    let sample_rate = 22_050u32;
    let samples = (u64::from(sample_rate) * ms / 1000) as u32;
    let data_len = samples * 2;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..samples {
        let v = if i % 50 < 25 { 8000i16 } else { -8000i16 };
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn seeked_frames_match_linearly_reached_frames() {
    let n = 2;
    let media = vec![
        SlideMedia {
            question_audio: Some(narration_bytes(2000)),
            answer_audio: Some(narration_bytes(1000)),
            ..SlideMedia::default()
        },
        SlideMedia::default(),
    ];

    let mut linear = QuizEngine::new(
        slides(n),
        media.clone(),
        small_config(),
        SessionAssets::default(),
        &CancelToken::new(),
    )
    .unwrap();
    let mut seeker = QuizEngine::new(
        slides(n),
        media,
        small_config(),
        SessionAssets::default(),
        &CancelToken::new(),
    )
    .unwrap();

    linear.play();
    let step = 100.0;
    let total = linear.timeline().total_ms() as f64;
    let mut t = 0.0;
    while t < total {
        let update = linear.tick(step).unwrap();
        t = update.position_ms;

        let direct = seeker.frame_at(t).unwrap();
        assert_eq!(
            update.frame.data, direct.data,
            "frame mismatch at t={t}ms between linear playback and direct seek"
        );
    }
}

#[test]
fn full_traversal_emits_the_scheduled_audio_commands() {
    if !quizreel::assets::media::is_ffmpeg_on_path() {
        return;
    }

    let dir = std::env::temp_dir().join(format!("quizreel-session-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let music = dir.join("music.wav");
    let cue = dir.join("cue.wav");
    write_test_wav(&music, 2000);
    write_test_wav(&cue, 80);

    let n = 2;
    let media = vec![
        SlideMedia {
            question_audio: Some(narration_bytes(1500)),
            answer_audio: Some(narration_bytes(800)),
            ..SlideMedia::default()
        },
        SlideMedia {
            question_audio: Some(narration_bytes(1000)),
            ..SlideMedia::default()
        },
    ];

    let mut engine = QuizEngine::new(
        slides(n),
        media,
        small_config(),
        SessionAssets {
            music_path: Some(music),
            tick_cue_path: Some(cue),
            font_bytes: None,
        },
        &CancelToken::new(),
    )
    .unwrap();

    engine.play();
    let mut commands = Vec::new();
    loop {
        let update = engine.tick(33.0).unwrap();
        commands.extend(update.audio);
        if update.just_finished {
            break;
        }
    }

    let count = |f: &dyn Fn(&AudioCommand) -> bool| commands.iter().filter(|c| f(*c)).count();

    let question_starts = count(&|c| {
        matches!(
            c,
            AudioCommand::StartNarration {
                utterance: Utterance::Question,
                ..
            }
        )
    });
    let answer_starts = count(&|c| {
        matches!(
            c,
            AudioCommand::StartNarration {
                utterance: Utterance::Answer,
                ..
            }
        )
    });
    let end_cues = count(&|c| matches!(c, AudioCommand::PlayEndCue));
    let tick_cues = count(&|c| matches!(c, AudioCommand::PlayTickCue { .. }));
    let music_starts = count(&|c| matches!(c, AudioCommand::StartMusic { .. }));

    assert_eq!(question_starts, 2);
    assert_eq!(answer_starts, 1);
    assert_eq!(end_cues, 2);
    // Default thinking time is 5 s, counted down once per second per slide.
    assert_eq!(tick_cues, 2 * 5);
    assert_eq!(music_starts, 1);
    assert!(commands.contains(&AudioCommand::StopMusic));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn export_captures_one_frame_per_interval() {
    if !quizreel::assets::media::is_ffmpeg_on_path() {
        return;
    }

    let mut config = small_config();
    config.thinking_time_secs = 3;

    let mut engine = QuizEngine::new(
        slides(1),
        vec![SlideMedia::default()],
        config,
        SessionAssets::default(),
        &CancelToken::new(),
    )
    .unwrap();

    let dir = std::env::temp_dir().join(format!("quizreel-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("run-quiz-video.mp4");

    let total_ms = engine.timeline().total_ms();
    let mut exporter = quizreel::export::Exporter::start(&mut engine, &out).unwrap();
    while exporter.capture_tick(&mut engine).unwrap() {}
    let expected = (total_ms as f64 * 30.0 / 1000.0).ceil() as u64;
    assert_eq!(exporter.frames_captured(), expected);

    let written = exporter.stop().unwrap();
    assert!(written.exists());
    assert!(std::fs::metadata(&written).unwrap().len() > 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn thinking_time_change_shifts_every_later_boundary() {
    let n = 3;
    let mut engine = QuizEngine::new(
        slides(n),
        vec![SlideMedia::default(); n],
        small_config(),
        SessionAssets::default(),
        &CancelToken::new(),
    )
    .unwrap();

    let before: Vec<u64> = engine.timeline().phases().iter().map(|p| p.end).collect();
    engine.set_thinking_time(8).unwrap();
    let after: Vec<u64> = engine.timeline().phases().iter().map(|p| p.end).collect();

    for (i, (b, a)) in before.iter().zip(&after).enumerate() {
        assert_eq!(a - b, 3000 * (i as u64 + 1));
    }
}
