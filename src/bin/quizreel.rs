use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use quizreel::{
    composite::flatten_to_opaque_rgba8,
    engine::{QuizEngine, SessionAssets},
    export::{export_file_name, export_session},
    model::{QuizDoc, SlideMedia, normalize_rel_path},
};

#[derive(Parser, Debug)]
#[command(name = "quizreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Export the whole quiz as an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input quiz document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Playhead position in milliseconds.
    #[arg(long)]
    at_ms: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Override the document's layout variant.
    #[arg(long, value_enum)]
    layout: Option<LayoutChoice>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutChoice {
    Cinematic,
    Broadcast,
}

impl From<LayoutChoice> for quizreel::LayoutVariant {
    fn from(choice: LayoutChoice) -> Self {
        match choice {
            LayoutChoice::Cinematic => Self::Cinematic,
            LayoutChoice::Broadcast => Self::Broadcast,
        }
    }
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input quiz document JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path. Defaults to `<document stem>-quiz-video.mp4` next to
    /// the document.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn read_doc_json(path: &Path) -> anyhow::Result<QuizDoc> {
    let f = File::open(path).with_context(|| format!("open quiz document '{}'", path.display()))?;
    let r = BufReader::new(f);
    let doc: QuizDoc = serde_json::from_reader(r).with_context(|| "parse quiz document JSON")?;
    doc.validate()?;
    Ok(doc)
}

fn read_asset(root: &Path, rel: &str) -> anyhow::Result<Vec<u8>> {
    let rel = normalize_rel_path(rel)?;
    let path = root.join(&rel);
    std::fs::read(&path).with_context(|| format!("read asset '{}'", path.display()))
}

fn build_engine(doc: &QuizDoc, root: &Path) -> anyhow::Result<QuizEngine> {
    let slides: Vec<_> = doc.slides.iter().map(|s| s.to_slide()).collect();
    let mut media = Vec::with_capacity(doc.slides.len());
    for src in &doc.slides {
        media.push(SlideMedia {
            background_image: src
                .background_image
                .as_deref()
                .map(|p| read_asset(root, p))
                .transpose()?,
            question_audio: src
                .question_audio
                .as_deref()
                .map(|p| read_asset(root, p))
                .transpose()?,
            answer_audio: src
                .answer_audio
                .as_deref()
                .map(|p| read_asset(root, p))
                .transpose()?,
        });
    }

    let session = SessionAssets {
        music_path: doc.music.as_deref().map(|p| root.join(p)),
        tick_cue_path: doc.tick_cue.as_deref().map(|p| root.join(p)),
        font_bytes: doc
            .font
            .as_deref()
            .map(|p| read_asset(root, p))
            .transpose()?,
    };

    let engine = QuizEngine::new(
        slides,
        media,
        doc.config.clone(),
        session,
        &quizreel::CancelToken::new(),
    )?;
    Ok(engine)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut doc = read_doc_json(&args.in_path)?;
    if let Some(layout) = args.layout {
        doc.config.layout = layout.into();
    }
    let root = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let mut engine = build_engine(&doc, root)?;

    let frame = engine.frame_at(args.at_ms as f64)?;
    let mut opaque = vec![0u8; frame.data.len()];
    flatten_to_opaque_rgba8(&mut opaque, &frame.data, [0, 0, 0]);

    let img = image::RgbaImage::from_raw(frame.width, frame.height, opaque)
        .context("frame buffer does not match its dimensions")?;
    img.save(&args.out)
        .with_context(|| format!("write PNG '{}'", args.out.display()))?;
    println!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let doc = read_doc_json(&args.in_path)?;
    let root = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let mut engine = build_engine(&doc, root)?;

    let out = match args.out {
        Some(out) => out,
        None => {
            let stem = args
                .in_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("quiz");
            root.join(export_file_name(stem))
        }
    };

    let written = export_session(&mut engine, out)?;
    println!("wrote {}", written.display());
    Ok(())
}
