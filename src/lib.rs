#![forbid(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod audio_mix;
pub mod composite;
pub mod compositor;
pub mod engine;
pub mod error;
pub mod export;
pub mod layout;
pub mod model;
pub mod playback;
pub mod render_cpu;
pub mod scene;
pub mod timeline;

pub use assets::{AssetBank, CancelToken};
pub use audio::{AudioCommand, AudioScheduler};
pub use compositor::{Compositor, FrameRGBA};
pub use engine::{QuizEngine, SessionAssets, TickUpdate};
pub use error::{QuizError, QuizResult};
pub use model::{EngineConfig, LayoutVariant, QuizDoc, Slide, SlideMedia};
pub use playback::PlaybackClock;
pub use timeline::{NarrationMs, Phase, PhaseTiming, PhaseView, Timeline, build_timeline};
