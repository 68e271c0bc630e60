//! Frame composition: playhead position in, finished RGBA frame out. Owns
//! the rasterizer and layers slide scenes with the cross-fade at slide
//! boundaries.

use crate::{
    assets::AssetBank,
    composite::crossfade_in_place,
    error::QuizResult,
    layout::{SlideFrame, build_finished_scene, build_slide_scene},
    model::{EngineConfig, Slide},
    render_cpu::CpuRenderer,
    timeline::Timeline,
};

/// Length of the cross-fade into every slide after the first.
pub const TRANSITION_MS: f64 = 500.0;

/// One finished frame, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Opacity of the incoming slide during its entrance. The first slide never
/// fades; later slides ramp linearly over [`TRANSITION_MS`].
pub fn transition_alpha(t_ms: f64, slide_start: u64, slide_index: usize) -> f64 {
    if slide_index == 0 {
        return 1.0;
    }
    ((t_ms - slide_start as f64) / TRANSITION_MS).clamp(0.0, 1.0)
}

pub struct Compositor {
    renderer: CpuRenderer,
    config: EngineConfig,
}

impl Compositor {
    pub fn new(config: EngineConfig, bank: &AssetBank) -> QuizResult<Self> {
        let renderer = CpuRenderer::new(config.width, config.height, bank.font_bytes())?;
        Ok(Self { renderer, config })
    }

    /// Compose the frame at `t_ms`. Past the final slide this renders the
    /// terminal card; inside a slide's first [`TRANSITION_MS`] the previous
    /// slide shows through underneath.
    pub fn render(
        &mut self,
        t_ms: f64,
        timeline: &Timeline,
        slides: &[Slide],
        bank: &AssetBank,
    ) -> QuizResult<FrameRGBA> {
        let Some(active) = timeline.slide_at(t_ms) else {
            let scene = build_finished_scene(&self.config, slides.len());
            let data = self.renderer.render_scene(&scene, bank)?;
            return Ok(self.frame(data));
        };

        let active_scene =
            build_slide_scene(&self.slide_frame(active, t_ms, timeline, slides, bank));
        let active_buf = self.renderer.render_scene(&active_scene, bank)?;

        let alpha = transition_alpha(t_ms, timeline.phases()[active].start, active);
        if alpha >= 1.0 {
            return Ok(self.frame(active_buf));
        }

        // Entrance fade: previous slide holds its settled reveal underneath.
        let prev = active - 1;
        let prev_scene = build_slide_scene(&self.slide_frame(prev, t_ms, timeline, slides, bank));
        let mut out = self.renderer.render_scene(&prev_scene, bank)?;
        crossfade_in_place(&mut out, &active_buf, alpha as f32);
        Ok(self.frame(out))
    }

    fn slide_frame<'a>(
        &'a self,
        index: usize,
        t_ms: f64,
        timeline: &'a Timeline,
        slides: &'a [Slide],
        bank: &AssetBank,
    ) -> SlideFrame<'a> {
        SlideFrame {
            slide: &slides[index],
            slide_index: index,
            slide_count: slides.len(),
            timing: &timeline.phases()[index],
            t_ms,
            total_ms: timeline.total_ms(),
            has_image: bank.image(index).is_some(),
            config: &self.config,
        }
    }

    fn frame(&self, data: Vec<u8>) -> FrameRGBA {
        FrameRGBA {
            width: self.config.width,
            height: self.config.height,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{NarrationMs, build_timeline};

    fn slides() -> Vec<Slide> {
        (0..2)
            .map(|i| Slide {
                question: format!("Question {i}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: 0,
                difficulty: None,
            })
            .collect()
    }

    fn timeline() -> Timeline {
        build_timeline(
            &[
                NarrationMs {
                    question: Some(2000),
                    answer: Some(1000),
                },
                NarrationMs {
                    question: Some(2000),
                    answer: None,
                },
            ],
            5000,
        )
    }

    #[test]
    fn transition_alpha_ramps_only_after_first_slide() {
        assert_eq!(transition_alpha(10.0, 0, 0), 1.0);
        assert_eq!(transition_alpha(10_000.0, 10_000, 1), 0.0);
        assert!((transition_alpha(10_250.0, 10_000, 1) - 0.5).abs() < 1e-9);
        assert_eq!(transition_alpha(10_500.0, 10_000, 1), 1.0);
        assert_eq!(transition_alpha(20_000.0, 10_000, 1), 1.0);
    }

    #[test]
    fn render_produces_full_frames_everywhere() {
        let config = EngineConfig {
            width: 64,
            height: 36,
            ..EngineConfig::default()
        };
        let bank = AssetBank::default();
        let mut comp = Compositor::new(config, &bank).unwrap();
        let tl = timeline();
        let slides = slides();

        for t in [0.0, 3000.0, 9000.0, tl.phases()[1].start as f64 + 100.0] {
            let frame = comp.render(t, &tl, &slides, &bank).unwrap();
            assert_eq!(frame.data.len(), 64 * 36 * 4);
        }

        // Past the end: the terminal card, not a panic.
        let frame = comp
            .render(tl.total_ms() as f64 + 1.0, &tl, &slides, &bank)
            .unwrap();
        assert_eq!((frame.width, frame.height), (64, 36));
    }
}
