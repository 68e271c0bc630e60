//! Scene builders for the two layout variants. Both consume the same
//! [`PhaseView`] quantities; they differ only in what they draw, so the
//! timing math here is shared and the variant match stays at the top.

use kurbo::{Arc as KurboArc, BezPath, Circle, Point, Rect, Shape, Stroke, StrokeOpts, Vec2};

use crate::{
    model::{EngineConfig, LayoutVariant, Slide},
    scene::{Rgba8, Scene, TextAlign},
    timeline::{Phase, PhaseTiming, PhaseView},
};

const PATH_TOLERANCE: f64 = 0.1;

/// Palette shared by both variants.
mod palette {
    use crate::scene::Rgba8;

    pub const BACKDROP: Rgba8 = Rgba8::opaque(16, 24, 40);
    pub const ACCENT: Rgba8 = Rgba8::opaque(255, 196, 61);
    pub const TEXT: Rgba8 = Rgba8::opaque(245, 245, 245);
    pub const TEXT_DIM: Rgba8 = Rgba8::new(245, 245, 245, 110);
    pub const OPTION_BG: Rgba8 = Rgba8::new(255, 255, 255, 38);
    pub const OPTION_BG_DIM: Rgba8 = Rgba8::new(255, 255, 255, 16);
    pub const CORRECT: Rgba8 = Rgba8::opaque(46, 160, 67);
    pub const RING_TRACK: Rgba8 = Rgba8::new(255, 255, 255, 70);
    pub const BAR_TRACK: Rgba8 = Rgba8::new(255, 255, 255, 50);
    pub const BAR_GREEN: Rgba8 = Rgba8::opaque(46, 160, 67);
    pub const BAR_YELLOW: Rgba8 = Rgba8::opaque(234, 179, 8);
    pub const BAR_RED: Rgba8 = Rgba8::opaque(220, 53, 69);
    pub const BADGE: Rgba8 = Rgba8::new(255, 196, 61, 210);
}

pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Everything a layout needs to draw one slide at one playhead position.
pub struct SlideFrame<'a> {
    pub slide: &'a Slide,
    pub slide_index: usize,
    pub slide_count: usize,
    pub timing: &'a PhaseTiming,
    pub t_ms: f64,
    pub total_ms: u64,
    pub has_image: bool,
    pub config: &'a EngineConfig,
}

impl SlideFrame<'_> {
    fn view(&self) -> PhaseView {
        self.timing.view(self.t_ms)
    }
}

/// Build the draw list for one slide at one instant.
pub fn build_slide_scene(frame: &SlideFrame<'_>) -> Scene {
    match frame.config.layout {
        LayoutVariant::Cinematic => cinematic(frame),
        LayoutVariant::Broadcast => broadcast(frame),
    }
}

/// Terminal card shown once the playhead passes the last slide's end.
pub fn build_finished_scene(config: &EngineConfig, slide_count: usize) -> Scene {
    let (w, h) = (f64::from(config.width), f64::from(config.height));
    let mut scene = Scene::new();
    scene.fill_rect(Rect::new(0.0, 0.0, w, h), palette::BACKDROP);
    scene.text(
        "That's a wrap!",
        (h * 0.075) as f32,
        Point::new(w / 2.0, h * 0.42),
        palette::TEXT,
        (w * 0.8) as f32,
        TextAlign::Center,
    );
    scene.text(
        format!("{slide_count} questions answered"),
        (h * 0.035) as f32,
        Point::new(w / 2.0, h * 0.54),
        palette::TEXT_DIM,
        (w * 0.8) as f32,
        TextAlign::Center,
    );
    scene
}

/// Progress-bar color from the remaining fraction of thinking time.
pub fn bar_color(remaining_frac: f64) -> Rgba8 {
    if remaining_frac >= 0.6 {
        palette::BAR_GREEN
    } else if remaining_frac >= 0.3 {
        palette::BAR_YELLOW
    } else {
        palette::BAR_RED
    }
}

/// Fade-in opacity for option `index` under the staggered entrance: option i
/// starts fading one second after option i-1, measured from the end of the
/// question narration.
pub fn stagger_opacity(timing: &PhaseTiming, t_ms: f64, index: usize) -> f64 {
    const FADE_MS: f64 = 400.0;
    let appear_at = (timing.start + timing.question_ms) as f64 + index as f64 * 1000.0;
    ease_out_quad((t_ms - appear_at) / FADE_MS)
}

/// Background/text colors for one option row given the reveal state.
pub fn option_style(index: usize, correct: usize, view: &PhaseView) -> (Rgba8, Rgba8) {
    if view.phase != Phase::Revealing {
        return (palette::OPTION_BG, palette::TEXT);
    }
    let k = view.reveal_progress;
    if index == correct {
        // Neutral -> green over the dissolve.
        (
            lerp_color(palette::OPTION_BG, palette::CORRECT, k),
            palette::TEXT,
        )
    } else {
        (
            lerp_color(palette::OPTION_BG, palette::OPTION_BG_DIM, k),
            lerp_color(palette::TEXT, palette::TEXT_DIM, k),
        )
    }
}

fn lerp_color(a: Rgba8, b: Rgba8, k: f64) -> Rgba8 {
    let k = k.clamp(0.0, 1.0);
    let ch = |x: u8, y: u8| (f64::from(x) + (f64::from(y) - f64::from(x)) * k + 0.5) as u8;
    Rgba8::new(ch(a.r, b.r), ch(a.g, b.g), ch(a.b, b.b), ch(a.a, b.a))
}

fn option_label(index: usize, text: &str) -> String {
    let letter = (b'A' + index as u8) as char;
    format!("{letter}.  {text}")
}

fn cinematic(frame: &SlideFrame<'_>) -> Scene {
    let (w, h) = (
        f64::from(frame.config.width),
        f64::from(frame.config.height),
    );
    let view = frame.view();
    let mut scene = Scene::new();

    if frame.has_image {
        scene.image(frame.slide_index, Rect::new(0.0, 0.0, w, h), 1.0);
    } else {
        scene.fill_rect(Rect::new(0.0, 0.0, w, h), palette::BACKDROP);
    }
    scene.fill_rect(
        Rect::new(0.0, 0.0, w, h),
        Rgba8::new(0, 0, 0, 255).with_opacity(f64::from(frame.config.overlay_opacity)),
    );

    // Global progress along the whole run, pinned to the top edge.
    let global = if frame.total_ms > 0 {
        (frame.t_ms / frame.total_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bar_h = (h * 0.008).max(3.0);
    scene.fill_rect(Rect::new(0.0, 0.0, w, bar_h), palette::BAR_TRACK);
    scene.fill_rect(Rect::new(0.0, 0.0, w * global, bar_h), palette::ACCENT);

    countdown_ring(&mut scene, frame, &view, Point::new(w / 2.0, h * 0.21), h * 0.09);

    scene.text(
        frame.slide.question.clone(),
        (h * 0.05) as f32,
        Point::new(w / 2.0, h * 0.42),
        palette::TEXT,
        (w * 0.82) as f32,
        TextAlign::Center,
    );

    let row_h = h * 0.068;
    let gap = h * 0.018;
    let row_w = w * 0.62;
    let x0 = (w - row_w) / 2.0;
    let mut y = h * 0.54;
    for (i, option) in frame.slide.options.iter().enumerate() {
        let (bg, fg) = option_style(i, frame.slide.correct_answer_index, &view);
        scene.fill_rect(Rect::new(x0, y, x0 + row_w, y + row_h), bg);
        scene.text(
            option_label(i, option),
            (row_h * 0.42) as f32,
            Point::new(x0 + row_w * 0.04, y + row_h * 0.30),
            fg,
            (row_w * 0.92) as f32,
            TextAlign::Left,
        );
        y += row_h + gap;
    }

    scene
}

/// Ring countdown that sweeps empty over the thinking phase, then dissolves
/// into a checkmark with the correct answer sliding up beneath it. The whole
/// group lifts by a fixed offset as the dissolve runs.
fn countdown_ring(
    scene: &mut Scene,
    frame: &SlideFrame<'_>,
    view: &PhaseView,
    center: Point,
    radius: f64,
) {
    const REVEAL_LIFT_PX: f64 = 24.0;
    let lift = REVEAL_LIFT_PX * ease_out_quad(view.reveal_progress);
    let center = Point::new(center.x, center.y - lift);

    let stroke_w = radius * 0.16;
    let ring_opacity = 1.0 - view.reveal_progress;
    let check_opacity = view.reveal_progress;

    if ring_opacity > 0.0 {
        let track = stroke_path(&Circle::new(center, radius).to_path(PATH_TOLERANCE), stroke_w);
        scene.fill_path(track, palette::RING_TRACK.with_opacity(ring_opacity));

        let sweep = (1.0 - view.progress) * std::f64::consts::TAU;
        if sweep > 0.0 {
            let arc = KurboArc::new(
                center,
                Vec2::new(radius, radius),
                -std::f64::consts::FRAC_PI_2,
                sweep,
                0.0,
            );
            let mut arc_path = BezPath::new();
            arc_path.extend(arc.path_elements(PATH_TOLERANCE));
            scene.fill_path(
                stroke_path(&arc_path, stroke_w),
                palette::ACCENT.with_opacity(ring_opacity),
            );
        }

        scene.text(
            view.time_left_secs.to_string(),
            (radius * 0.9) as f32,
            center,
            palette::TEXT.with_opacity(ring_opacity),
            (radius * 2.0) as f32,
            TextAlign::Center,
        );
    }

    if check_opacity > 0.0 {
        let s = radius / 50.0;
        if let Ok(mut check) = BezPath::from_svg(
            "M 14 52 L 40 78 L 86 26 L 78 18 L 40 62 L 22 44 Z",
        ) {
            check.apply_affine(kurbo::Affine::translate((
                center.x - 50.0 * s,
                center.y - 50.0 * s,
            )) * kurbo::Affine::scale(s));
            scene.fill_path(check, palette::CORRECT.with_opacity(check_opacity));
        }

        let rise = 24.0 * (1.0 - ease_out_quad(view.reveal_progress));
        let answer = &frame.slide.options[frame
            .slide
            .correct_answer_index
            .min(frame.slide.options.len() - 1)];
        scene.text(
            answer.clone(),
            (radius * 0.5) as f32,
            Point::new(center.x, center.y + radius * 1.5 + rise),
            palette::ACCENT.with_opacity(check_opacity),
            (radius * 6.0) as f32,
            TextAlign::Center,
        );
    }
}

fn stroke_path(path: &BezPath, width: f64) -> BezPath {
    kurbo::stroke(
        path.iter(),
        &Stroke::new(width),
        &StrokeOpts::default(),
        PATH_TOLERANCE,
    )
}

fn broadcast(frame: &SlideFrame<'_>) -> Scene {
    let (w, h) = (
        f64::from(frame.config.width),
        f64::from(frame.config.height),
    );
    let view = frame.view();
    let mut scene = Scene::new();

    scene.fill_rect(Rect::new(0.0, 0.0, w, h), palette::BACKDROP);

    // Status bar: position in the run plus the difficulty badge.
    let bar_h = h * 0.075;
    scene.fill_rect(Rect::new(0.0, 0.0, w, bar_h), Rgba8::new(0, 0, 0, 120));
    scene.text(
        format!(
            "Question {} / {}",
            frame.slide_index + 1,
            frame.slide_count
        ),
        (bar_h * 0.45) as f32,
        Point::new(w * 0.03, bar_h * 0.28),
        palette::TEXT,
        (w * 0.4) as f32,
        TextAlign::Left,
    );
    if let Some(difficulty) = &frame.slide.difficulty {
        let badge_w = w * 0.11;
        scene.fill_rect(
            Rect::new(w * 0.86, bar_h * 0.2, w * 0.86 + badge_w, bar_h * 0.8),
            palette::BADGE,
        );
        scene.text(
            difficulty.to_uppercase(),
            (bar_h * 0.32) as f32,
            Point::new(w * 0.86 + badge_w / 2.0, bar_h * 0.5),
            Rgba8::opaque(20, 20, 20),
            badge_w as f32,
            TextAlign::Center,
        );
    }
    scene.text(
        format!("{}", view.time_left_secs),
        (bar_h * 0.55) as f32,
        Point::new(w * 0.5, bar_h * 0.5),
        palette::ACCENT,
        (w * 0.1) as f32,
        TextAlign::Center,
    );

    scene.text(
        frame.slide.question.clone(),
        (h * 0.045) as f32,
        Point::new(w * 0.04, h * 0.14),
        palette::TEXT,
        (w * 0.55) as f32,
        TextAlign::Left,
    );

    // Bordered frame around the slide image, right column.
    let frame_rect = Rect::new(w * 0.64, h * 0.12, w * 0.96, h * 0.58);
    scene.fill_rect(frame_rect.inflate(4.0, 4.0), palette::ACCENT);
    if frame.has_image {
        scene.image(frame.slide_index, frame_rect, 1.0);
    } else {
        scene.fill_rect(frame_rect, palette::BACKDROP);
    }

    // Left column of options with the staggered entrance.
    let row_h = h * 0.075;
    let gap = h * 0.02;
    let row_w = w * 0.55;
    let x0 = w * 0.04;
    let mut y = h * 0.28;
    for (i, option) in frame.slide.options.iter().enumerate() {
        let entrance = stagger_opacity(frame.timing, frame.t_ms, i);
        if entrance > 0.0 {
            let (bg, fg) = option_style(i, frame.slide.correct_answer_index, &view);
            scene.fill_rect(
                Rect::new(x0, y, x0 + row_w, y + row_h),
                bg.with_opacity(entrance),
            );
            scene.text(
                option_label(i, option),
                (row_h * 0.42) as f32,
                Point::new(x0 + row_w * 0.03, y + row_h * 0.30),
                fg.with_opacity(entrance),
                (row_w * 0.94) as f32,
                TextAlign::Left,
            );
        }
        y += row_h + gap;
    }

    // Bottom bar depleting over the thinking phase.
    let remaining = 1.0 - view.progress;
    let bh = h * 0.025;
    scene.fill_rect(Rect::new(0.0, h - bh, w, h), palette::BAR_TRACK);
    scene.fill_rect(
        Rect::new(0.0, h - bh, w * remaining, h),
        bar_color(remaining),
    );

    scene
}
