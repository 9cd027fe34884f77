// tests/solver.rs
use std::f64::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pendulum_core::store::{MemoryRemote, RetryPolicy, UploadQueue, Uploader};
use pendulum_core::systems::sdk::{ForceQueue, ForceSource};
use pendulum_core::systems::solver::{
    AiController, AiMode, LESSONS, LessonPhase, MetricSample, MetricsBuffer, SolverConfig, Tutorial, TutorialConfig,
    TutorialStatus,
};
use proptest::prelude::*;

const DT: f64 = 1.0 / 60.0;
const THRESHOLD: f64 = 0.35;

fn controller(mode: AiMode, difficulty: f64) -> AiController {
    let mut ai = AiController::new(SolverConfig::default());
    ai.set_mode(mode, difficulty);
    ai
}

/// One AI frame into a fresh queue; returns the AI impulse queued.
fn frame(ai: &mut AiController, theta: f64, theta_dot: f64, time: f64, player: f64) -> f64 {
    let mut q = ForceQueue::new();
    ai.update(theta, theta_dot, time, player, THRESHOLD, &mut q);
    q.total_from(ForceSource::Ai)
}

/* ──────────────────────────────────────────────────────────────────────────
1) Mode scaling
────────────────────────────────────────────────────────────────────────── */

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn helper_is_silent_inside_the_dead_zone(
        difficulty in 0.0f64..=1.0,
        warmup in prop::collection::vec((-1.2f64..1.2, -3.0f64..3.0, -1.0f64..1.0), 0..240),
        dev_frac in -1.0f64..=1.0,
        theta_dot in -10.0f64..10.0,
    ) {
        let cfg = SolverConfig::default();
        let mut ai = controller(AiMode::Helper, difficulty);

        // arbitrary history so assistance and metrics have moved
        let mut t = 0.0;
        for (dev, w, push) in warmup {
            t += DT;
            frame(&mut ai, PI + dev, w, t, push);
        }

        let theta = PI + dev_frac * cfg.helper_dead_zone;
        let emitted = frame(&mut ai, theta, theta_dot, t + DT, 0.0);
        prop_assert_eq!(emitted, 0.0);
        prop_assert_eq!(ai.last_force(), 0.0);
    }
}

#[test]
fn helper_outside_the_dead_zone_is_a_scaled_corrective_push() {
    let cfg = SolverConfig::default();
    let mut helper = controller(AiMode::Helper, 0.0);
    let mut demo = controller(AiMode::Demo, 0.0);

    let h = frame(&mut helper, PI + 0.3, 0.0, 0.0, 0.0);
    let d = frame(&mut demo, PI + 0.3, 0.0, 0.0, 0.0);

    assert!(d < 0.0, "demo should push back toward upright, got {d}");
    assert!((h - d * cfg.helper_scale).abs() < 1e-12);
}

#[test]
fn competition_pushes_away_from_upright() {
    let mut ai = controller(AiMode::Competition, 0.5);
    assert!(frame(&mut ai, PI + 0.2, 0.0, 0.0, 0.0) > 0.0);
    assert!(frame(&mut ai, PI - 0.2, 0.0, DT, 0.0) < 0.0);
}

#[test]
fn off_mode_emits_nothing_and_buffers_nothing() {
    let mut ai = controller(AiMode::Off, 0.5);
    for i in 0..120 {
        assert_eq!(frame(&mut ai, PI + 0.5, 1.0, i as f64 * DT, 0.3), 0.0);
    }
    assert!(ai.latest_metrics().is_none());
    assert_eq!(ai.training_len(), 0);
    assert!(ai.on_session_end(Utc::now()).is_none());
}

#[test]
fn demo_balances_an_undisturbed_pendulum() {
    use pendulum_core::systems::physics::PendulumModel;

    let mut ai = controller(AiMode::Demo, 0.5);
    let mut model = PendulumModel::default();
    model.reset_with_angle(PI + 0.25);
    let mut q = ForceQueue::new();

    for i in 0..600 {
        for e in q.drain() {
            model.apply_force(e.magnitude);
        }
        model.step(DT);
        let s = model.state();
        ai.update(s.theta, s.theta_dot, i as f64 * DT, 0.0, THRESHOLD, &mut q);
    }
    let dev = pendulum_core::mechanics::deviation(model.state().theta);
    assert!(dev.abs() < 0.01, "still {dev} rad off upright");
    let m = ai.latest_metrics().copied().unwrap();
    assert!(m.stability_score > 90.0);
}

/* ──────────────────────────────────────────────────────────────────────────
2) Metrics reduction
────────────────────────────────────────────────────────────────────────── */

fn sample(dev: f64, time: f64, player_force: f64) -> MetricSample {
    MetricSample { theta: PI + dev, theta_dot: 0.0, player_force, time }
}

#[test]
fn metrics_reduce_stability_reaction_efficiency_and_overcorrection() {
    let mut buf = MetricsBuffer::new(300);
    buf.push(sample(0.0, 0.0, 0.0));
    buf.push(sample(0.5, 1.0, 0.0)); // instability onset
    buf.push(sample(0.5, 1.5, -1.0)); // opposing push, 0.5 s later
    buf.push(sample(-0.3, 2.0, 0.0)); // overshoot past half the threshold

    let m = buf.reduce(THRESHOLD, 2.0, 3).unwrap();
    assert!((m.stability_score - 50.0).abs() < 1e-9);
    assert!((m.average_reaction_time - 0.5).abs() < 1e-9);
    assert_eq!(m.force_efficiency, 1.0);
    assert_eq!(m.overcorrection_rate, 1.0);
    assert_eq!(m.level, 3);
}

#[test]
fn metrics_without_pushes_use_neutral_defaults() {
    let mut buf = MetricsBuffer::new(10);
    assert!(buf.reduce(THRESHOLD, 0.0, 1).is_none());
    for i in 0..4 {
        buf.push(sample(0.0, i as f64, 0.0));
    }
    let m = buf.reduce(THRESHOLD, 4.0, 1).unwrap();
    let d = pendulum_core::systems::solver::PlayerMetrics::default();
    assert_eq!(m.stability_score, 100.0);
    assert_eq!(m.force_efficiency, d.force_efficiency);
    assert_eq!(m.overcorrection_rate, d.overcorrection_rate);
    assert_eq!(m.average_reaction_time, d.average_reaction_time);
}

#[test]
fn metrics_buffer_is_bounded() {
    let mut buf = MetricsBuffer::new(3);
    for i in 0..10 {
        buf.push(sample(if i < 7 { 1.0 } else { 0.0 }, i as f64, 0.0));
    }
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.reduce(THRESHOLD, 10.0, 1).unwrap().stability_score, 100.0);
}

#[test]
fn metrics_flush_about_once_a_second() {
    let mut ai = controller(AiMode::Demo, 0.5);
    frame(&mut ai, PI, 0.0, 0.5, 0.0);
    assert!(ai.latest_metrics().is_none());
    frame(&mut ai, PI, 0.0, 1.0, 0.0);
    assert!(ai.latest_metrics().is_some());
}

/* ──────────────────────────────────────────────────────────────────────────
3) Tutorial lessons
────────────────────────────────────────────────────────────────────────── */

/// Feed frames until `done` holds; returns the time reached.
fn drive(tut: &mut Tutorial, t: &mut f64, dev: f64, force: f64, done: impl Fn(&Tutorial) -> bool) {
    let limit = *t + 60.0;
    while !done(tut) {
        assert!(*t < limit, "tutorial stuck in {:?}", tut.status());
        tut.update(PI + dev, 0.0, *t, force, THRESHOLD);
        *t += DT;
    }
}

fn at_lesson(i: usize) -> impl Fn(&Tutorial) -> bool {
    move |tut: &Tutorial| matches!(tut.status(), TutorialStatus::Lesson { index, .. } if index == i)
}

#[test]
fn tutorial_runs_all_lessons_to_finished() {
    let mut tut = Tutorial::new(TutorialConfig::default());
    let mut t = 0.0;
    assert_eq!(tut.status(), TutorialStatus::Lesson { index: 0, phase: LessonPhase::Observation });

    drive(&mut tut, &mut t, 0.0, 0.0, at_lesson(1));
    // five seconds of balance plus the two second display delay
    assert!(t >= LESSONS[0].balance_goal + TutorialConfig::default().advance_delay);

    // leaning right: the hint says push left, and pushing left is credited
    let hint = tut.update(PI + 0.2, 0.0, t, 0.0, THRESHOLD).unwrap();
    assert_eq!(hint.direction, -1.0);
    assert_eq!(hint.phase, LessonPhase::GuidedPractice);
    let follow_start = t;
    drive(&mut tut, &mut t, 0.2, -0.5, |tut: &Tutorial| tut.follows() >= 3 || tut.pending_advance().is_some());
    // follows are credited at most once per cooldown
    assert!(t - follow_start >= 2.0 * TutorialConfig::default().follow_cooldown);
    drive(&mut tut, &mut t, 0.2, -0.5, at_lesson(2));

    drive(&mut tut, &mut t, 0.0, 0.0, at_lesson(3));
    assert_eq!(tut.ai_scale(), 0.0);

    drive(&mut tut, &mut t, 0.0, 0.0, |tut: &Tutorial| tut.is_finished());
    assert_eq!(tut.status(), TutorialStatus::Finished);
    assert_eq!(tut.progress(), 1.0);
    assert!(tut.update(PI, 0.0, t, 0.0, THRESHOLD).is_none());
}

#[test]
fn cancelling_drops_a_scheduled_advance() {
    let mut tut = Tutorial::new(TutorialConfig::default());
    let mut t = 0.0;
    drive(&mut tut, &mut t, 0.0, 0.0, |tut: &Tutorial| tut.pending_advance().is_some());

    tut.cancel_pending();
    assert!(tut.pending_advance().is_none());
    assert_eq!(tut.status(), TutorialStatus::Lesson { index: 0, phase: LessonPhase::Observation });
    assert!(tut.progress() > 0.2 && tut.progress() <= 0.25);
}

#[test]
fn switching_modes_restarts_and_cancels_the_tutorial() {
    let mut ai = controller(AiMode::Tutorial, 0.5);
    let mut t = 0.0;
    while ai.tutorial().pending_advance().is_none() {
        frame(&mut ai, PI, 0.0, t, 0.0);
        t += DT;
        assert!(t < 30.0);
    }
    assert!(ai.current_hint().is_some());

    ai.set_mode(AiMode::Helper, 0.5);
    assert!(ai.tutorial().pending_advance().is_none());
    frame(&mut ai, PI, 0.0, t, 0.0);
    assert!(ai.current_hint().is_none());

    ai.set_mode(AiMode::Tutorial, 0.5);
    assert_eq!(ai.tutorial().progress(), 0.0);
}

/* ──────────────────────────────────────────────────────────────────────────
4) Session end: training export and upload
────────────────────────────────────────────────────────────────────────── */

#[test]
fn session_end_exports_and_queues_training_data() {
    let remote = Arc::new(MemoryRemote::new());
    let queue = Rc::new(UploadQueue::spawn(remote.clone(), 8, RetryPolicy::default()).unwrap());

    let mut ai = controller(AiMode::Demo, 0.5);
    ai.set_uploader(Uploader::new(queue, Some("u1".into())));
    ai.on_session_start();
    for i in 0..90 {
        frame(&mut ai, PI + 0.1, 0.0, i as f64 * DT, 0.0);
    }

    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let export = ai.on_session_end(now).unwrap();
    assert_eq!(export.samples.len(), 90);
    assert_eq!(export.summary.control_calls, 90);
    assert_eq!(export.summary.mode, AiMode::Demo);
    assert!(export.final_metrics.is_some());
    assert_eq!(ai.training_len(), 0);

    // dropping the last handle joins the upload worker
    drop(ai);
    assert_eq!(remote.paths(), vec!["users/u1/ai_models/training_2026-03-01T12:00:00Z.json".to_string()]);
}
