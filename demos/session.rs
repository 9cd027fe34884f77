// demos/session.rs
// Run with:
//   RUST_LOG=pendulum_core=debug cargo run --example session

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use chrono::Utc;
use pendulum_core::EngineConfig;
use pendulum_core::golden::{GoldenModeManager, MemoryHistory, Providers, SessionResult};
use pendulum_core::store::{MemoryRemote, MemoryStore, RetryPolicy, UploadQueue, Uploader};
use pendulum_core::systems::level::LevelManager;
use pendulum_core::systems::sdk::{StateRecorder, StateSample};
use pendulum_core::systems::session::{SessionLoop, SessionStatus};
use pendulum_core::systems::solver::AiController;
use tracing_subscriber::EnvFilter;

/// Prints one line per recorded second.
struct Printer {
    next: f64,
}

impl StateRecorder for Printer {
    fn record_state(&mut self, s: &StateSample) {
        if s.time >= self.next {
            println!(
                "t={:5.1}s  θ={:+.3}  ω={:+.3}  balanced={}  ai={:+.4}",
                s.time, s.angle, s.angle_velocity, s.is_balanced, s.ai_force
            );
            self.next += 1.0;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pendulum_core=info")))
        .init();

    let cfg = EngineConfig::from_json_str(r#"{ "session": { "seed": 42 } }"#).expect("valid config");

    // Persistence: in-memory local store, in-memory remote behind the queue.
    let store = Rc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    let queue = Rc::new(UploadQueue::spawn(remote.clone(), 32, RetryPolicy::default()).expect("spawn uploader"));
    let uploader = Uploader::new(queue, Some("demo-user".into()));

    // Golden Mode: six prior sessions, no health or maze data.
    let history = MemoryHistory { session_count: 6, max_level: 3, ..Default::default() };
    let providers = Providers { history: Some(Rc::new(history)), ..Providers::default() };
    let mut golden = GoldenModeManager::new(cfg.golden, providers).with_store(store.clone());
    golden.set_uploader(Some(uploader.clone()));

    let rec = golden.generate_recommendation();
    println!("== Recommendation ({}) ==", rec.tier.label());
    println!("Focus      -> {} ({:.0}%)", rec.focus_area.display_name(), rec.confidence_score * 100.0);
    println!("Why        -> {}", rec.rationale);
    println!("Game       -> {:?} / AI {:?} @ {:.2}", rec.config.game_mode, rec.config.ai_mode, rec.config.ai_difficulty);
    println!("Coherence  -> {:.1}", golden.compute_coherence());

    // Session built from the recommendation.
    let mut levels = LevelManager::with_store(rec.config.game_mode, cfg.session.seed, store.clone());
    levels.set_level(rec.config.suggested_level);
    let mut ai = AiController::new(cfg.solver);
    ai.set_mode(rec.config.ai_mode, rec.config.ai_difficulty);
    ai.set_uploader(uploader);

    golden.on_session_start(Some(rec));
    let golden = Rc::new(RefCell::new(golden));

    let mut session = SessionLoop::new(cfg.session, levels, ai);
    session.set_recorder(Box::new(Printer { next: 0.0 }));
    session.set_adapter(golden.clone());
    session.start();

    let dt = 1.0 / 60.0;
    let mut completed = 0;
    for _ in 0..(60 * 60) {
        // a nervous player: small pushes against the lean
        let lean = pendulum_core::mechanics::deviation(session.state().theta);
        if lean.abs() > 0.1 {
            session.apply_player_force(-0.05 * lean.signum());
        }
        let r = session.tick(dt);
        if r.completed_level.is_some() {
            completed += 1;
        }
        if r.status != SessionStatus::Running {
            break;
        }
    }

    let metrics = session.ai().latest_metrics().copied().unwrap_or_default();
    let result = SessionResult {
        duration: session.elapsed(),
        completed: session.status() == SessionStatus::Running,
        levels_completed: completed,
        final_stability: session.recent_stability(),
        final_reaction_time: metrics.average_reaction_time,
        score: session.score(),
    };
    let status = session.status();
    session.end(Utc::now());

    let outcome = golden.borrow_mut().on_session_end(result);
    println!("== Session ==");
    println!("Status     -> {status:?}");
    println!("Score      -> {}", result.score);
    println!("Levels     -> {completed}");
    if let Some(o) = outcome {
        println!("Reward     -> {:+.3}", o.reward());
        println!("Coherence  -> {:.1}", o.coherence_score_end);
    }

    // Dropping the last queue handle flushes the uploads.
    drop(session);
    drop(golden);
    println!("== Uploaded ==");
    for path in remote.paths() {
        println!("{path}");
    }
}
