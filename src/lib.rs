/*!
`pendulum_core`: the real-time core of an inverted-pendulum balance game.

What it does
- Integrates a damped, spring-loaded inverted pendulum with RK4
  (`systems::physics`), π = upright.
- Generates exogenous disturbances from declarative profiles with a grace
  ramp after every activation (`systems::perturbation`).
- Maps level numbers to difficulty for each game mode, ten hand-tuned
  levels then a capped procedural ramp (`systems::level`).
- Runs an AI co-player (off, competition, helper, tutorial, demo) that
  adapts to rolling player metrics (`systems::solver`).
- Wires all of the above into one frame loop with explicit force
  attribution (`systems::session`).
- With the `golden-mode` feature: tiered session recommendations, a
  coherence score, mid-session adaptation and outcome learning
  (`golden`).

How to use (call surface only)
- Build a `SessionLoop` from a `SessionConfig`, a `LevelManager` and an
  `AiController`; call `start`, then `tick(dt)` once per rendered frame and
  `apply_player_force` on input.
- Optionally attach a `StateRecorder` and a `SessionAdapter`
  (`GoldenModeManager` is one).
- Persistence goes through `store::KeyValueStore` and an `UploadQueue`
  over a `store::RemoteStore`; both are host-supplied.

What it does NOT do
- No rendering, audio, UI binding, or account management.
- Never installs a `tracing` subscriber.
*/

pub mod config;
pub mod error;
pub mod mechanics;
pub mod store;
pub mod systems;

#[cfg(feature = "golden-mode")]
pub mod golden;

pub use config::EngineConfig;
pub use error::{PersistError, ProfileError};
