pub mod angle;
pub mod control;
pub mod energy;
pub mod ode;
pub mod stats;
pub mod stoch;

pub use angle::*;
pub use control::*;
pub use energy::*;
pub use ode::*;
pub use stats::*;
pub use stoch::*;
