pub mod sdk;
pub mod features;
pub mod recommendation;
pub mod rules;
pub mod scorer;
pub mod classifier;
pub mod coherence;
pub mod outcome;
pub mod manager;

pub use sdk::*;
pub use features::*;
pub use recommendation::*;
pub use rules::*;
pub use scorer::*;
pub use classifier::*;
pub use coherence::*;
pub use outcome::*;
pub use manager::*;
