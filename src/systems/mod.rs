pub mod sdk;
pub mod physics;
pub mod perturbation;
pub mod level;
pub mod solver;
pub mod session;
