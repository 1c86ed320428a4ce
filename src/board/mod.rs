//! Board domain logic: positions, moves, recurrence and the service facade.

pub mod deps;
pub mod moves;
pub mod position;
pub mod recurrence;
pub mod service;

pub use moves::{MoveCommand, MoveOutcome, MoveRequest, reconcile};
pub use position::allocate;
pub use recurrence::{SweepReport, run_sweep};
pub use service::BoardService;
