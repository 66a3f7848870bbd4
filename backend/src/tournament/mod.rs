pub mod broadcasts;
pub mod context;
pub mod lifecycle;
pub mod manager;
pub mod model;
pub mod orchestrator;
pub mod pairing;
pub mod player;
pub mod registration;
pub mod scoring;

pub use context::TournamentContext;
pub use lifecycle::Tournament;
pub use manager::{TournamentManager, TournamentSummary};
pub use model::{TournamentConfig, TournamentLength, TournamentStatus, TournamentSystem};
pub use orchestrator::{GameOrchestrator, GameTicket};
pub use pairing::{ByeCredit, Pairing, PairingStrategy, RoundPlan};
pub use player::TournamentPlayer;
