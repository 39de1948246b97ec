pub mod constants;
pub mod decay;
pub mod elo;
pub mod glicko;
pub mod glicko2;
pub mod period;
pub mod polyrating;
pub mod processor;
pub mod rating_system;
pub mod rating_tracker;
pub mod structures;
pub mod trueskill;
