pub mod persist;
pub mod produce;
pub mod score;

pub use persist::PersistStage;
pub use produce::ProduceStage;
pub use score::ScoreStage;
