// 1. Traits
pub use crate::agent::{AnalyticsCaller, GatewayHealth, LearningAgent};
pub use crate::harness::ClmmExecutor;

// 2. The Core Pipeline Types
pub use crate::data::domain::{
    EpisodeId, EpisodeStatus, ExecMode, Network, Pair, Pool, PoolParams, Regime, RunId,
};
pub use crate::data::episode::{
    DecisionBasis, EpisodeMetadata, EpisodeMetrics, EpisodeResult, Failure, FailureStage,
    IntelHygiene, IntelSnapshot, Proposal, ProposalBuilder, ProposalMetadata,
};
pub use crate::data::envelope::{CacheEnvelope, Quality};
pub use crate::data::registry::{Priority, QueryDescriptor, Registry, Scope};

// 3. Components
pub use crate::artifact::ArtifactWriter;
pub use crate::cache::QualityKv;
pub use crate::config::{Config, Environment, ExecutorChoice, ExpensiveBudgetPolicy, IntelSource};
pub use crate::intelligence::Intelligence;
pub use crate::orchestrator::Orchestrator;
pub use crate::scheduler::{ActivePoolSet, Scheduler, Trigger, TriggerLog};

// 4. Errors
pub use crate::error::{
    AgentError, ExecutorError, IoError, PipelineError, PipelineResult, SchedulerError,
    SchemaError, SystemError, ValidationError,
};
