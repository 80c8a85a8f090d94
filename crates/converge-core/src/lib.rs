//! Converge: reconciliation and convergence core
//!
//! Reusable building blocks for resource providers that manage objects on a
//! remote control-plane API:
//!
//! - **Set reconciliation**: minimal add/remove delta between a desired and an
//!   observed keyed collection (labels, space roles, collaborators)
//! - **Constraint normalization**: "all items" flag vs. explicit subset list
//! - **Convergence polling**: bounded, cancellable wait for asynchronous
//!   remote operations to reach a terminal status
//!
//! # Architecture
//!
//! ```text
//!   desired config
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  constraint  │──▶│  reconcile   │──▶│ RemoteCollection │──▶│    poller    │
//! │  normalize() │   │ reconcile()  │   │ / AsyncOperation │   │ await_conv.. │
//! └──────────────┘   └──────────────┘   └──────────────────┘   └──────────────┘
//!                                               │
//!                                               ▼
//!                                       remote REST API
//! ```

pub mod api;
pub mod constraint;
pub mod error;
pub mod item;
pub mod poller;
pub mod reconcile;

// Re-exports
pub use api::{
    AsyncOperationApi, RemoteCollection, converge_collection, create_or_set, run_to_convergence,
};
pub use constraint::{ConstraintPair, Flag, Scope, normalize};
pub use error::{ApiError, ConstraintError, ConvergenceError, DuplicateKeyError, Error, Result};
pub use item::{Collaborator, Keyed, Label, SpaceRole};
pub use poller::{
    Clock, PollSettings, PollState, PollableOperation, TerminalStates, TokioClock,
    await_convergence, await_convergence_with,
};
pub use reconcile::{Collection, Delta, DeltaSummary, reconcile, reconcile_by};

// Callers need the same token type the poller selects on
pub use tokio_util::sync::CancellationToken;
