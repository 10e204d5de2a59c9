//! Gates that may stop a message or command before it runs.
//!
//! - **Inhibitors**: staged asynchronous predicates (`all`, `pre`, `post`)
//!   plus the built-in author and restriction checks
//! - **Permissions**: owner and permission lookups for the post stage
//! - **Cooldowns**: per-actor use windows with timed eviction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   Security Module                    │
//! ├──────────────────┬──────────────────┬────────────────┤
//! │   Inhibitors     │   Permissions    │   Cooldowns    │
//! │ all / pre / post │ owner, provider  │ DashMap per    │
//! │ join_all, first  │ static or check  │ actor, tokio   │
//! │ block wins       │ client and user  │ eviction timer │
//! └──────────────────┴──────────────────┴────────────────┘
//! ```

pub mod cooldown;
pub mod inhibitor;
pub mod permissions;

pub use cooldown::CooldownManager;
pub use inhibitor::{BlockReason, Inhibitor, InhibitorSet, InhibitorStage, Verdict, inhibitor_fn};
pub use permissions::{
    PermissionCheck, PermissionProvider, PermissionRequirement, PermissionSide, StaticPermissions,
};
