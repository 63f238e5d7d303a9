//! # Forgegate
//!
//! The access-control core of a self-hosted code hosting service:
//! effective permissions for users against repositories, resolved from
//! ownership, direct collaborations, organization teams and site-admin
//! status, and cached in an incrementally rebuilt access projection.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! forgegate = "0.1"
//! ```
//!
//! ```rust,ignore
//! use forgegate::config::ServiceConfig;
//! use forgegate::store::SqliteStore;
//! use forgegate::{access, perm, repo, types::*};
//!
//! let store = SqliteStore::open("./data/forgegate.db")?;
//! store.initialize()?;
//! let config = ServiceConfig::default();
//!
//! // Mutations run inside one transaction per operation.
//! let (user, repository) = store.with_txn(|s| {
//!     let owner = s.create_user("ada")?;
//!     let repository =
//!         repo::create_repository(s, &config, &Owner::User(owner.clone()), "engine", true, &[])?;
//!     Ok((owner, repository))
//! })?;
//!
//! // Reads resolve from the projection.
//! let permission = store.with_read(|s| {
//!     perm::get_user_repo_permission(s, &repository, Some(&user))
//! })?;
//! assert!(permission.can_write(UnitType::Code));
//! ```

pub mod access;
pub mod cancel;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod org;
pub mod perm;
pub mod repair;
pub mod repo;
pub mod store;
pub mod team;
pub mod types;
pub mod watch;
