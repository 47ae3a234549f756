//! Reposync GitLab - GitLab as a repository host for reposync
//!
//! Creates private projects initialized with a README and looks projects up
//! by name, using the per-user token handed in with each call.

mod client;
mod error;

pub use client::{GitLabClient, Project};
pub use error::{Error, Result};
