// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mesh-runtime: the ambient stack around the coordination engine —
//! config loading, logging init, and the `Supervisor` that wires
//! `mesh-core`/`mesh-store`/`mesh-events`/`mesh-a2a`/`mesh-scheduler` into
//! one running system. No CLI and no `main()`: a host process constructs
//! a [`Config`], builds its own [`AgentDriver`]/[`ChannelSender`]/
//! [`AnnounceTargetResolver`]/[`A2APolicy`] adapters, and drives
//! [`Supervisor`] from its own run loop.

pub mod config;
pub mod error;
pub mod logging;
pub mod supervisor;

pub use config::{A2AConfig, Config, ContinuationConfig, Paths, SelfDrivingConfig, SessionReaperConfig};
pub use error::{ConfigError, EngineError};
pub use supervisor::{Adapters, Supervisor};

pub use mesh_core::traits::{A2APolicy, AgentDriver, AgentDriverError, AgentReply, AnnounceTargetResolver, ChannelSendError, ChannelSender, WaitStatus};
