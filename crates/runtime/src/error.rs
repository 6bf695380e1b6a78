// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    A2AJob(#[from] mesh_a2a::A2AJobError),

    #[error(transparent)]
    A2AConcurrency(#[from] mesh_a2a::A2AConcurrencyError),

    #[error(transparent)]
    Task(#[from] mesh_store::TaskStoreError),

    #[error("failed to create state directory {path}: {source}")]
    StateDir { path: String, #[source] source: std::io::Error },
}
