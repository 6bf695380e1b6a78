// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global `tracing` subscriber init. No CLI here, so no `--verbose` flag and
//! no log file rotation — `RUST_LOG` drives the filter, output goes to
//! stderr, and the caller decides where that stream lands.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs the global subscriber exactly once; safe to call from multiple
/// call sites (tests, `Supervisor::run`) without panicking on re-init.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    });
}
