// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ConversationIndex` (§4.10): a pure [`EventBus`] subscriber that maintains
//! a disk-persisted `(workSessionId, sorted agent pair) -> conversationId`
//! mapping, last-write-wins by event timestamp.

use crate::bus::EventBus;
use mesh_core::{event_types, Clock, ConversationEvent, EventRole};
use mesh_store::AtomicStoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationIndexError {
    #[error(transparent)]
    Atomic(#[from] AtomicStoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationIndexEntry {
    pub conversation_id: String,
    pub updated_at: i64,
}

/// On-disk schema version. Bump if `entries`' value shape changes in a
/// backward-incompatible way.
const INDEX_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default = "default_index_file_version")]
    version: u32,
    #[serde(default)]
    updated_at: i64,
    #[serde(default)]
    entries: BTreeMap<String, ConversationIndexEntry>,
}

fn default_index_file_version() -> u32 {
    INDEX_FILE_VERSION
}

impl Default for IndexFile {
    fn default() -> Self {
        Self { version: INDEX_FILE_VERSION, updated_at: 0, entries: BTreeMap::new() }
    }
}

/// Builds `<workSessionId>::<sorted agent pair joined by "|">`, order
/// insensitive with respect to `a`/`b`.
pub fn route_key(work_session_id: &str, a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{work_session_id}::{first}|{second}")
}

pub struct ConversationIndex<C> {
    state_path: PathBuf,
    lock_dir: PathBuf,
    clock: C,
}

impl<C: Clock + 'static> ConversationIndex<C> {
    pub fn new(state_dir: impl Into<PathBuf>, clock: C) -> Self {
        let state_dir = state_dir.into();
        Self {
            state_path: state_dir.join("a2a-conversation-index.json"),
            lock_dir: state_dir.join("locks"),
            clock,
        }
    }

    /// Register this index as a subscriber of `a2a.send`/`a2a.response`/
    /// `a2a.complete` on `bus`. The index never emits; it only writes.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        for event_type in [event_types::A2A_SEND, event_types::A2A_RESPONSE, event_types::A2A_COMPLETE] {
            let this = self.clone();
            bus.subscribe(event_type, move |event| {
                this.apply(event).map_err(|e| Box::new(e) as _)
            });
        }
    }

    /// Apply one event to the index, ignoring it per §4.10's filters if it
    /// isn't a main-conversation event carrying both a `workSessionId` and
    /// a `conversationId`.
    pub fn apply(&self, event: &ConversationEvent) -> Result<(), ConversationIndexError> {
        if event.event_role() != Some(EventRole::ConversationMain) {
            return Ok(());
        }
        let (Some(work_session_id), Some(conversation_id)) =
            (event.work_session_id(), event.conversation_id())
        else {
            return Ok(());
        };
        let (Some(from), Some(to)) = (event.from_agent(), event.to_agent()) else {
            return Ok(());
        };

        let key = route_key(work_session_id, from, to);
        let event_ts = event.ts;
        let conversation_id = conversation_id.to_string();
        let now_ms = self.clock.epoch_ms() as i64;

        mesh_store::read_modify_write(
            &self.state_path,
            &self.lock_dir,
            "a2a-conversation-index",
            now_ms,
            IndexFile::default,
            move |mut file| {
                let replace = match file.entries.get(&key) {
                    Some(existing) => event_ts > existing.updated_at,
                    None => true,
                };
                if replace {
                    file.entries.insert(
                        key.clone(),
                        ConversationIndexEntry { conversation_id, updated_at: event_ts },
                    );
                }
                file.version = INDEX_FILE_VERSION;
                file.updated_at = now_ms;
                file
            },
        )?;

        Ok(())
    }

    /// Returns `None` when the writer has never run or the file is absent.
    pub fn get_a2a_conversation_id(&self, route_key: &str) -> Option<String> {
        let bytes = std::fs::read(&self.state_path).ok()?;
        let file: IndexFile = serde_json::from_slice(&bytes).ok()?;
        file.entries.get(route_key).map(|e| e.conversation_id.clone())
    }
}

#[cfg(test)]
#[path = "conversation_index_tests.rs"]
mod tests;
