//! Core groups endpoint handler.
//!
//! This module provides the `/groups` endpoint handler that returns the
//! active core group table as JSON.

use axum::{extract::State, Json};
use herakles_rdt_exporter::{rangelist, CoreGroup, EventMask};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct GroupEntry {
    pub description: String,
    pub instance: String,
    pub cores: Vec<u32>,
    pub cores_list: String,
    pub events: EventMask,
}

impl From<&CoreGroup> for GroupEntry {
    fn from(group: &CoreGroup) -> Self {
        let cores: Vec<u64> = group.cores().iter().map(|&c| u64::from(c)).collect();
        Self {
            description: group.description().to_string(),
            instance: herakles_rdt_exporter::sink::instance_label(group.description()),
            cores: group.cores().to_vec(),
            cores_list: rangelist::render(&cores),
            events: group.events(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub host: String,
    pub backend: &'static str,
    pub available_events: Option<EventMask>,
    pub capacity: usize,
    pub groups: Vec<GroupEntry>,
}

/// Handler for the /groups endpoint.
#[instrument(skip(state))]
pub async fn groups_handler(State(state): State<SharedState>) -> Json<GroupsResponse> {
    debug!("Processing /groups request");

    let monitor = match state.monitor.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    Json(GroupsResponse {
        host: monitor.host().to_string(),
        backend: monitor.backend_name(),
        available_events: monitor.available_events(),
        capacity: monitor.table().capacity(),
        groups: monitor.table().iter().map(GroupEntry::from).collect(),
    })
}
