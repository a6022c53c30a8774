use crate::models::{Contact, GeoPoint, Lineman};
use crate::timestamps::{NOT_AVAILABLE, display_timestamp_or, time_remaining};
use chrono::{DateTime, Utc};
use serde::Serialize;

const NO_ASSIGNMENT: &str = "No Assignment";
const GENERAL_WORK: &str = "General Work";
const DEFAULT_PRIORITY: &str = "MEDIUM";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl MapMarker {
    /// `None` when the lineman has no usable coordinate pair.
    pub fn for_lineman(lineman: &Lineman) -> Option<Self> {
        let GeoPoint {
            latitude,
            longitude,
        } = lineman.current_location.filter(GeoPoint::is_valid)?;

        Some(Self {
            id: lineman.id.clone(),
            latitude,
            longitude,
            label: lineman.name.clone(),
        })
    }
}

pub fn markers_for(linemen: &[Lineman]) -> Vec<MapMarker> {
    linemen.iter().filter_map(MapMarker::for_lineman).collect()
}

/// Detail overlay shown when a marker is selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerDetails {
    pub id: String,
    pub initials: String,
    pub name: String,
    pub employee_id: String,
    pub team: String,
    pub specialization: String,
    pub substation: String,
    pub work_type: String,
    pub priority: String,
    pub time_remaining: String,
    pub contact: Contact,
    pub equipment: Vec<String>,
    pub last_update: String,
}

impl WorkerDetails {
    pub fn from_lineman(lineman: &Lineman, now: DateTime<Utc>) -> Self {
        let assignment = lineman.assignment.as_ref();

        Self {
            id: lineman.id.clone(),
            initials: initials(&lineman.name),
            name: lineman.name.clone(),
            employee_id: lineman.employee_id.clone(),
            team: lineman.team.clone(),
            specialization: lineman.specialization.clone(),
            substation: assignment
                .map_or(NO_ASSIGNMENT, |a| a.substation.as_str())
                .to_string(),
            work_type: assignment
                .and_then(|a| a.work_type.as_deref())
                .unwrap_or(GENERAL_WORK)
                .to_string(),
            priority: assignment
                .and_then(|a| a.priority.as_deref())
                .filter(|p| !p.trim().is_empty())
                .map_or_else(|| DEFAULT_PRIORITY.to_string(), str::to_uppercase),
            time_remaining: time_remaining(assignment.and_then(|a| a.estimated_completion), now),
            contact: lineman.contact.clone(),
            equipment: lineman.equipment.clone(),
            last_update: display_timestamp_or(Some(lineman.last_update), NOT_AVAILABLE),
        }
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
