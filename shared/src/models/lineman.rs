use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "lineman_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LinemanStatus {
    Active,
    Busy,
    Inactive,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: Option<String>,
    pub radio: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub substation: String,
    pub work_type: Option<String>,
    pub priority: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// A field worker whose position and assignment are tracked on the live map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineman {
    pub id: String,
    pub name: String,
    pub employee_id: String,
    pub team: String,
    pub specialization: String,
    pub status: LinemanStatus,
    pub current_location: Option<GeoPoint>,
    pub contact: Contact,
    pub equipment: Vec<String>,
    pub assignment: Option<Assignment>,
    pub last_update: DateTime<Utc>,
}

/// Flat row shape of the `linemen` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinemanRow {
    pub id: String,
    pub name: String,
    pub employee_id: String,
    pub team: String,
    pub specialization: String,
    pub status: LinemanStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub radio: Option<String>,
    pub equipment: Vec<String>,
    pub assignment_substation: Option<String>,
    pub assignment_work_type: Option<String>,
    pub assignment_priority: Option<String>,
    pub assignment_estimated_completion: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
}

impl From<LinemanRow> for Lineman {
    fn from(row: LinemanRow) -> Self {
        // A half-written coordinate pair is treated as no location at all.
        let current_location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        let assignment = row.assignment_substation.map(|substation| Assignment {
            substation,
            work_type: row.assignment_work_type,
            priority: row.assignment_priority,
            estimated_completion: row.assignment_estimated_completion,
        });

        Self {
            id: row.id,
            name: row.name,
            employee_id: row.employee_id,
            team: row.team,
            specialization: row.specialization,
            status: row.status,
            current_location,
            contact: Contact {
                phone: row.phone,
                radio: row.radio,
            },
            equipment: row.equipment,
            assignment,
            last_update: row.last_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(latitude: Option<f64>, longitude: Option<f64>) -> LinemanRow {
        LinemanRow {
            id: "lm-1".into(),
            name: "Ramesh Patel".into(),
            employee_id: "LP-7341".into(),
            team: "Alpha Team".into(),
            specialization: "High Voltage".into(),
            status: LinemanStatus::Active,
            latitude,
            longitude,
            phone: Some("9876543210".into()),
            radio: None,
            equipment: vec!["Voltage Tester".into()],
            assignment_substation: None,
            assignment_work_type: Some("ignored without a substation".into()),
            assignment_priority: None,
            assignment_estimated_completion: None,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn partial_coordinates_mean_no_location() {
        assert!(Lineman::from(row(Some(23.0), None)).current_location.is_none());
        assert_eq!(
            Lineman::from(row(Some(23.0), Some(72.55))).current_location,
            Some(GeoPoint {
                latitude: 23.0,
                longitude: 72.55
            })
        );
    }

    #[test]
    fn assignment_requires_a_substation() {
        assert!(Lineman::from(row(None, None)).assignment.is_none());
    }

    #[test]
    fn geo_point_range_checks() {
        assert!(GeoPoint { latitude: 23.0, longitude: 72.5 }.is_valid());
        assert!(!GeoPoint { latitude: 91.0, longitude: 0.0 }.is_valid());
        assert!(!GeoPoint { latitude: 0.0, longitude: -180.5 }.is_valid());
        assert!(!GeoPoint { latitude: f64::NAN, longitude: 0.0 }.is_valid());
    }
}
