use crate::models::{Lineman, LinemanRow, LinemanStatus};
use crate::store::QueryError;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::{Executor, Pool, Postgres};
use tracing::{info, instrument};
use uuid::Uuid;

const LINEMAN_COLUMNS: &str = r"
    id, name, employee_id, team, specialization, status, latitude, longitude, phone, radio,
    equipment, assignment_substation, assignment_work_type, assignment_priority,
    assignment_estimated_completion, last_update
";

pub async fn fetch_active_linemen<'e, E>(executor: E) -> Result<Vec<Lineman>, QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query =
        format!("SELECT {LINEMAN_COLUMNS} FROM linemen WHERE status = $1 ORDER BY name, id");
    let rows = sqlx::query_as::<_, LinemanRow>(&query)
        .bind(LinemanStatus::Active)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Lineman::from).collect())
}

pub async fn fetch_lineman<'e, E>(executor: E, id: &str) -> Result<Lineman, QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {LINEMAN_COLUMNS} FROM linemen WHERE id = $1");
    sqlx::query_as::<_, LinemanRow>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Lineman::from)
        .ok_or_else(|| QueryError::NotFound(id.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The table already had rows; nothing was written.
    Skipped,
    Inserted(usize),
}

struct SampleLineman {
    name: &'static str,
    employee_id: &'static str,
    team: &'static str,
    specialization: &'static str,
    phone: &'static str,
    radio: &'static str,
    equipment: [&'static str; 3],
    substation: &'static str,
    work_type: &'static str,
    priority: &'static str,
    hours_to_complete: i64,
    latitude: f64,
    longitude: f64,
}

const SAMPLE_LINEMEN: [SampleLineman; 3] = [
    SampleLineman {
        name: "Ramesh Patel",
        employee_id: "LP-7341",
        team: "Alpha Team",
        specialization: "High Voltage",
        phone: "9876543210",
        radio: "Alpha-1",
        equipment: ["Insulated Gloves", "Voltage Tester", "Safety Harness"],
        substation: "Vasna Substation",
        work_type: "Transformer Repair",
        priority: "High",
        hours_to_complete: 4,
        latitude: 23.0,
        longitude: 72.55,
    },
    SampleLineman {
        name: "Suresh Kumar",
        employee_id: "LP-8812",
        team: "Bravo Team",
        specialization: "Distribution Lines",
        phone: "9876543211",
        radio: "Bravo-1",
        equipment: ["Crimpers", "Hot Stick", "Bucket Truck"],
        substation: "Gota Substation",
        work_type: "Line Fault Inspection",
        priority: "Medium",
        hours_to_complete: 2,
        latitude: 23.08,
        longitude: 72.53,
    },
    SampleLineman {
        name: "Anil Sharma",
        employee_id: "LP-5256",
        team: "Charlie Team",
        specialization: "Transformer Maintenance",
        phone: "9876543212",
        radio: "Charlie-1",
        equipment: ["Wrenches", "Oil Sampler", "Multimeter"],
        substation: "Naroda Substation",
        work_type: "Routine Check",
        priority: "Low",
        hours_to_complete: 6,
        latitude: 23.07,
        longitude: 72.65,
    },
];

/// Inserts three active sample linemen around Ahmedabad, but only into an empty table.
#[instrument(skip_all)]
pub async fn seed_sample_linemen(pool: &Pool<Postgres>) -> Result<SeedOutcome, QueryError> {
    let mut tx = pool.begin().await?;

    // Serialize concurrent seeders so the emptiness check holds until commit.
    sqlx::query("LOCK TABLE linemen IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let existing = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM linemen)")
        .fetch_one(&mut *tx)
        .await?;
    if existing {
        info!(name: "seed.skipped", "Linemen already exist, skipping sample data");
        return Ok(SeedOutcome::Skipped);
    }

    let now = Utc::now();
    for sample in &SAMPLE_LINEMEN {
        insert_sample(&mut *tx, sample, now).await?;
    }
    tx.commit().await?;

    info!(name: "seed.inserted", count = SAMPLE_LINEMEN.len(), "Sample linemen added");
    Ok(SeedOutcome::Inserted(SAMPLE_LINEMEN.len()))
}

async fn insert_sample<'e, E>(
    executor: E,
    sample: &SampleLineman,
    now: DateTime<Utc>,
) -> Result<(), QueryError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r"
        INSERT INTO linemen (
            id, name, employee_id, team, specialization, status, latitude, longitude,
            phone, radio, equipment, assignment_substation, assignment_work_type,
            assignment_priority, assignment_estimated_completion, last_update
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(sample.name)
    .bind(sample.employee_id)
    .bind(sample.team)
    .bind(sample.specialization)
    .bind(LinemanStatus::Active)
    .bind(sample.latitude)
    .bind(sample.longitude)
    .bind(sample.phone)
    .bind(sample.radio)
    .bind(sample.equipment.map(String::from).to_vec())
    .bind(sample.substation)
    .bind(sample.work_type)
    .bind(sample.priority)
    .bind(now + TimeDelta::hours(sample.hours_to_complete))
    .bind(now)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(QueryError::from)
}
