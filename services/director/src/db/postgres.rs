//! Postgres-backed repository.

use async_trait::async_trait;
use sqlx::{postgres::PgPool, postgres::PgRow, Row};
use uuid::Uuid;

use super::models::{
    AppliedSpec, DeploymentRecord, InstanceAddress, InstanceRecord, InstanceState, VmRecord, VmRef,
};
use super::{DbError, Repository};

const INSTANCE_SELECT: &str = r#"
    SELECT
        i.id, i.uuid, i.deployment_id, i.job, i."index", i.availability_zone,
        i.state, i.resurrection_paused, i.applied_spec,
        v.id AS vm_id, v.cid AS vm_cid, v.agent_id AS vm_agent_id, v.active AS vm_active
    FROM instances i
    LEFT JOIN vms v ON v.id = i.vm_id
"#;

/// Repository over the director's Postgres schema.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn deployments(&self) -> Result<Vec<DeploymentRecord>, DbError> {
        let rows = sqlx::query_as::<_, DeploymentRow>(
            "SELECT id, name, teams FROM deployments ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn deployment(&self, name: &str) -> Result<Option<DeploymentRecord>, DbError> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            "SELECT id, name, teams FROM deployments WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(row.map(|r| r.0))
    }

    async fn instances(&self, deployment_id: i64) -> Result<Vec<InstanceRecord>, DbError> {
        let sql = format!(
            r#"{INSTANCE_SELECT} WHERE i.deployment_id = $1 ORDER BY i.job, i."index" NULLS LAST, i.id"#
        );
        let rows = sqlx::query_as::<_, InstanceRow>(&sql)
            .bind(deployment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(rows.into_iter().map(InstanceRow::into_record).collect())
    }

    async fn vms(&self, deployment_id: i64) -> Result<Vec<VmRecord>, DbError> {
        let rows = sqlx::query_as::<_, VmRow>(
            r#"
            SELECT id, deployment_id, agent_id, cid, instance_id, active
            FROM vms
            WHERE deployment_id = $1
            ORDER BY id
            "#,
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn instance_by_job_index(
        &self,
        deployment_id: i64,
        job: &str,
        index: u32,
    ) -> Result<Option<InstanceRecord>, DbError> {
        // The column is INTEGER; nothing larger can be stored.
        let Ok(index) = i32::try_from(index) else {
            return Ok(None);
        };
        let sql = format!(
            r#"{INSTANCE_SELECT} WHERE i.deployment_id = $1 AND i.job = $2 AND i."index" = $3 LIMIT 1"#
        );
        let row = sqlx::query_as::<_, InstanceRow>(&sql)
            .bind(deployment_id)
            .bind(job)
            .bind(index)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(row.map(InstanceRow::into_record))
    }

    async fn instance_by_vm(&self, vm_id: i64) -> Result<Option<InstanceRecord>, DbError> {
        let sql = format!("{INSTANCE_SELECT} WHERE i.vm_id = $1 LIMIT 1");
        let row = sqlx::query_as::<_, InstanceRow>(&sql)
            .bind(vm_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(row.map(InstanceRow::into_record))
    }

    async fn instance_by_agent_id(
        &self,
        agent_id: &str,
    ) -> Result<Option<InstanceRecord>, DbError> {
        let sql = format!("{INSTANCE_SELECT} WHERE v.agent_id = $1 LIMIT 1");
        let row = sqlx::query_as::<_, InstanceRow>(&sql)
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(row.map(InstanceRow::into_record))
    }

    async fn set_resurrection_paused(&self, instance_id: i64, paused: bool) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE instances SET resurrection_paused = $2 WHERE id = $1")
            .bind(instance_id)
            .bind(paused)
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("instance {instance_id}")));
        }
        Ok(())
    }

    async fn dns_record_names(&self, ips: &[String]) -> Result<Vec<String>, DbError> {
        if ips.is_empty() {
            return Ok(Vec::new());
        }

        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM dns_records WHERE type = 'A' AND content = ANY($1) ORDER BY id",
        )
        .bind(ips)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(names)
    }

    async fn instance_addresses(
        &self,
        deployment_id: i64,
    ) -> Result<Vec<InstanceAddress>, DbError> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT
                i.uuid, i."index", i.job, i.availability_zone,
                a.network_name, d.name AS deployment, a.address
            FROM ip_addresses a
            JOIN instances i ON i.id = a.instance_id
            JOIN deployments d ON d.id = i.deployment_id
            WHERE i.deployment_id = $1
            ORDER BY i.job, i."index" NULLS LAST, a.id
            "#,
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn next_dns_version(&self) -> Result<i64, DbError> {
        sqlx::query_scalar::<_, i64>("SELECT nextval('local_dns_version_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

fn index_from_column(raw: Option<i32>) -> Option<u32> {
    raw.and_then(|i| u32::try_from(i).ok())
}

struct DeploymentRow(DeploymentRecord);

impl<'r> sqlx::FromRow<'r, PgRow> for DeploymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(DeploymentRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            teams: row.try_get("teams")?,
        }))
    }
}

struct InstanceRow {
    record: InstanceRecord,
}

impl InstanceRow {
    fn into_record(self) -> InstanceRecord {
        self.record
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for InstanceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let state: String = row.try_get("state")?;
        let state = InstanceState::parse(&state).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "state".to_string(),
            source: format!("unknown instance state '{state}'").into(),
        })?;

        let applied_spec: Option<serde_json::Value> = row.try_get("applied_spec")?;
        let applied_spec = applied_spec
            .map(serde_json::from_value::<AppliedSpec>)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "applied_spec".to_string(),
                source: Box::new(e),
            })?;

        let vm_id: Option<i64> = row.try_get("vm_id")?;
        let vm = match vm_id {
            Some(id) => Some(VmRef {
                id,
                cid: row.try_get("vm_cid")?,
                agent_id: row.try_get("vm_agent_id")?,
                active: row.try_get("vm_active")?,
            }),
            None => None,
        };

        Ok(Self {
            record: InstanceRecord {
                id: row.try_get("id")?,
                uuid: row.try_get::<Uuid, _>("uuid")?,
                deployment_id: row.try_get("deployment_id")?,
                job: row.try_get("job")?,
                index: index_from_column(row.try_get("index")?),
                az: row.try_get("availability_zone")?,
                state,
                resurrection_paused: row.try_get("resurrection_paused")?,
                vm,
                applied_spec,
            },
        })
    }
}

struct VmRow(VmRecord);

impl<'r> sqlx::FromRow<'r, PgRow> for VmRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(VmRecord {
            id: row.try_get("id")?,
            deployment_id: row.try_get("deployment_id")?,
            agent_id: row.try_get("agent_id")?,
            cid: row.try_get("cid")?,
            instance_id: row.try_get("instance_id")?,
            active: row.try_get("active")?,
        }))
    }
}

struct AddressRow(InstanceAddress);

impl<'r> sqlx::FromRow<'r, PgRow> for AddressRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(InstanceAddress {
            uuid: row.try_get("uuid")?,
            index: index_from_column(row.try_get("index")?),
            instance_group: row.try_get("job")?,
            az: row.try_get("availability_zone")?,
            network: row.try_get("network_name")?,
            deployment: row.try_get("deployment")?,
            ip: row.try_get("address")?,
        }))
    }
}
