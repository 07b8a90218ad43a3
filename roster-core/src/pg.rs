//! Postgres-backed [`MembershipStore`] over the `companies` and `employees`
//! tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::collaborators::MembershipStore;
use crate::errors::CollaboratorError;
use crate::tenant::{Membership, MembershipId, Principal, PrincipalId, RoleId, Tenant, TenantId};

const STORE: &str = "membership store";

const MEMBERSHIP_COLUMNS: &str = "e.id::text AS id, e.user_id::text AS user_id, \
     e.company_id::text AS company_id, c.name AS company_name, e.name AS display_name, \
     e.role_id::text AS role_id, e.created_at AS created_at";

fn db_error(err: sqlx::Error) -> CollaboratorError {
    match err {
        sqlx::Error::PoolTimedOut => CollaboratorError::timeout(STORE),
        sqlx::Error::Io(e) => CollaboratorError::unavailable(STORE, e.to_string()),
        sqlx::Error::PoolClosed => CollaboratorError::unavailable(STORE, "pool closed"),
        other => CollaboratorError::backend(STORE, other.to_string()),
    }
}

/// Ids are uuids in the database; anything else cannot match a row.
fn parse_uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

/// Subjects must be uuids here. Any other id is an identity provider
/// misconfiguration, not a principal without companies.
fn principal_uuid(id: &PrincipalId) -> Result<Uuid, CollaboratorError> {
    parse_uuid(id.as_str()).ok_or_else(|| {
        CollaboratorError::misconfigured(STORE, format!("principal id {:?} is not a uuid", id.as_str()))
    })
}

fn membership_from_row(row: &PgRow) -> Result<Membership, CollaboratorError> {
    let role_id: Option<String> = row.try_get("role_id").map_err(db_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db_error)?;
    Ok(Membership {
        id: MembershipId::new(row.try_get::<String, _>("id").map_err(db_error)?),
        principal_id: PrincipalId::new(row.try_get::<String, _>("user_id").map_err(db_error)?),
        tenant_id: TenantId::new(row.try_get::<String, _>("company_id").map_err(db_error)?),
        tenant_name: row.try_get("company_name").map_err(db_error)?,
        display_name: row.try_get("display_name").map_err(db_error)?,
        role_id: role_id.map(RoleId::new),
        created_at,
    })
}

pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, CollaboratorError> {
        let pool = PgPool::connect(url).await.map_err(db_error)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the two tables and the one-membership-per-pair index if missing.
    pub async fn ensure_schema(&self) -> Result<(), CollaboratorError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS companies (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS employees (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                user_id UUID NOT NULL,
                name TEXT,
                role_id UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS employees_company_user_idx \
             ON employees(company_id, user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn memberships_for(&self, principal: &PrincipalId) -> Result<Vec<Membership>, CollaboratorError> {
        let user_id = principal_uuid(principal)?;

        let rows = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM employees e \
             JOIN companies c ON c.id = e.company_id \
             WHERE e.user_id = $1 \
             ORDER BY e.created_at, e.id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(membership_from_row).collect()
    }

    async fn has_membership(&self, principal: &PrincipalId, tenant: &TenantId) -> Result<bool, CollaboratorError> {
        let user_id = principal_uuid(principal)?;
        let Some(company_id) = parse_uuid(tenant.as_str()) else {
            return Ok(false);
        };

        let row = sqlx::query("SELECT 1 FROM employees WHERE user_id = $1 AND company_id = $2 LIMIT 1")
            .bind(user_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.is_some())
    }

    async fn membership(&self, id: &MembershipId) -> Result<Option<Membership>, CollaboratorError> {
        let Some(id) = parse_uuid(id.as_str()) else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM employees e \
             JOIN companies c ON c.id = e.company_id \
             WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn create_tenant(&self, name: &str, owner: &Principal) -> Result<(Tenant, Membership), CollaboratorError> {
        let user_id = principal_uuid(&owner.id)?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let company = sqlx::query("INSERT INTO companies (name) VALUES ($1) RETURNING id::text AS id, name")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;
        let tenant = Tenant::new(
            company.try_get::<String, _>("id").map_err(db_error)?,
            company.try_get::<String, _>("name").map_err(db_error)?,
        );

        let employee = sqlx::query(
            "INSERT INTO employees (company_id, user_id, name) VALUES ($1::uuid, $2, $3) \
             RETURNING id::text AS id, created_at",
        )
        .bind(tenant.id.as_str())
        .bind(user_id)
        .bind(owner.member_label())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        let membership = Membership {
            id: MembershipId::new(employee.try_get::<String, _>("id").map_err(db_error)?),
            principal_id: owner.id.clone(),
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            display_name: owner.member_label(),
            role_id: None,
            created_at: employee.try_get("created_at").map_err(db_error)?,
        };
        Ok((tenant, membership))
    }

    async fn delete_tenant(&self, tenant: &TenantId) -> Result<bool, CollaboratorError> {
        let Some(company_id) = parse_uuid(tenant.as_str()) else {
            return Ok(false);
        };

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM employees WHERE company_id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let deleted = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        tx.commit().await.map_err(db_error)?;
        Ok(deleted > 0)
    }

    async fn remove_membership(&self, id: &MembershipId) -> Result<bool, CollaboratorError> {
        let Some(id) = parse_uuid(id.as_str()) else {
            return Ok(false);
        };

        let deleted = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?
            .rows_affected();

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_reported_as_timeouts() {
        assert!(matches!(
            db_error(sqlx::Error::PoolTimedOut),
            CollaboratorError::Timeout { .. }
        ));
        assert!(matches!(
            db_error(sqlx::Error::RowNotFound),
            CollaboratorError::Backend { .. }
        ));
    }

    #[test]
    fn non_uuid_ids_never_reach_the_database() {
        assert!(parse_uuid("not-a-uuid").is_none());
        assert!(parse_uuid("67e55044-10b1-426f-9247-bb680e5fe0c8").is_some());
    }

    #[test]
    fn non_uuid_principals_are_a_misconfiguration() {
        let err = principal_uuid(&PrincipalId::new("u-1")).unwrap_err();
        assert!(matches!(err, CollaboratorError::Misconfigured { .. }));
        assert_eq!(err.collaborator(), STORE);

        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(principal_uuid(&PrincipalId::new(id)).unwrap().to_string(), id);
    }
}
