//! Tenant context extraction
//!
//! Authentication happens upstream; requests reach the services with the
//! tenant already resolved into the `X-Tenant-ID` header. Every store read
//! made on behalf of a request is scoped to this tenant.

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request-scoped tenant identity available to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,

    /// Request ID for tracing
    pub request_id: String,
}

impl TenantContext {
    /// Reject access to a record owned by another tenant
    pub fn ensure_owns(&self, owner: Uuid) -> Result<(), AppError> {
        if owner == self.tenant_id {
            Ok(())
        } else {
            Err(AppError::TenantMismatch)
        }
    }
}

fn parse_tenant(parts: &Parts) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(TENANT_HEADER)
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing X-Tenant-ID header".to_string(),
        })?;

    raw.to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid X-Tenant-ID header".to_string(),
        })
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(TenantContext {
            tenant_id: parse_tenant(parts)?,
            request_id,
        })
    }
}
