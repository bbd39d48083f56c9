//! Process-wide wiring: event store, bus, read models, the till and token signing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use tillpoint_auth::{Hs256JwtIssuer, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
use tillpoint_core::TenantId;
use tillpoint_events::{EventEnvelope, InMemoryEventBus};
use tillpoint_infra::command_dispatcher::CommandDispatcher;
use tillpoint_infra::event_store::{EventStore, EventStoreError, InMemoryEventStore, JournalEventStore};
use tillpoint_infra::projections::{Projections, RebuildError, UserReadModel};
use tillpoint_infra::reports::Reports;
use tillpoint_infra::{PosError, Till};

use crate::config::{AppConfig, DEFAULT_ADMIN_PASSWORD};

pub type AppBus = InMemoryEventBus<EventEnvelope<JsonValue>>;
pub type AppTill = Till<Arc<dyn EventStore>, Arc<AppBus>>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not open event journal: {0}")]
    Journal(#[from] EventStoreError),

    #[error("could not rebuild read models: {0}")]
    Rebuild(#[from] RebuildError),

    #[error("could not seed the admin account: {0}")]
    Seed(#[from] PosError),
}

pub struct AppServices {
    pub till: AppTill,
    pub bus: Arc<AppBus>,
    tenant_id: TenantId,
    issuer: Hs256JwtIssuer,
    validator: Arc<dyn JwtValidator>,
    token_ttl: Duration,
}

impl AppServices {
    /// Open the store, replay it into fresh read models and make sure an
    /// admin exists.
    pub fn build(config: &AppConfig) -> Result<Self, StartupError> {
        let store: Arc<dyn EventStore> = match &config.journal_path {
            Some(path) => {
                info!(path = %path.display(), "using event journal");
                Arc::new(JournalEventStore::open(path)?)
            }
            None => {
                warn!("TILLPOINT_JOURNAL_PATH not set; events are kept in memory only");
                Arc::new(InMemoryEventStore::new())
            }
        };
        let bus = Arc::new(AppBus::new());
        let till = Till::new(CommandDispatcher::new(store, bus.clone()), Arc::new(Projections::new()));

        let tenant_id = config.tenant_id;
        till.rebuild(tenant_id)?;

        let now = Utc::now();
        till.seed_admin(tenant_id, &config.admin_username, &config.admin_password, now)?;
        if till
            .authenticate(tenant_id, &config.admin_username, DEFAULT_ADMIN_PASSWORD)
            .is_ok()
        {
            warn!(
                username = %config.admin_username,
                "admin account still uses the default password; change it"
            );
        }

        Ok(Self {
            till,
            bus,
            tenant_id,
            issuer: Hs256JwtIssuer::new(config.jwt_secret.as_bytes()),
            validator: Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes())),
            token_ttl: Duration::minutes(config.token_ttl_minutes),
        })
    }

    /// The shop this process serves.
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn reports(&self) -> Reports<'_> {
        Reports::new(self.till.projections())
    }

    pub fn validate_token(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        self.validator.validate(token, now)
    }

    /// Sign a token for `user`, valid from `now` for the configured lifetime.
    pub fn issue_token(&self, user: &UserReadModel, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>), TokenValidationError> {
        let claims = JwtClaims {
            sub: user.user_id,
            username: user.username.clone(),
            tenant_id: self.tenant_id,
            role: user.role,
            must_change_password: user.must_change_password,
            issued_at: now,
            expires_at: now + self.token_ttl,
        };
        let token = self.issuer.issue(&claims)?;
        Ok((token, claims.expires_at))
    }
}
