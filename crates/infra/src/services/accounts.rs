//! Staff accounts: sign-in, passwords and the admin's user screen.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use tillpoint_auth::{
    ChangePassword, DeleteUser, PasswordError, Principal, RegisterUser, ResetPassword, Role,
    SetUserActive, UpdateUser, User, UserCommand, UserId, hash_password, normalize_username,
    temporary_password, verify_password,
};
use tillpoint_core::{AggregateId, DomainError, TenantId};
use tillpoint_events::{EventBus, EventEnvelope};

use super::{PosResult, Till};
use crate::event_store::EventStore;
use crate::projections::SaleFilter;
use crate::projections::UserReadModel;
use crate::projections::users::AGGREGATE_TYPE;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub role: Role,
}

fn user(id: AggregateId) -> User {
    User::empty(UserId(id))
}

fn weak_password(err: PasswordError) -> DomainError {
    DomainError::validation(err.to_string())
}

impl<S, B> Till<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create the first admin of an empty tenant. Returns `None` when the tenant
    /// already has staff.
    pub fn seed_admin(
        &self,
        tenant_id: TenantId,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> PosResult<Option<UserReadModel>> {
        self.serialized(tenant_id, || {
            if !self.projections.users.is_empty(tenant_id) {
                return Ok(None);
            }
            let admin = self.register_locked(
                tenant_id,
                NewUser {
                    username: username.to_string(),
                    role: Role::Admin,
                    password: password.to_string(),
                },
                now,
            )?;
            info!(%tenant_id, username = %admin.username, "seeded default admin");
            Ok(Some(admin))
        })
    }

    /// Check a sign-in attempt. Unknown names, wrong passwords and disabled
    /// accounts all fail the same way.
    pub fn authenticate(&self, tenant_id: TenantId, username: &str, password: &str) -> PosResult<UserReadModel> {
        match self.projections.users.find_by_username(tenant_id, username) {
            Some(u) if u.active && verify_password(password, &u.password_hash) => Ok(u),
            _ => {
                warn!(%tenant_id, username = username.trim(), "failed sign-in");
                Err(DomainError::Unauthorized.into())
            }
        }
    }

    pub fn user(&self, tenant_id: TenantId, user_id: UserId) -> PosResult<UserReadModel> {
        self.projections
            .users
            .get(tenant_id, &user_id)
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    pub fn register_user(&self, tenant_id: TenantId, input: NewUser, now: DateTime<Utc>) -> PosResult<UserReadModel> {
        self.serialized(tenant_id, || self.register_locked(tenant_id, input, now))
    }

    fn register_locked(&self, tenant_id: TenantId, input: NewUser, now: DateTime<Utc>) -> PosResult<UserReadModel> {
        let username = normalize_username(&input.username)?;
        self.ensure_username_free(tenant_id, &username, None)?;
        let password_hash = hash_password(&input.password).map_err(weak_password)?;

        let id = AggregateId::new();
        self.execute(
            tenant_id,
            id,
            AGGREGATE_TYPE,
            UserCommand::Register(RegisterUser {
                tenant_id,
                user_id: UserId(id),
                username,
                role: input.role,
                password_hash,
                temporary_password: false,
                occurred_at: now,
            }),
            |_, id| user(id),
        )?;
        self.user(tenant_id, UserId(id))
    }

    /// Rename or change the role of another account.
    pub fn update_user(
        &self,
        admin: &Principal,
        user_id: UserId,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> PosResult<UserReadModel> {
        if admin.user_id == user_id {
            return Err(DomainError::forbidden("You cannot modify your own admin account to prevent lockout.").into());
        }
        let tenant_id = admin.tenant_id;
        self.serialized(tenant_id, || {
            let username = normalize_username(&changes.username)?;
            self.ensure_username_free(tenant_id, &username, Some(user_id))?;
            self.execute(
                tenant_id,
                user_id.0,
                AGGREGATE_TYPE,
                UserCommand::Update(UpdateUser {
                    tenant_id,
                    user_id,
                    username,
                    role: changes.role,
                    occurred_at: now,
                }),
                |_, id| user(id),
            )?;
            self.user(tenant_id, user_id)
        })
    }

    /// The signed-in user replaces their own password.
    pub fn change_password(
        &self,
        who: &Principal,
        current: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> PosResult<()> {
        let account = self.user(who.tenant_id, who.user_id)?;
        if !verify_password(current, &account.password_hash) {
            return Err(DomainError::validation("Current password is incorrect").into());
        }
        if current == new_password {
            return Err(DomainError::validation("New password must be different from the current one").into());
        }
        let password_hash = hash_password(new_password).map_err(weak_password)?;
        self.execute(
            who.tenant_id,
            who.user_id.0,
            AGGREGATE_TYPE,
            UserCommand::ChangePassword(ChangePassword {
                tenant_id: who.tenant_id,
                user_id: who.user_id,
                password_hash,
                occurred_at: now,
            }),
            |_, id| user(id),
        )?;
        Ok(())
    }

    /// Issue a temporary password; the user must change it at next sign-in.
    pub fn reset_password(&self, admin: &Principal, user_id: UserId, now: DateTime<Utc>) -> PosResult<String> {
        let temporary = temporary_password();
        let temporary_password_hash = hash_password(&temporary).map_err(weak_password)?;
        self.execute(
            admin.tenant_id,
            user_id.0,
            AGGREGATE_TYPE,
            UserCommand::ResetPassword(ResetPassword {
                tenant_id: admin.tenant_id,
                user_id,
                temporary_password_hash,
                occurred_at: now,
            }),
            |_, id| user(id),
        )?;
        info!(tenant_id = %admin.tenant_id, %user_id, "password reset");
        Ok(temporary)
    }

    pub fn toggle_user_active(&self, admin: &Principal, user_id: UserId, now: DateTime<Utc>) -> PosResult<UserReadModel> {
        if admin.user_id == user_id {
            return Err(DomainError::forbidden("You cannot deactivate your own account.").into());
        }
        let tenant_id = admin.tenant_id;
        self.serialized(tenant_id, || {
            let target = self.user(tenant_id, user_id)?;
            if target.active && target.role.is_admin() && self.projections.users.active_admin_count(tenant_id) <= 1 {
                return Err(DomainError::conflict("Cannot deactivate the last admin user.").into());
            }
            self.execute(
                tenant_id,
                user_id.0,
                AGGREGATE_TYPE,
                UserCommand::SetActive(SetUserActive {
                    tenant_id,
                    user_id,
                    active: !target.active,
                    occurred_at: now,
                }),
                |_, id| user(id),
            )?;
            self.user(tenant_id, user_id)
        })
    }

    pub fn delete_user(&self, admin: &Principal, user_id: UserId, now: DateTime<Utc>) -> PosResult<()> {
        if admin.user_id == user_id {
            return Err(DomainError::forbidden("You cannot delete your own account.").into());
        }
        let tenant_id = admin.tenant_id;
        self.serialized(tenant_id, || {
            let target = self.user(tenant_id, user_id)?;
            if target.active && target.role.is_admin() && self.projections.users.active_admin_count(tenant_id) <= 1 {
                return Err(DomainError::conflict(
                    "Cannot delete the last admin user. System must have at least one admin.",
                )
                .into());
            }
            let sales = self
                .projections
                .sales
                .list(
                    tenant_id,
                    &SaleFilter {
                        clerk_id: Some(user_id),
                        ..SaleFilter::default()
                    },
                )
                .len();
            if sales > 0 {
                return Err(DomainError::conflict(format!(
                    "Cannot delete user {}. User has {sales} associated sales. Consider deactivating instead.",
                    target.username
                ))
                .into());
            }
            self.execute(
                tenant_id,
                user_id.0,
                AGGREGATE_TYPE,
                UserCommand::Delete(DeleteUser {
                    tenant_id,
                    user_id,
                    occurred_at: now,
                }),
                |_, id| user(id),
            )?;
            info!(%tenant_id, %user_id, username = %target.username, "user deleted");
            Ok(())
        })
    }

    fn ensure_username_free(&self, tenant_id: TenantId, username: &str, except: Option<UserId>) -> PosResult<()> {
        match self.projections.users.find_by_username(tenant_id, username) {
            Some(existing) if Some(existing.user_id) != except => Err(DomainError::conflict(
                "Username already exists. Please choose a different username.",
            )
            .into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_core::Money;
    use tillpoint_products::UnitType;
    use tillpoint_sales::{PaymentMethod, SaleStatus};

    use crate::services::testing::{stock_product, till};
    use crate::services::{CartRequestItem, CheckoutRequest, PosError};

    fn as_principal(u: &UserReadModel, tenant_id: TenantId) -> Principal {
        Principal {
            user_id: u.user_id,
            username: u.username.clone(),
            tenant_id,
            role: u.role,
            must_change_password: u.must_change_password,
        }
    }

    fn new_user(name: &str, role: Role) -> NewUser {
        NewUser {
            username: name.into(),
            role,
            password: "secret1".into(),
        }
    }

    #[test]
    fn seeding_happens_once_and_the_admin_can_sign_in() {
        let till = till();
        let t = TenantId::new();
        let admin = till.seed_admin(t, "admin", "admin123", Utc::now()).unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(till.seed_admin(t, "other", "admin123", Utc::now()).unwrap().is_none());

        assert!(till.authenticate(t, "ADMIN", "admin123").is_ok());
        assert!(matches!(
            till.authenticate(t, "admin", "wrong!"),
            Err(PosError::Domain(DomainError::Unauthorized))
        ));
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let till = till();
        let t = TenantId::new();
        till.register_user(t, new_user("Ama", Role::Cashier), Utc::now()).unwrap();
        let err = till.register_user(t, new_user("ama", Role::Manager), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Username already exists"));
    }

    #[test]
    fn admins_cannot_edit_disable_or_delete_themselves() {
        let till = till();
        let t = TenantId::new();
        let admin = till.seed_admin(t, "admin", "admin123", Utc::now()).unwrap().unwrap();
        let me = as_principal(&admin, t);
        let changes = UserChanges {
            username: "boss".into(),
            role: Role::Admin,
        };

        for err in [
            till.update_user(&me, me.user_id, changes, Utc::now()).unwrap_err(),
            till.toggle_user_active(&me, me.user_id, Utc::now()).unwrap_err(),
            till.delete_user(&me, me.user_id, Utc::now()).unwrap_err(),
        ] {
            assert!(matches!(err, PosError::Domain(DomainError::Forbidden(_))), "{err}");
        }
    }

    #[test]
    fn disabled_accounts_cannot_sign_in() {
        let till = till();
        let t = TenantId::new();
        let admin = till.seed_admin(t, "admin", "admin123", Utc::now()).unwrap().unwrap();
        let kofi = till.register_user(t, new_user("kofi", Role::Cashier), Utc::now()).unwrap();

        let off = till.toggle_user_active(&as_principal(&admin, t), kofi.user_id, Utc::now()).unwrap();
        assert!(!off.active);
        assert!(till.authenticate(t, "kofi", "secret1").is_err());

        till.toggle_user_active(&as_principal(&admin, t), kofi.user_id, Utc::now()).unwrap();
        assert!(till.authenticate(t, "kofi", "secret1").is_ok());
    }

    #[test]
    fn reset_forces_a_password_change() {
        let till = till();
        let t = TenantId::new();
        let admin = till.seed_admin(t, "admin", "admin123", Utc::now()).unwrap().unwrap();
        let kofi = till.register_user(t, new_user("kofi", Role::Cashier), Utc::now()).unwrap();

        let temporary = till.reset_password(&as_principal(&admin, t), kofi.user_id, Utc::now()).unwrap();
        let signed_in = till.authenticate(t, "kofi", &temporary).unwrap();
        assert!(signed_in.must_change_password);

        let me = as_principal(&signed_in, t);
        assert!(till.change_password(&me, "nope", "fresh-pass", Utc::now()).is_err());
        till.change_password(&me, &temporary, "fresh-pass", Utc::now()).unwrap();

        let after = till.authenticate(t, "kofi", "fresh-pass").unwrap();
        assert!(!after.must_change_password);
        assert!(till.authenticate(t, "kofi", &temporary).is_err());
    }

    #[test]
    fn users_with_sales_are_kept() {
        let till = till();
        let t = TenantId::new();
        let admin = till.seed_admin(t, "admin", "admin123", Utc::now()).unwrap().unwrap();
        let kofi = till.register_user(t, new_user("kofi", Role::Cashier), Utc::now()).unwrap();
        let idle = till.register_user(t, new_user("idle", Role::Cashier), Utc::now()).unwrap();
        let tea = stock_product(&till, t, "Tea", 8, 5, 5);

        till.checkout(
            &as_principal(&kofi, t),
            CheckoutRequest {
                items: vec![CartRequestItem {
                    product_id: tea,
                    quantity: 1,
                    unit_type: UnitType::Full,
                }],
                status: SaleStatus::Completed,
                payment_method: PaymentMethod::Cash,
                amount_paid: Money::from_minor(800),
                continue_sale_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        let boss = as_principal(&admin, t);
        let err = till.delete_user(&boss, kofi.user_id, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("User has 1 associated sales"));

        till.delete_user(&boss, idle.user_id, Utc::now()).unwrap();
        assert!(till.user(t, idle.user_id).is_err());
    }
}
