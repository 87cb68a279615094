use log::warn;

use crate::error::{BrokerError, StoreError};
use crate::models::{AppModule, PermissionSet};
use crate::registry::ClientRegistry;
use crate::store::SsoStore;

/// Grants every module of the application when the set holds `master = true`.
pub fn expand_master(perms: &mut PermissionSet, modules: &[AppModule]) {
    if !perms.is_master() {
        return;
    }
    for module in modules {
        perms.insert(module.module_key.clone(), true);
    }
}

/// Application scope of an audience: the owning client id, or the audience itself
pub fn scope_for_audience<'a>(registry: &'a ClientRegistry, audience: &'a str) -> &'a str {
    registry
        .client_for_audience(audience)
        .map(|c| c.client_id.as_str())
        .unwrap_or(audience)
}

fn unavailable(err: StoreError) -> BrokerError {
    warn!("Permission lookup failed: {err}");
    BrokerError::PermissionStoreUnavailable(err.to_string())
}

/// Module permissions of `user_id` within the application owning `audience`.
///
/// Unknown or inactive users and users without rows get an empty set.
pub async fn resolve_permissions(
    store: &dyn SsoStore,
    registry: &ClientRegistry,
    audience: &str,
    user_id: &str,
) -> Result<PermissionSet, BrokerError> {
    let scope = scope_for_audience(registry, audience);

    let active = store
        .find_user(user_id)
        .await
        .map_err(unavailable)?
        .is_some_and(|u| u.is_active);
    if !active {
        return Ok(PermissionSet::new());
    }

    let rows = store
        .list_module_permissions(scope, user_id)
        .await
        .map_err(unavailable)?;
    if rows.is_empty() {
        return Ok(PermissionSet::new());
    }

    let mut perms: PermissionSet = rows.into_iter().collect();
    if perms.is_master() {
        let modules = store.list_app_modules(scope).await.map_err(unavailable)?;
        expand_master(&mut perms, &modules);
    }
    Ok(perms)
}
