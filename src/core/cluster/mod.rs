//! Cluster mode: flow rules marked `cluster_mode` delegate their admission
//! decision to a token service shared by all instances of the service. The
//! transport between client and server is not part of the core; the
//! embedded `DefaultTokenService` answers in process.

pub mod flow_checker;
pub mod limiter;
pub mod metric;
pub mod rule_manager;
pub mod token_service;

pub use flow_checker::*;
pub use limiter::*;
pub use metric::*;
pub use rule_manager::*;
pub use token_service::*;

use lazy_static::lazy_static;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref TOKEN_SERVICE: RwLock<Option<Arc<dyn TokenService>>> = RwLock::new(None);
}

/// Install the token service cluster-mode flow rules delegate to: the
/// embedded server, or a client to a remote one.
pub fn set_token_service(service: Arc<dyn TokenService>) {
    *TOKEN_SERVICE.write().unwrap() = Some(service);
}

pub fn get_token_service() -> Option<Arc<dyn TokenService>> {
    TOKEN_SERVICE.read().unwrap().clone()
}

/// Disable cluster mode; rules fall back to their local checks.
pub fn clear_token_service() {
    *TOKEN_SERVICE.write().unwrap() = None;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_registry() {
        clear_token_service();
        assert!(get_token_service().is_none());
        set_token_service(Arc::new(DefaultTokenService::new()));
        assert!(get_token_service().is_some());
        clear_token_service();
    }
}
