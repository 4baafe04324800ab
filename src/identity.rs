use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{SharedStorage, Storage, SESSION_ID_KEY, VISITOR_ID_KEY};

/// Stable identity of the current visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorIdentity {
    /// Durable visitor id, kept for the lifetime of durable storage.
    pub visitor_id: String,
    /// Id of the current browsing session.
    pub session_id: String,
}

/// Produces and retrieves visitor and session ids.
///
/// Ids are created lazily on first access and never changed afterwards. If storage cannot be
/// read or written, a fresh id is returned for that call instead of failing.
pub struct IdentityProvider {
    durable: SharedStorage,
    session: SharedStorage,
}

impl IdentityProvider {
    /// Create a provider backed by the given durable and session storages.
    pub fn new(durable: SharedStorage, session: SharedStorage) -> Self {
        Self { durable, session }
    }

    /// Return the durable visitor id, creating it on first call.
    pub fn get_or_create_visitor_id(&self) -> String {
        get_or_create(&*self.durable, VISITOR_ID_KEY)
    }

    /// Return the session id, creating it on first call within the session.
    pub fn get_session_id(&self) -> String {
        get_or_create(&*self.session, SESSION_ID_KEY)
    }

    /// Return both ids.
    pub fn identity(&self) -> VisitorIdentity {
        VisitorIdentity {
            visitor_id: self.get_or_create_visitor_id(),
            session_id: self.get_session_id(),
        }
    }
}

fn get_or_create(storage: &(dyn Storage + Send + Sync), key: &str) -> String {
    match storage.get(key) {
        Ok(Some(id)) if !id.is_empty() => return id,
        Ok(_) => {}
        Err(err) => {
            log::warn!(target: "pb_experience", key; "unable to read identity, using a fresh id: {:?}", err);
        }
    }

    let id = Uuid::new_v4().to_string();
    log::debug!(target: "pb_experience", key, id:display = id; "created identity");
    if let Err(err) = storage.set(key, &id) {
        log::warn!(target: "pb_experience", key; "unable to persist identity: {:?}", err);
    }
    id
}
