use async_trait::async_trait;
use tracing::debug;
use tracing::trace;

use super::parse_settings_key;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use crate::constants;
use crate::ConfigMap;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;

/// Charm settings documents are keyed by owner and charm version
/// (`a#wordpress#<charm-url>`). A change only applies while the owning
/// application still references that charm url; stale versions are
/// discarded outright, since the application's own change notification
/// re-reads config whenever its charm url moves.
pub(crate) struct SettingsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for SettingsHandler {
    fn collection(&self) -> &'static str {
        constants::SETTINGS
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let Some((name, charm_url)) = parse_settings_key(id) else {
            trace!(id, "ignoring settings change without application scope");
            return Ok(());
        };
        let Some(old) = ctx.store.get(&EntityId::application(name)) else {
            return Ok(());
        };
        if let EntityView::Application(app) = old.as_ref() {
            if app.charm_url != charm_url {
                debug!(
                    application = name,
                    stale = charm_url,
                    current = %app.charm_url,
                    "discarding settings change for superseded charm version"
                );
                return Ok(());
            }
            let mut view = app.clone();
            view.config = settings_map(&doc);
            out.upsert(EntityView::Application(view));
        }
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        _id: &str,
        _out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        // Settings documents vanish when their charm version is
        // superseded; the owning application re-reads by then.
        Ok(())
    }
}

/// Build a config map from a settings document, dropping transaction
/// bookkeeping fields and unescaping key characters the persistence
/// layer cannot store verbatim.
pub(crate) fn settings_map(doc: &Document) -> ConfigMap {
    let mut map = ConfigMap::new();
    if let Some(fields) = doc.as_object() {
        for (key, value) in fields {
            if key.starts_with("txn-") || key == "_id" {
                continue;
            }
            map.insert(unescape_key(key), value.clone());
        }
    }
    map
}

/// The persistence layer escapes `.` and `$` in field names; reverse
/// that when surfacing settings keys.
fn unescape_key(key: &str) -> String {
    key.replace('\u{ff0e}', ".").replace('\u{ff04}', "$")
}
