//! Cached (name, email) → actor resolution.
//!
//! Commit metadata identifies people by free-form name and email; the
//! actor directory identifies them by id and login. The lookup is
//! layered (auxiliary email table, auxiliary name table, primary table
//! by name, primary table by login) and every result — including "not
//! found" — is memoized, so repeated identities within a database pass
//! cost at most one round trip each. The cache lives for exactly one
//! database pass and is shared across that database's repository
//! workers.

use std::collections::HashMap;
use std::future::Future;

use sqlx::PgConnection;
use tokio::sync::RwLock;

use lineage_core::redact::Redactor;
use lineage_core::types::DbId;

/// A resolved identity; `id == 0` means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorRef {
    pub id: DbId,
    pub login: String,
}

impl ActorRef {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.id == 0
    }
}

/// Memoization key: lower-cased, trimmed `(email, name)`, computed from
/// the raw (pre-redaction) pair.
fn cache_key(email: &str, name: &str) -> (String, String) {
    (
        email.trim().to_lowercase(),
        name.trim().to_lowercase(),
    )
}

/// Thread-safe memoization of lookup results for one database pass.
#[derive(Debug, Default)]
pub struct ActorCache {
    inner: RwLock<HashMap<(String, String), ActorRef>>,
}

impl ActorCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, key: &(String, String)) -> Option<ActorRef> {
        self.inner.read().await.get(key).cloned()
    }

    async fn put(&self, key: (String, String), value: ActorRef) {
        self.inner.write().await.insert(key, value);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// Consult the cache, falling back to `lookup` exactly once on a miss.
///
/// Generic over the lookup so the memoization contract can be tested
/// with a counting fake instead of a database.
pub async fn resolve_cached<F, Fut>(
    cache: &ActorCache,
    name: &str,
    email: &str,
    lookup: F,
) -> ActorRef
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ActorRef>,
{
    let key = cache_key(email, name);
    if let Some(hit) = cache.get(&key).await {
        return hit;
    }
    let resolved = lookup().await;
    cache.put(key, resolved.clone()).await;
    resolved
}

/// Resolve a raw (name, email) pair against the actor directory.
///
/// Runs on the caller's connection, which in practice is the open
/// backfill transaction, so resolution sees commits inserted earlier in
/// the same transaction.
pub async fn resolve_actor(
    conn: &mut PgConnection,
    cache: &ActorCache,
    redactor: &Redactor,
    name: &str,
    email: &str,
) -> ActorRef {
    resolve_cached(cache, name, email, || lookup_actor(conn, redactor, name, email)).await
}

/// Layered directory lookup, first hit wins. Query errors other than
/// "no rows" are logged and treated as misses so one flaky lookup layer
/// cannot fail a whole repository.
async fn lookup_actor(
    conn: &mut PgConnection,
    redactor: &Redactor,
    name: &str,
    email: &str,
) -> ActorRef {
    let name = redactor.apply(name).trim().to_string();
    let email = redactor.apply(email).trim().to_string();

    if !email.is_empty() {
        if let Some(actor) = try_lookup(
            conn,
            "select a.id, a.login from gha_actors a, gha_actors_emails ae \
             where a.id = ae.actor_id and lower(ae.email) = lower($1) \
             order by a.id desc limit 1",
            &email,
            "email",
        )
        .await
        {
            return actor;
        }
    }

    if !name.is_empty() {
        if let Some(actor) = try_lookup(
            conn,
            "select a.id, a.login from gha_actors a, gha_actors_names an \
             where a.id = an.actor_id and lower(an.name) = lower($1) \
             order by a.id desc limit 1",
            &name,
            "name alias",
        )
        .await
        {
            return actor;
        }
        if let Some(actor) = try_lookup(
            conn,
            "select id, login from gha_actors where lower(name) = lower($1) \
             order by id desc limit 1",
            &name,
            "name",
        )
        .await
        {
            return actor;
        }
        if let Some(actor) = try_lookup(
            conn,
            "select id, login from gha_actors where lower(login) = lower($1) \
             order by id desc limit 1",
            &name,
            "login",
        )
        .await
        {
            return actor;
        }
    }

    ActorRef::unknown()
}

async fn try_lookup(
    conn: &mut PgConnection,
    sql: &str,
    value: &str,
    layer: &'static str,
) -> Option<ActorRef> {
    match sqlx::query_as::<_, (DbId, String)>(sql)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
    {
        Ok(Some((id, login))) => Some(ActorRef { id, login }),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(layer, value, error = %err, "actor lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cache_key_is_case_and_whitespace_insensitive() {
        assert_eq!(
            cache_key(" Jane@Example.COM ", "Jane Doe"),
            cache_key("jane@example.com", "jane doe")
        );
        assert_ne!(
            cache_key("jane@example.com", "jane"),
            cache_key("jane@example.com", "janet")
        );
    }

    #[tokio::test]
    async fn repeated_resolution_does_one_lookup() {
        let cache = ActorCache::new();
        let lookups = AtomicUsize::new(0);

        for _ in 0..3 {
            let actor = resolve_cached(&cache, "Jane Doe", "jane@example.com", || async {
                lookups.fetch_add(1, Ordering::SeqCst);
                ActorRef {
                    id: 42,
                    login: "jane".to_string(),
                }
            })
            .await;
            assert_eq!(actor.id, 42);
            assert_eq!(actor.login, "jane");
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_memoized_too() {
        let cache = ActorCache::new();
        let lookups = AtomicUsize::new(0);

        for _ in 0..2 {
            let actor = resolve_cached(&cache, "Nobody", "nobody@example.com", || async {
                lookups.fetch_add(1, Ordering::SeqCst);
                ActorRef::unknown()
            })
            .await;
            assert!(actor.is_unknown());
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_identities_get_distinct_entries() {
        let cache = ActorCache::new();
        let a = resolve_cached(&cache, "A", "a@x", || async {
            ActorRef { id: 1, login: "a".into() }
        })
        .await;
        let b = resolve_cached(&cache, "B", "b@x", || async {
            ActorRef { id: 2, login: "b".into() }
        })
        .await;
        assert_ne!(a, b);
        assert_eq!(cache.len().await, 2);
    }
}
