//! Needed-work selector over `gha_events`/`gha_payloads`.

use sqlx::PgPool;

use lineage_core::types::Timestamp;

use crate::models::PushEvent;

/// Read-only queries for push events lacking a complete commit record.
pub struct PushEventRepo;

impl PushEventRepo {
    /// Select push events in `repo` since `since` that have no recorded
    /// commits, or (`mode >= 2`) fewer recorded commits than the
    /// payload's declared size.
    ///
    /// Size-0 events whose `befor` is empty or the zero sentinel are
    /// excluded: those pushes genuinely introduced nothing.
    pub async fn needing_commits(
        pool: &PgPool,
        repo: &str,
        since: Timestamp,
        mode: i32,
    ) -> Result<Vec<PushEvent>, sqlx::Error> {
        sqlx::query_as::<_, PushEvent>(
            r#"
select
  e.id as event_id,
  e.actor_id,
  e.dup_actor_login as actor_login,
  e.repo_id,
  e.dup_repo_name as repo_name,
  e.created_at,
  p.head,
  p.befor as before,
  p.size,
  coalesce(c.cnt, 0) as recorded_commits
from gha_events e
join gha_payloads p on p.event_id = e.id
left join (
  select event_id, count(*) as cnt
  from gha_commits
  where dup_repo_name = $1
    and dup_created_at >= $2
  group by event_id
) c on c.event_id = e.id
where e.type = 'PushEvent'
  and e.dup_repo_name = $1
  and e.created_at >= $2
  and (
    p.size is null
    or p.size > 0
    or (
      p.size = 0
      and p.befor is not null
      and p.befor <> ''
      and p.befor <> '0000000000000000000000000000000000000000'
    )
  )
  and (
    c.cnt is null
    or c.cnt = 0
    or (
      $3 >= 2
      and p.size is not null
      and c.cnt < p.size
    )
  )
order by e.created_at, e.id
"#,
        )
        .bind(repo)
        .bind(since)
        .bind(mode)
        .fetch_all(pool)
        .await
    }
}
