//! Idempotent writes to `gha_commits` and `gha_commits_roles`.

use sqlx::{PgConnection, PgPool};

use lineage_core::types::Timestamp;

use crate::models::{NewCommit, NewCommitRole};

/// Commit and role persistence. Inserts are `on conflict do nothing`,
/// so a re-run of the engine never creates duplicates.
pub struct CommitRepo;

impl CommitRepo {
    /// Newest recorded commit timestamp for a repository, used to
    /// advance the scan lower bound in missing-only mode.
    pub async fn last_recorded_at(
        pool: &PgPool,
        repo: &str,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar("select max(dup_created_at) from gha_commits where dup_repo_name = $1")
            .bind(repo)
            .fetch_one(pool)
            .await
    }

    /// Insert one reconstructed commit row.
    ///
    /// `is_distinct` is computed inline: true iff no row with this SHA
    /// exists yet, evaluated inside the same transaction so ordering
    /// within a run is consistent.
    pub async fn insert(conn: &mut PgConnection, c: &NewCommit) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
insert into gha_commits(
  sha, event_id, author_name, encrypted_email, message,
  is_distinct, dup_actor_id, dup_actor_login, dup_repo_id, dup_repo_name, dup_type, dup_created_at,
  author_id, committer_id, dup_author_login, dup_committer_login,
  author_email, committer_name, committer_email
)
select
  $1::varchar(40), $2, $3, $4, $5,
  not exists(select 1 from gha_commits c2 where c2.sha = $1::varchar(40) limit 1),
  $6, $7, $8, $9, 'PushEvent', $10,
  $11, $12, $13, $14,
  $15, $16, $17
on conflict do nothing
"#,
        )
        .bind(&c.sha)
        .bind(c.event_id)
        .bind(&c.author_name)
        .bind(&c.author_email)
        .bind(&c.message)
        .bind(c.actor_id)
        .bind(&c.actor_login)
        .bind(c.repo_id)
        .bind(&c.repo_name)
        .bind(c.created_at)
        .bind(c.author_id)
        .bind(c.committer_id)
        .bind(&c.author_login)
        .bind(&c.committer_login)
        .bind(&c.author_email)
        .bind(&c.committer_name)
        .bind(&c.committer_email)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Insert one collaboration-role row.
    pub async fn insert_role(
        conn: &mut PgConnection,
        r: &NewCommitRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
insert into gha_commits_roles(
  sha, event_id, role, actor_id, actor_login, actor_name, actor_email,
  dup_repo_id, dup_repo_name, dup_created_at
) values($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
on conflict do nothing
"#,
        )
        .bind(&r.sha)
        .bind(r.event_id)
        .bind(&r.role)
        .bind(r.actor_id)
        .bind(&r.actor_login)
        .bind(&r.actor_name)
        .bind(&r.actor_email)
        .bind(r.repo_id)
        .bind(&r.repo_name)
        .bind(r.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
