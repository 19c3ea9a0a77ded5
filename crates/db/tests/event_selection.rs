//! Integration tests for the needed-work selector: which push events
//! count as under-recorded in missing-only vs missing-or-undercounted
//! mode, the size-0 exclusion, and result ordering.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use lineage_core::sha::ZERO_SHA;
use lineage_core::types::Timestamp;
use lineage_db::repositories::PushEventRepo;

const REPO: &str = "org/repo";

fn ts(day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

fn sha(n: u8) -> String {
    format!("{n:040x}")
}

async fn seed_event(
    pool: &PgPool,
    id: i64,
    repo: &str,
    day: u32,
    before: &str,
    size: Option<i64>,
) {
    sqlx::query(
        "insert into gha_events(id, type, actor_id, repo_id, created_at, dup_actor_login, dup_repo_name) \
         values($1, 'PushEvent', 11, 13, $2, 'pusher', $3)",
    )
    .bind(id)
    .bind(ts(day))
    .bind(repo)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("insert into gha_payloads(event_id, head, befor, size) values($1, $2, $3, $4)")
        .bind(id)
        .bind(sha(0xaa))
        .bind(before)
        .bind(size)
        .execute(pool)
        .await
        .unwrap();
}

async fn seed_recorded(pool: &PgPool, sha: &str, event_id: i64, day: u32) {
    sqlx::query(
        "insert into gha_commits(sha, event_id, dup_repo_name, dup_created_at) \
         values($1, $2, $3, $4)",
    )
    .bind(sha)
    .bind(event_id)
    .bind(REPO)
    .bind(ts(day))
    .execute(pool)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn missing_only_selects_events_with_no_recorded_commits(pool: PgPool) {
    seed_event(&pool, 1, REPO, 2, &sha(1), Some(2)).await; // nothing recorded
    seed_event(&pool, 2, REPO, 3, &sha(2), Some(2)).await; // 1 of 2 recorded
    seed_event(&pool, 3, REPO, 4, &sha(3), Some(2)).await; // fully recorded
    seed_recorded(&pool, &sha(21), 2, 3).await;
    seed_recorded(&pool, &sha(31), 3, 4).await;
    seed_recorded(&pool, &sha(32), 3, 4).await;

    let events = PushEventRepo::needing_commits(&pool, REPO, ts(1), 1)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, 1);
    assert_eq!(events[0].recorded_commits, 0);
    assert_eq!(events[0].size, Some(2));
}

#[sqlx::test(migrations = "./migrations")]
async fn undercount_mode_adds_partially_recorded_events(pool: PgPool) {
    seed_event(&pool, 1, REPO, 2, &sha(1), Some(2)).await;
    seed_event(&pool, 2, REPO, 3, &sha(2), Some(2)).await;
    seed_event(&pool, 3, REPO, 4, &sha(3), Some(2)).await;
    seed_recorded(&pool, &sha(21), 2, 3).await;
    seed_recorded(&pool, &sha(31), 3, 4).await;
    seed_recorded(&pool, &sha(32), 3, 4).await;

    let events = PushEventRepo::needing_commits(&pool, REPO, ts(1), 2)
        .await
        .unwrap();
    let ids: Vec<i64> = events.iter().map(|e| e.event_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(events[1].recorded_commits, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn size_zero_with_zero_before_is_excluded(pool: PgPool) {
    seed_event(&pool, 1, REPO, 2, ZERO_SHA, Some(0)).await;
    seed_event(&pool, 2, REPO, 3, "", Some(0)).await;
    seed_event(&pool, 3, REPO, 4, &sha(3), Some(0)).await; // real before: kept

    let events = PushEventRepo::needing_commits(&pool, REPO, ts(1), 1)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn other_repos_types_and_older_events_are_filtered(pool: PgPool) {
    seed_event(&pool, 1, REPO, 10, &sha(1), Some(1)).await;
    seed_event(&pool, 2, "other/repo", 10, &sha(2), Some(1)).await;
    seed_event(&pool, 3, REPO, 2, &sha(3), Some(1)).await; // before the bound
    sqlx::query("update gha_events set type = 'WatchEvent' where id = 1")
        .execute(&pool)
        .await
        .unwrap();

    let events = PushEventRepo::needing_commits(&pool, REPO, ts(5), 1)
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn results_come_back_oldest_first_with_payload_fields(pool: PgPool) {
    seed_event(&pool, 2, REPO, 7, &sha(2), Some(3)).await;
    seed_event(&pool, 1, REPO, 3, &sha(1), None).await;

    let events = PushEventRepo::needing_commits(&pool, REPO, ts(1), 1)
        .await
        .unwrap();
    let ids: Vec<i64> = events.iter().map(|e| e.event_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(events[0].before_str(), sha(1));
    assert_eq!(events[0].head_str(), sha(0xaa));
    assert_eq!(events[0].size, None);
    assert_eq!(events[0].created_at, ts(3));
    assert_eq!(events[0].repo_name, REPO);
    assert_eq!(events[0].actor_login, "pusher");
}
