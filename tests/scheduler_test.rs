use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use taskq::queue::Scheduler;
use taskq::storage::backend::MemoryStore;
use taskq::task::{NewTask, Priority};

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(MemoryStore::new()), "tasks")
}

#[tokio::test]
async fn test_claim_on_empty_queue_returns_none() {
    let scheduler = scheduler();
    assert!(scheduler.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_high_tier_claimed_before_lower_tiers() {
    let scheduler = scheduler();
    let run_at = Utc::now() - Duration::seconds(1);

    let low = scheduler
        .schedule("job", &json!({"tier": "low"}), Priority::Low, 0, run_at)
        .await
        .unwrap();
    let medium = scheduler
        .schedule("job", &json!({"tier": "medium"}), Priority::Medium, 0, run_at)
        .await
        .unwrap();
    let high = scheduler
        .schedule("job", &json!({"tier": "high"}), Priority::High, 0, run_at)
        .await
        .unwrap();

    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, high);
    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, medium);
    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, low);
    assert!(scheduler.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_tier_order_beats_due_time() {
    let scheduler = scheduler();

    // The low task has been due much longer, the high task still wins
    let low = scheduler
        .schedule("job", &(), Priority::Low, 0, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    let high = scheduler.enqueue("job", &(), Priority::High, 0).await.unwrap();

    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, high);
    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, low);
}

#[tokio::test]
async fn test_earliest_due_claimed_first_within_tier() {
    let scheduler = scheduler();
    let now = Utc::now();

    let later = scheduler
        .schedule("job", &2, Priority::Medium, 0, now - Duration::seconds(5))
        .await
        .unwrap();
    let earlier = scheduler
        .schedule("job", &1, Priority::Medium, 0, now - Duration::seconds(10))
        .await
        .unwrap();

    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, earlier);
    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, later);
}

#[tokio::test]
async fn test_future_task_is_not_claimed() {
    let scheduler = scheduler();
    scheduler
        .schedule("job", &(), Priority::High, 0, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    assert!(scheduler.claim().await.unwrap().is_none());
    assert_eq!(scheduler.pending(Priority::High).await.unwrap(), 1);
}

#[tokio::test]
async fn test_future_task_does_not_block_due_lower_tier() {
    let scheduler = scheduler();
    scheduler
        .schedule("job", &(), Priority::High, 0, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let low = scheduler.enqueue("job", &(), Priority::Low, 0).await.unwrap();

    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, low);
}

#[tokio::test]
async fn test_scheduled_task_becomes_due() {
    let scheduler = scheduler();
    let new_task = NewTask::new("delayed", &())
        .unwrap()
        .schedule_after(Duration::milliseconds(100));
    let id = scheduler.submit(new_task).await.unwrap();

    assert!(scheduler.claim().await.unwrap().is_none());

    tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;

    assert_eq!(scheduler.claim().await.unwrap().unwrap().id, id);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Email {
    email: String,
    cc: Vec<String>,
}

#[tokio::test]
async fn test_claimed_payload_round_trips() {
    let scheduler = scheduler();
    let email = Email {
        email: "a@b.com".to_string(),
        cc: vec!["c@d.com".to_string()],
    };

    let id = scheduler
        .enqueue("send_email", &email, Priority::High, 3)
        .await
        .unwrap();
    let task = scheduler.claim().await.unwrap().unwrap();

    assert_eq!(task.id, id);
    assert_eq!(task.name, "send_email");
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.max_retries, 3);
    assert_eq!(task.payload.decode::<Email>().unwrap(), email);
}

#[tokio::test]
async fn test_claim_removes_task() {
    let scheduler = scheduler();
    scheduler.enqueue("job", &(), Priority::Medium, 0).await.unwrap();
    assert_eq!(scheduler.pending(Priority::Medium).await.unwrap(), 1);

    scheduler.claim().await.unwrap().unwrap();
    assert_eq!(scheduler.pending(Priority::Medium).await.unwrap(), 0);
}

#[tokio::test]
async fn test_queues_with_different_names_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let emails = Scheduler::new(store.clone(), "emails");
    let reports = Scheduler::new(store, "reports");

    emails.enqueue("send_email", &(), Priority::High, 0).await.unwrap();

    assert!(reports.claim().await.unwrap().is_none());
    assert!(emails.claim().await.unwrap().is_some());
}

#[tokio::test]
async fn test_task_timeout_is_stored_with_record() {
    let scheduler = scheduler();
    let new_task = NewTask::new("job", &())
        .unwrap()
        .with_timeout(std::time::Duration::from_millis(1500));
    scheduler.submit(new_task).await.unwrap();

    let task = scheduler.claim().await.unwrap().unwrap();
    assert_eq!(task.timeout(), Some(std::time::Duration::from_millis(1500)));
}

#[tokio::test]
async fn test_zero_timeout_is_rejected() {
    let scheduler = scheduler();
    let new_task = NewTask::new("job", &())
        .unwrap()
        .with_timeout(std::time::Duration::ZERO);

    let result = scheduler.submit(new_task).await;
    assert!(matches!(result, Err(taskq::TaskQueueError::InvalidTask(_))));
    assert_eq!(scheduler.pending(Priority::Medium).await.unwrap(), 0);
}
