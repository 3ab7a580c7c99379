use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

use quizdeck_core::{Collection, Quiz, QuizStatus};

use super::AccessError;
use crate::db::{DocumentStore, Query};

/// Quiz documents, keyed by `quiz_id`.
#[derive(Clone)]
pub struct QuizRepository {
    store: DocumentStore,
}

/// Handle to a running quiz subscription.
///
/// The listener stops when [`Subscription::unsubscribe`] is called or the
/// handle is dropped.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn live_by_creator_query(uid: &str) -> Query {
    Query::new()
        .where_eq("createdBy", uid)
        .where_eq("status", QuizStatus::Live.as_str())
}

/// Newest first. Ties keep the store's id order.
fn sort_newest_first(quizzes: &mut [Quiz]) {
    quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl QuizRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub async fn create(&self, quiz: &Quiz) -> Result<(), AccessError> {
        quiz.validate()?;
        self.store
            .set(Collection::Quizzes, &quiz.quiz_id, quiz)
            .await?;

        tracing::info!(
            "Created {} quiz {} for {}",
            quiz.type_code(),
            quiz.quiz_id,
            quiz.created_by
        );
        Ok(())
    }

    pub async fn get(&self, quiz_id: &str) -> Result<Option<Quiz>, AccessError> {
        Ok(self.store.get(Collection::Quizzes, quiz_id).await?)
    }

    /// Soft-deletes a quiz by setting its status to `DELETED`.
    ///
    /// Neither ownership nor the current status is checked, so deleting twice
    /// succeeds twice. Returns `Ok(false)` only when no such quiz exists.
    pub async fn delete(&self, quiz_id: &str) -> Result<bool, AccessError> {
        let deleted = self
            .store
            .update_field(
                Collection::Quizzes,
                quiz_id,
                "status",
                QuizStatus::Deleted.as_str(),
            )
            .await?;

        if deleted {
            tracing::info!("Deleted quiz {}", quiz_id);
        } else {
            tracing::debug!("Delete skipped, no quiz {}", quiz_id);
        }
        Ok(deleted)
    }

    /// Live quizzes created by `uid`, newest first.
    pub async fn live_by_creator(&self, uid: &str) -> Result<Vec<Quiz>, AccessError> {
        let docs = self
            .store
            .query(Collection::Quizzes, &live_by_creator_query(uid))
            .await?;

        let mut quizzes = docs
            .into_iter()
            .map(|doc| doc.decode::<Quiz>(Collection::Quizzes))
            .collect::<Result<Vec<_>, _>>()?;
        sort_newest_first(&mut quizzes);
        Ok(quizzes)
    }

    /// Watches the live quizzes created by `uid`.
    ///
    /// `on_change` receives the full current set, newest first, once right away
    /// and again whenever the set changes. A failed read or a malformed record
    /// is passed to `on_change` as an error and the subscription keeps running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe_by_creator<F>(&self, uid: impl Into<String>, mut on_change: F) -> Subscription
    where
        F: FnMut(Result<Vec<Quiz>, AccessError>) + Send + 'static,
    {
        let repo = self.clone();
        let uid = uid.into();

        let handle = tokio::spawn(async move {
            let mut changes = repo.store.watch(Collection::Quizzes).await;
            let mut last: Option<Vec<Quiz>> = None;

            loop {
                match repo.live_by_creator(&uid).await {
                    Ok(quizzes) => {
                        if last.as_ref() != Some(&quizzes) {
                            last = Some(quizzes.clone());
                            on_change(Ok(quizzes));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Quiz subscription for {} failed: {}", uid, e);
                        last = None;
                        on_change(Err(e));
                    }
                }

                match changes.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Quiz subscription for {} skipped {} changes", uid, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }

                // One re-read covers a burst of writes
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
            }
        });

        Subscription { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, StoreError};
    use quizdeck_core::{MultipleChoiceQuestion, QuizError, QuizKind, TrueOrFalseQuestion};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct TestContext {
        store: DocumentStore,
        repo: QuizRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(temp_dir.path().join("test.db")).await.unwrap();
        let store = DocumentStore::new(pool);
        TestContext {
            repo: QuizRepository::new(store.clone()),
            store,
            _temp_dir: temp_dir,
        }
    }

    fn quiz(id: &str, uid: &str, created_at: i64) -> Quiz {
        Quiz::new(
            uid,
            format!("Quiz {}", id),
            QuizKind::TrueOrFalse {
                questions: vec![TrueOrFalseQuestion::new("Sky is blue", true)],
            },
        )
        .with_id(id)
        .with_created_at(created_at)
    }

    fn created_ats(quizzes: &[Quiz]) -> Vec<i64> {
        quizzes.iter().map(|q| q.created_at).collect()
    }

    type Snapshots = mpsc::UnboundedReceiver<Result<Vec<Quiz>, AccessError>>;

    fn subscribe(repo: &QuizRepository, uid: &str) -> (Subscription, Snapshots) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = repo.subscribe_by_creator(uid, move |snapshot| {
            let _ = tx.send(snapshot);
        });
        (subscription, rx)
    }

    async fn next(rx: &mut Snapshots) -> Result<Vec<Quiz>, AccessError> {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no snapshot delivered")
            .expect("subscription ended")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let ctx = setup_repo().await;
        let q = quiz("q1", "u1", 5);

        ctx.repo.create(&q).await.unwrap();

        assert_eq!(ctx.repo.get("q1").await.unwrap(), Some(q));
        assert_eq!(ctx.repo.get("q2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_quiz() {
        let ctx = setup_repo().await;
        let bad = Quiz::new(
            "u1",
            "Bad",
            QuizKind::MultipleChoice {
                questions: vec![MultipleChoiceQuestion::new("?", ["a", "b"], "z")],
            },
        );

        let result = ctx.repo.create(&bad).await;
        assert!(matches!(
            result,
            Err(AccessError::InvalidQuiz(QuizError::AnswerNotInChoices { .. }))
        ));
        assert_eq!(ctx.repo.get(&bad.quiz_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_hides_from_live_read() {
        let ctx = setup_repo().await;
        ctx.repo.create(&quiz("q1", "u1", 5)).await.unwrap();
        ctx.repo.create(&quiz("q2", "u1", 6)).await.unwrap();

        assert!(ctx.repo.delete("q1").await.unwrap());

        let live = ctx.repo.live_by_creator("u1").await.unwrap();
        let ids: Vec<&str> = live.iter().map(|q| q.quiz_id.as_str()).collect();
        assert_eq!(ids, vec!["q2"]);

        // Soft delete: the record is still there
        let deleted = ctx.repo.get("q1").await.unwrap().unwrap();
        assert_eq!(deleted.status, QuizStatus::Deleted);
    }

    #[tokio::test]
    async fn test_delete_twice_and_missing() {
        let ctx = setup_repo().await;
        ctx.repo.create(&quiz("q1", "u1", 5)).await.unwrap();

        assert!(ctx.repo.delete("q1").await.unwrap());
        assert!(ctx.repo.delete("q1").await.unwrap());
        assert!(!ctx.repo.delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_live_by_creator_filters_and_sorts() {
        let ctx = setup_repo().await;
        ctx.repo.create(&quiz("a", "u1", 5)).await.unwrap();
        ctx.repo.create(&quiz("b", "u1", 20)).await.unwrap();
        ctx.repo.create(&quiz("c", "u1", 1)).await.unwrap();
        ctx.repo.create(&quiz("d", "u2", 100)).await.unwrap();

        let live = ctx.repo.live_by_creator("u1").await.unwrap();
        assert_eq!(created_ats(&live), vec![20, 5, 1]);

        assert!(ctx.repo.live_by_creator("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_delivers_newest_first() {
        let ctx = setup_repo().await;
        ctx.repo.create(&quiz("a", "u1", 5)).await.unwrap();
        ctx.repo.create(&quiz("b", "u1", 20)).await.unwrap();
        ctx.repo.create(&quiz("c", "u1", 1)).await.unwrap();

        let (_subscription, mut rx) = subscribe(&ctx.repo, "u1");

        let initial = next(&mut rx).await.unwrap();
        assert_eq!(created_ats(&initial), vec![20, 5, 1]);
    }

    #[tokio::test]
    async fn test_subscription_redelivers_full_set() {
        let ctx = setup_repo().await;
        ctx.repo.create(&quiz("a", "u1", 5)).await.unwrap();

        let (_subscription, mut rx) = subscribe(&ctx.repo, "u1");
        assert_eq!(created_ats(&next(&mut rx).await.unwrap()), vec![5]);

        ctx.repo.create(&quiz("b", "u1", 30)).await.unwrap();
        assert_eq!(created_ats(&next(&mut rx).await.unwrap()), vec![30, 5]);

        ctx.repo.delete("a").await.unwrap();
        assert_eq!(created_ats(&next(&mut rx).await.unwrap()), vec![30]);
    }

    #[tokio::test]
    async fn test_subscription_ignores_other_creators() {
        let ctx = setup_repo().await;
        let (_subscription, mut rx) = subscribe(&ctx.repo, "u1");
        assert!(next(&mut rx).await.unwrap().is_empty());

        ctx.repo.create(&quiz("x", "u2", 7)).await.unwrap();

        let quiet = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test]
    async fn test_subscription_reports_malformed_record_and_recovers() {
        let ctx = setup_repo().await;
        ctx.store
            .set(
                Collection::Quizzes,
                "bad",
                &json!({
                    "quiz_id": "bad",
                    "createdAt": 3,
                    "createdBy": "u1",
                    "title": "Essay",
                    "status": "LIVE",
                    "type": "ESSAY",
                    "questions": []
                }),
            )
            .await
            .unwrap();

        let (subscription, mut rx) = subscribe(&ctx.repo, "u1");

        let first = next(&mut rx).await;
        assert!(matches!(
            first,
            Err(AccessError::Store(StoreError::Decode { .. }))
        ));
        assert!(subscription.is_active());

        // Retiring the bad record brings the subscription back
        ctx.repo.delete("bad").await.unwrap();
        assert!(next(&mut rx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let ctx = setup_repo().await;
        let (subscription, mut rx) = subscribe(&ctx.repo, "u1");
        assert!(next(&mut rx).await.unwrap().is_empty());

        subscription.unsubscribe();
        ctx.repo.create(&quiz("a", "u1", 1)).await.unwrap();

        let end = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(end.is_none());
    }
}
