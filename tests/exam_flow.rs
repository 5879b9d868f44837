mod common;

use axum::http::StatusCode;
use common::{harness, harness_with_exam_secs, Harness};
use shwe_g12::exam::{ExamOutcome, ExamResult, LATE_SUBMIT_GRACE};
use shwe_g12::shell::View;
use std::time::Duration;

async fn short_exam(secs: u32) -> Harness {
  let h = harness_with_exam_secs(secs);
  h.open_subject("history").await;
  h.upload_pages(1).await;
  h.server.post("/exam/start").await;
  h.wait_for_exam("in_progress").await;
  h
}

fn last_exam(h: &Harness) -> ExamResult {
  h.state.read_shell(|s| s.last_exam().cloned()).unwrap()
}

#[tokio::test]
async fn test_exam_needs_material() {
  let h = harness();
  h.open_subject("history").await;

  let response = h.server.post("/exam/start").await;
  assert_eq!(response.header("location"), "/classroom");
  assert_eq!(h.exam_phase(), None);
  assert_eq!(h.gateway.exam_calls(), 0);
}

#[tokio::test]
async fn test_take_and_submit_exam() {
  let h = harness();
  h.open_subject("history").await;
  h.upload_pages(2).await;

  let response = h.server.post("/exam/start").await;
  assert_eq!(response.header("location"), "/exam");
  h.wait_for_exam("in_progress").await;
  assert!(h.state.countdown_running());

  let page = h.server.get("/exam").await;
  page.assert_status_ok();
  let html = page.text();
  assert!(html.contains("Which option is correct?"));
  assert!(html.contains("proctor.js"));

  let response = h
    .server
    .post("/exam/submit")
    .form(&[("q1", "B"), ("q2", "paris")])
    .await;
  assert_eq!(response.header("location"), "/");

  let result = h.state.read_shell(|s| s.last_exam().cloned()).unwrap();
  assert_eq!(result.outcome, ExamOutcome::Submitted);
  assert_eq!(result.score, 3);
  assert_eq!(result.total_marks, 5);
  assert_eq!(result.needs_review, vec![2]);
  assert!(!h.state.countdown_running());
  assert!(h.server.get("/").await.text().contains("Score: 3/5"));
}

#[tokio::test]
async fn test_focus_loss_disqualifies() {
  let h = harness();
  h.open_subject("economics").await;
  h.upload_pages(1).await;
  h.server.post("/exam/start").await;
  h.wait_for_exam("in_progress").await;

  h.server
    .post("/exam/answer")
    .form(&[("question_id", "1"), ("answer", "B")])
    .await;
  h.server
    .post("/exam/focus-lost")
    .await
    .assert_status(StatusCode::NO_CONTENT);

  let result = h.state.read_shell(|s| s.last_exam().cloned()).unwrap();
  assert_eq!(result.outcome, ExamOutcome::Disqualified);
  assert_eq!(result.score, 0);
  assert_eq!(h.exam_phase(), Some("disqualified"));
  assert_eq!(h.state.read_shell(|s| s.view()), View::Dashboard);

  // A late beacon changes nothing
  h.server.post("/exam/focus-lost").await;
  assert_eq!(h.exam_phase(), Some("disqualified"));
}

#[tokio::test]
async fn test_leaving_exam_view_counts_as_breach() {
  let h = harness();
  h.open_subject("myanmar").await;
  h.upload_pages(1).await;
  h.server.post("/exam/start").await;
  h.wait_for_exam("in_progress").await;

  h.server.post("/view/classroom").await;
  let result = h.state.read_shell(|s| s.last_exam().cloned()).unwrap();
  assert_eq!(result.outcome, ExamOutcome::Disqualified);
}

#[tokio::test]
async fn test_failed_load_can_be_retried() {
  let h = harness();
  h.gateway.fail_next_exams(1);
  h.open_subject("geography").await;
  h.upload_pages(1).await;

  h.server.post("/exam/start").await;
  h.wait_for_exam("load_failed").await;
  assert!(!h.state.countdown_running());
  assert!(h.server.get("/exam").await.text().contains("Try again"));

  let response = h.server.post("/exam/retry").await;
  assert_eq!(response.header("location"), "/exam");
  h.wait_for_exam("in_progress").await;
  assert_eq!(h.gateway.exam_calls(), 2);
}

#[tokio::test]
async fn test_second_start_while_running_is_ignored() {
  let h = harness();
  h.open_subject("history").await;
  h.upload_pages(1).await;
  h.server.post("/exam/start").await;
  h.wait_for_exam("in_progress").await;

  let response = h.server.post("/exam/start").await;
  assert_eq!(response.header("location"), "/exam");
  assert_eq!(h.gateway.exam_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_scores_autosaved_answers() {
  let h = short_exam(5).await;

  h.server
    .post("/exam/answer")
    .form(&[("question_id", "1"), ("answer", "B")])
    .await
    .assert_status(StatusCode::NO_CONTENT);
  tokio::time::sleep(Duration::from_secs(6)).await;

  let result = last_exam(&h);
  assert_eq!(result.outcome, ExamOutcome::TimedOut);
  assert_eq!(result.score, 3);
  assert_eq!(h.exam_phase(), Some("submitted"));
  assert!(!h.state.countdown_running());
}

#[tokio::test(start_paused = true)]
async fn test_autosave_after_finish_is_rejected() {
  let h = short_exam(5).await;
  tokio::time::sleep(Duration::from_secs(6)).await;

  h.server
    .post("/exam/answer")
    .form(&[("question_id", "1"), ("answer", "B")])
    .await
    .assert_status(StatusCode::CONFLICT);
  assert_eq!(last_exam(&h).score, 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_form_racing_the_countdown_is_scored() {
  let h = short_exam(5).await;
  tokio::time::sleep(Duration::from_secs(6)).await;
  assert_eq!(last_exam(&h).score, 0);

  let response = h
    .server
    .post("/exam/submit")
    .form(&[("q1", "B"), ("q2", "Paris")])
    .await;
  assert_eq!(response.header("location"), "/");

  let result = last_exam(&h);
  assert_eq!(result.outcome, ExamOutcome::TimedOut);
  assert_eq!(result.score, 5);
  let home = h.server.get("/").await.text();
  assert!(home.contains("Score: 5/5"));
  assert!(!home.contains("Score: 0/5"));
}

#[tokio::test(start_paused = true)]
async fn test_answer_form_after_grace_is_rejected() {
  let h = short_exam(5).await;
  tokio::time::sleep(Duration::from_secs(6) + LATE_SUBMIT_GRACE).await;

  h.server
    .post("/exam/submit")
    .form(&[("q1", "B"), ("q2", "Paris")])
    .await;
  let result = last_exam(&h);
  assert_eq!(result.outcome, ExamOutcome::TimedOut);
  assert_eq!(result.score, 0);
}
