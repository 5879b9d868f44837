mod common;

use axum::http::StatusCode;
use common::{harness, t};
use shwe_g12::domain::SubjectId;
use shwe_g12::shell::View;

fn slots(rows: &[(&str, &str, &str)]) -> Vec<(&'static str, String)> {
  rows
    .iter()
    .flat_map(|(subject, start, end)| {
      [
        ("subject", subject.to_string()),
        ("start", start.to_string()),
        ("end", end.to_string()),
      ]
    })
    .collect()
}

#[tokio::test]
async fn test_editor_shows_proposal() {
  let h = harness();
  h.server.post("/view/timetable").await;
  let page = h.server.get("/timetable").await;
  page.assert_status_ok();
  assert!(page.text().contains("Fix timetable"));
}

#[tokio::test]
async fn test_lock_starts_scheduler_and_refuses_relock() {
  let h = harness();
  h.server.post("/view/timetable").await;

  let response = h
    .server
    .post("/timetable")
    .form(&slots(&[
      ("math", "12:30", "14:30"),
      ("history", "14:45", "16:00"),
      ("", "", ""),
    ]))
    .await;
  assert_eq!(response.header("location"), "/");
  assert!(h.state.read_shell(|s| s.timetable().is_fixed()));
  assert!(h.state.scheduler_running());
  assert!(h.server.get("/").await.text().contains("Timetable fixed for today"));

  h.server.post("/view/timetable").await;
  h.server
    .post("/timetable")
    .form(&slots(&[("english", "08:00", "09:00")]))
    .await;
  let entries = h
    .state
    .read_shell(|s| s.timetable().timetable().map(|tt| tt.entries().len()));
  assert_eq!(entries, Some(2));
  assert!(
    h.server
      .get("/timetable")
      .await
      .text()
      .contains("Timetable is already fixed for today")
  );
}

#[tokio::test]
async fn test_overlapping_slots_rejected() {
  let h = harness();
  h.server.post("/view/timetable").await;
  h.server
    .post("/timetable")
    .form(&slots(&[("math", "12:30", "14:30"), ("history", "14:00", "15:00")]))
    .await;

  assert!(!h.state.read_shell(|s| s.timetable().is_fixed()));
  assert!(!h.state.scheduler_running());
  assert!(h.server.get("/timetable").await.text().contains("overlap"));
}

#[tokio::test]
async fn test_malformed_time_rejected() {
  let h = harness();
  h.server.post("/view/timetable").await;
  h.server
    .post("/timetable")
    .form(&slots(&[("math", "half past", "14:30")]))
    .await;
  assert!(!h.state.read_shell(|s| s.timetable().is_fixed()));
}

#[tokio::test]
async fn test_clock_tick_switches_to_scheduled_subject() {
  let h = harness();
  h.server.post("/view/timetable").await;
  h.server
    .post("/timetable")
    .form(&slots(&[("history", "14:45", "16:00")]))
    .await;

  // Outside any slot nothing happens
  h.state.clock_tick();
  assert_eq!(h.state.read_shell(|s| s.view()), View::Dashboard);

  h.clock.set(t("15:00"));
  h.state.clock_tick();
  h.state.read_shell(|s| {
    assert_eq!(s.current_subject_id(), SubjectId::History);
    assert_eq!(s.view(), View::Classroom);
  });

  let response = h.server.get("/").await;
  response.assert_status(StatusCode::SEE_OTHER);
  assert_eq!(response.header("location"), "/classroom");
  assert!(h.server.get("/classroom").await.text().contains("Time to study HISTORY!"));
}
