//! Orchestrator tests against a mocked gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;

use crate::github::MockIssueGateway;
use crate::github::error::ApiError;
use crate::github::models::{ApiIssue, CommentPage, IssueCount, IssuePage, RepoPage, RepoSummary};
use crate::github::rate_limit::RateBudget;
use crate::telemetry::{RecordingTelemetrySink, TelemetryEvent};

use super::checkpoint::MockCheckpointStore;
use super::error::HarvestError;
use super::harvester::{HarvestSettings, Harvester};
use super::runner::run_to_completion;
use super::sink::{DocumentSink, MemorySink};
use super::state::HarvestState;

fn issue(number: u64) -> ApiIssue {
    ApiIssue {
        number,
        comments: 0,
        comments_url: None,
        pull_request: None,
        extra: serde_json::Map::new(),
    }
}

fn pull_request(number: u64) -> ApiIssue {
    ApiIssue {
        pull_request: Some(json!({})),
        ..issue(number)
    }
}

fn commented_issue(number: u64, comments: u64, comments_url: &str) -> ApiIssue {
    ApiIssue {
        comments,
        comments_url: Some(comments_url.to_owned()),
        ..issue(number)
    }
}

fn repo_page(names: &[&str], next_page: Option<u32>) -> RepoPage {
    RepoPage {
        total_count: u64::try_from(names.len()).expect("fixture size fits"),
        items: names
            .iter()
            .map(|name| RepoSummary {
                full_name: (*name).to_owned(),
            })
            .collect(),
        next_page,
        remaining: Some(30),
    }
}

fn issue_page(items: Vec<ApiIssue>, next_page: Option<u32>) -> IssuePage {
    IssuePage {
        items,
        next_page,
        remaining: Some(4000),
    }
}

fn count(total: u64, newest: Option<u64>) -> IssueCount {
    IssueCount {
        total,
        newest_issue_number: newest,
        remaining: Some(29),
    }
}

fn full_budget() -> RateBudget {
    RateBudget {
        core: 5000,
        search: 30,
    }
}

fn settings() -> HarvestSettings {
    HarvestSettings {
        quota_wait: Duration::from_millis(1),
        ..HarvestSettings::default()
    }
}

fn full_sample_settings() -> HarvestSettings {
    HarvestSettings {
        sample_percent: 100,
        ..settings()
    }
}

fn flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn expect_full_quota(gateway: &mut MockIssueGateway) {
    gateway.expect_quota().returning(|| Ok(full_budget()));
}

fn collected_numbers(sink: &MemorySink) -> Vec<u64> {
    sink.collected()
        .expect("sink should list documents")
        .iter()
        .map(|document| {
            document["number"]
                .as_u64()
                .expect("document should carry a number")
        })
        .collect()
}

#[tokio::test]
async fn full_sample_collects_every_issue_across_pages() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(6, Some(600))));
    gateway
        .expect_issue_page()
        .times(3)
        .returning(|_, page| match page {
            1 => Ok(issue_page(vec![issue(600), issue(599)], Some(2))),
            2 => Ok(issue_page(vec![issue(598), issue(597)], Some(3))),
            _ => Ok(issue_page(vec![issue(596), issue(595)], None)),
        });

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![600, 599, 598, 597, 596, 595]);
    assert_eq!(harvester.state().collected_items, 6);
    assert!(harvester.state().target_met());
}

#[tokio::test]
async fn pull_requests_do_not_consume_sample_ranks() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway.expect_closed_issue_count().never();
    gateway
        .expect_issue_page()
        .times(1)
        .returning(|_, _| Ok(issue_page(vec![pull_request(10), issue(9), issue(8)], None)));

    let mut resumed = HarvestState::new();
    resumed.repo_name = "octo/alpha".to_owned();
    resumed.interrupted = true;
    resumed.repo_sample.insert(0);
    resumed.collect_total = 1;

    let sink = MemorySink::new();
    let mut harvester = Harvester::with_state(&gateway, &sink, settings(), flag(), resumed);

    harvester.run().await.expect("run should complete");

    // The pull request sits outside the sample frame, so rank 0 falls on
    // the first real issue.
    assert_eq!(collected_numbers(&sink), vec![9]);
}

#[tokio::test]
async fn issues_above_the_count_snapshot_are_skipped() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(2, Some(100))));
    gateway
        .expect_issue_page()
        .times(1)
        .returning(|_, _| Ok(issue_page(vec![issue(150), issue(100), issue(99)], None)));

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![100, 99]);
}

#[tokio::test]
async fn snapshot_skipping_can_be_disabled() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(3, Some(100))));
    gateway
        .expect_issue_page()
        .times(1)
        .returning(|_, _| Ok(issue_page(vec![issue(150), issue(100), issue(99)], None)));

    let relaxed = HarvestSettings {
        skip_above_snapshot: false,
        ..full_sample_settings()
    };
    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, relaxed, flag());

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![150, 100, 99]);
}

#[tokio::test]
async fn traversal_stops_fetching_pages_once_the_target_is_met() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway.expect_closed_issue_count().never();
    gateway
        .expect_issue_page()
        .times(1)
        .returning(|_, _| Ok(issue_page(vec![issue(30), issue(29), issue(28)], Some(2))));

    let mut resumed = HarvestState::new();
    resumed.repo_name = "octo/alpha".to_owned();
    resumed.interrupted = true;
    resumed.repo_sample.extend([0, 1]);
    resumed.collect_total = 2;

    let sink = MemorySink::new();
    let mut harvester = Harvester::with_state(&gateway, &sink, settings(), flag(), resumed);

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![30, 29]);
    assert_eq!(
        harvester.state().issues_page,
        2,
        "the next-page cursor advances even when the target cuts the stream short"
    );
}

#[tokio::test]
async fn repositories_without_matching_issues_are_skipped() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/quiet", "octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(2)
        .returning(|repo| {
            if repo == "octo/quiet" {
                Ok(count(0, None))
            } else {
                Ok(count(1, Some(5)))
            }
        });
    gateway
        .expect_issue_page()
        .times(1)
        .withf(|repo, _| repo == "octo/alpha")
        .returning(|_, _| Ok(issue_page(vec![issue(5)], None)));

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![5]);
}

#[tokio::test]
async fn repositories_with_a_zero_sample_target_are_skipped() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/tiny"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(1, Some(1))));
    gateway.expect_issue_page().never();

    let sink = MemorySink::new();
    // 25% of one issue rounds down to a target of zero.
    let mut harvester = Harvester::new(&gateway, &sink, settings(), flag());

    harvester.run().await.expect("run should complete");

    assert!(collected_numbers(&sink).is_empty());
}

#[tokio::test]
async fn resume_skips_visited_repositories_and_keeps_the_plan() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .withf(|page| *page == 2)
        .returning(|_| Ok(repo_page(&["octo/zeta", "octo/alpha"], None)));
    gateway.expect_closed_issue_count().never();
    gateway
        .expect_issue_page()
        .times(1)
        .withf(|repo, page| repo == "octo/alpha" && *page == 3)
        .returning(|_, _| Ok(issue_page(vec![issue(400)], None)));

    let mut resumed = HarvestState::new();
    resumed.repos_page = 2;
    resumed.repo_name = "octo/alpha".to_owned();
    resumed.interrupted = true;
    resumed.issues_page = 3;
    resumed.issue_number = 500;
    resumed.repo_sample.insert(2);
    resumed.total_issues = 4;
    resumed.collect_total = 1;
    resumed.current_index = 2;

    let sink = MemorySink::new();
    let mut harvester = Harvester::with_state(&gateway, &sink, settings(), flag(), resumed);

    harvester.run().await.expect("run should complete");

    assert_eq!(collected_numbers(&sink), vec![400]);
    assert!(!harvester.state().interrupted);
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_blocks_until_the_budget_returns() {
    let quota_calls = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&quota_calls);

    let mut gateway = MockIssueGateway::new();
    gateway.expect_quota().returning(move || {
        let call = observed.fetch_add(1, Ordering::SeqCst);
        if call < 2 {
            Ok(RateBudget {
                core: 100,
                search: 0,
            })
        } else {
            Ok(full_budget())
        }
    });
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&[], None)));

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, settings(), flag());

    harvester.run().await.expect("run should complete");

    assert_eq!(
        quota_calls.load(Ordering::SeqCst),
        3,
        "an exhausted budget must be requeried after each wait"
    );
}

#[tokio::test]
async fn a_raised_interrupt_flag_stops_the_run_before_any_request() {
    let gateway = MockIssueGateway::new();
    let sink = MemorySink::new();
    let interrupt = flag();
    interrupt.store(true, Ordering::Relaxed);

    let mut harvester = Harvester::new(&gateway, &sink, settings(), interrupt);

    let error = harvester.run().await.expect_err("run should stop");
    assert!(error.is_interrupt());
}

#[tokio::test]
async fn comments_are_collected_across_every_page() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(1, Some(7))));
    gateway.expect_issue_page().times(1).returning(|_, _| {
        Ok(issue_page(
            vec![commented_issue(7, 3, "https://example.test/comments")],
            None,
        ))
    });
    gateway
        .expect_comment_page()
        .times(2)
        .withf(|url, _| url == "https://example.test/comments")
        .returning(|_, page| {
            if page == 1 {
                Ok(CommentPage {
                    items: vec![json!({ "id": 1 }), json!({ "id": 2 })],
                    next_page: Some(2),
                    remaining: Some(4000),
                })
            } else {
                Ok(CommentPage {
                    items: vec![json!({ "id": 3 })],
                    next_page: None,
                    remaining: Some(3999),
                })
            }
        });

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    harvester.run().await.expect("run should complete");

    let documents = sink.collected().expect("sink should list documents");
    let comments = documents
        .first()
        .and_then(|document| document["issue_comments"].as_array())
        .expect("document should carry its comments");
    assert_eq!(comments.len(), 3);
}

#[tokio::test]
async fn a_commented_issue_without_a_comments_url_is_a_payload_error() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(1)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(1, Some(7))));
    gateway.expect_issue_page().times(1).returning(|_, _| {
        let mut malformed = issue(7);
        malformed.comments = 2;
        Ok(issue_page(vec![malformed], None))
    });

    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    let error = harvester.run().await.expect_err("run should fail");
    assert!(matches!(
        error,
        HarvestError::Api(ApiError::UnexpectedPayload { .. })
    ));
}

#[tokio::test]
async fn runner_restarts_once_after_an_unclassified_failure() {
    let attempts = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&attempts);

    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway.expect_repository_page().times(2).returning(move |_| {
        if observed.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ApiError::Api {
                message: "boom".to_owned(),
            })
        } else {
            Ok(repo_page(&[], None))
        }
    });

    let mut checkpoints = MockCheckpointStore::new();
    checkpoints
        .expect_save()
        .times(1)
        .withf(|state| state.interrupted)
        .returning(|_| Ok(()));
    checkpoints
        .expect_save()
        .times(1)
        .withf(|state| !state.interrupted)
        .returning(|_| Ok(()));

    let telemetry = RecordingTelemetrySink::default();
    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, settings(), flag());

    run_to_completion(&mut harvester, &checkpoints, &telemetry)
        .await
        .expect("the restarted run should complete");

    let events = telemetry.take();
    assert!(matches!(
        events.as_slice(),
        [TelemetryEvent::RunRestarted { .. }]
    ));
}

#[tokio::test]
async fn a_failed_comment_fetch_keeps_the_sampled_rank_for_the_restart() {
    let comment_calls = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&comment_calls);

    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway
        .expect_repository_page()
        .times(2)
        .returning(|_| Ok(repo_page(&["octo/alpha"], None)));
    gateway
        .expect_closed_issue_count()
        .times(1)
        .returning(|_| Ok(count(4, Some(40))));
    gateway.expect_issue_page().times(2).returning(|_, _| {
        Ok(issue_page(
            vec![
                commented_issue(40, 1, "https://example.test/comments"),
                issue(39),
                issue(38),
                issue(37),
            ],
            None,
        ))
    });
    gateway
        .expect_comment_page()
        .times(2)
        .returning(move |_, _| {
            if observed.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiError::Api {
                    message: "connection dropped mid-listing".to_owned(),
                })
            } else {
                Ok(CommentPage {
                    items: vec![json!({ "id": 1 })],
                    next_page: None,
                    remaining: Some(4000),
                })
            }
        });

    let mut checkpoints = MockCheckpointStore::new();
    checkpoints
        .expect_save()
        .times(1)
        .withf(|state| state.interrupted && state.current_index == 0)
        .returning(|_| Ok(()));
    checkpoints
        .expect_save()
        .times(1)
        .withf(|state| !state.interrupted)
        .returning(|_| Ok(()));

    let telemetry = RecordingTelemetrySink::default();
    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, full_sample_settings(), flag());

    run_to_completion(&mut harvester, &checkpoints, &telemetry)
        .await
        .expect("the restarted run should complete");

    // Rank 0 stayed unconsumed across the failure, so the restart collects
    // the full sample rather than skipping past the failed issue.
    assert_eq!(collected_numbers(&sink), vec![40, 39, 38, 37]);
    assert_eq!(harvester.state().collected_items, 4);
    assert!(harvester.state().target_met());
}

#[tokio::test]
async fn runner_gives_up_after_the_restart_also_fails() {
    let mut gateway = MockIssueGateway::new();
    expect_full_quota(&mut gateway);
    gateway.expect_repository_page().times(2).returning(|_| {
        Err(ApiError::Api {
            message: "still broken".to_owned(),
        })
    });

    let mut checkpoints = MockCheckpointStore::new();
    checkpoints
        .expect_save()
        .times(2)
        .withf(|state| state.interrupted)
        .returning(|_| Ok(()));

    let telemetry = RecordingTelemetrySink::default();
    let sink = MemorySink::new();
    let mut harvester = Harvester::new(&gateway, &sink, settings(), flag());

    let error = run_to_completion(&mut harvester, &checkpoints, &telemetry)
        .await
        .expect_err("the second failure should surface");
    assert!(matches!(error, HarvestError::Api(ApiError::Api { .. })));
}

#[tokio::test]
async fn runner_checkpoints_but_never_restarts_an_interrupt() {
    let gateway = MockIssueGateway::new();

    let mut checkpoints = MockCheckpointStore::new();
    checkpoints
        .expect_save()
        .times(1)
        .withf(|state| state.interrupted)
        .returning(|_| Ok(()));

    let telemetry = RecordingTelemetrySink::default();
    let sink = MemorySink::new();
    let interrupt = flag();
    interrupt.store(true, Ordering::Relaxed);
    let mut harvester = Harvester::new(&gateway, &sink, settings(), interrupt);

    let error = run_to_completion(&mut harvester, &checkpoints, &telemetry)
        .await
        .expect_err("the interrupt should surface");
    assert!(error.is_interrupt());
    assert!(telemetry.take().is_empty(), "no restart may be recorded");
}
