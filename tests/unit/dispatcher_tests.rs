/*!
 * Tests for the dispatcher state machine: escalation, retry ceilings,
 * ordering, cancellation and resume.
 */

use std::sync::Arc;
use std::time::Duration;

use subfall::app_config::PoolRole;
use subfall::errors::{AppError, TransportError};
use subfall::providers::mock::MockTranslator;
use subfall::session::{ResolutionState, SessionOutcome};
use subfall::translation::Line;

use crate::common;

#[tokio::test]
async fn test_run_withHealthyPrimaries_shouldResolveEveryChunk() {
    let mock_a = Arc::new(MockTranslator::translating_with("vi:"));
    let mock_b = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![
            common::endpoint("Primary-1", PoolRole::Primary, mock_a.clone()),
            common::endpoint("Primary-2", PoolRole::Primary, mock_b.clone()),
        ],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let lines = common::lines(23);
    let report = dispatcher.run(&lines, None).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.stats.total_chunks, 3);
    assert_eq!(report.stats.resolved_chunks, 3);
    assert_eq!(report.stats.unresolved_chunks, 0);
    assert_eq!(report.outcomes.len(), 23);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.state == ResolutionState::Resolved));
    // Round-robin spread both primaries
    assert_eq!(mock_a.call_count() + mock_b.call_count(), 3);
    assert!(mock_a.call_count() >= 1 && mock_b.call_count() >= 1);
}

#[tokio::test]
async fn test_run_withOutOfOrderCompletion_shouldPreserveLineOrder() {
    // Different per-endpoint delays make chunks complete out of order
    let slow = Arc::new(
        MockTranslator::translating_with("vi:").with_delay(Duration::from_millis(40)),
    );
    let fast = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![
            common::endpoint("Primary-1", PoolRole::Primary, slow),
            common::endpoint("Primary-2", PoolRole::Primary, fast),
        ],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let mut options = common::options();
    options.chunk_size = 5;
    let dispatcher = common::dispatcher(primary, fallback, options);

    let lines = common::lines(60);
    let report = dispatcher.run(&lines, None).await.unwrap();

    // Every line appears exactly once, in index order
    let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indices, (1..=60).collect::<Vec<_>>());
    for outcome in &report.outcomes {
        assert_eq!(
            outcome.translated_text,
            format!("vi:source line {}", outcome.index)
        );
    }
}

#[tokio::test]
async fn test_run_withRejectingPrimaries_shouldEscalateToFallback() {
    let primary_mock = Arc::new(MockTranslator::always_invalid_format());
    let fallback_mock = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, primary_mock.clone())],
    );
    let fallback = common::pool(
        PoolRole::Fallback,
        vec![common::endpoint("Fallback-1", PoolRole::Fallback, fallback_mock)],
    );
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let report = dispatcher.run(&common::lines(3), None).await.unwrap();

    assert_eq!(report.stats.resolved_chunks, 1);
    let primary_stats = report
        .stats
        .endpoints
        .iter()
        .find(|e| e.name == "Primary-1")
        .unwrap();
    assert_eq!(primary_stats.rejected, 1);
    let fallback_stats = report
        .stats
        .endpoints
        .iter()
        .find(|e| e.name == "Fallback-1")
        .unwrap();
    assert_eq!(fallback_stats.accepted, 1);
}

#[tokio::test]
async fn test_run_withEverythingRejecting_shouldExhaustAfterExactRetryCeiling() {
    // 2 primary + 2 fallback endpoints all return the wrong line count
    let primaries: Vec<Arc<MockTranslator>> =
        (0..2).map(|_| Arc::new(MockTranslator::always_wrong_count())).collect();
    let fallbacks: Vec<Arc<MockTranslator>> =
        (0..2).map(|_| Arc::new(MockTranslator::always_wrong_count())).collect();

    let primary = common::pool(
        PoolRole::Primary,
        primaries
            .iter()
            .enumerate()
            .map(|(i, m)| {
                common::endpoint(&format!("Primary-{}", i + 1), PoolRole::Primary, m.clone())
            })
            .collect(),
    );
    let fallback = common::pool(
        PoolRole::Fallback,
        fallbacks
            .iter()
            .enumerate()
            .map(|(i, m)| {
                common::endpoint(&format!("Fallback-{}", i + 1), PoolRole::Fallback, m.clone())
            })
            .collect(),
    );
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let lines = common::lines(3);
    let report = dispatcher.run(&lines, None).await.unwrap();

    // Chunk is unresolved, with the original source text as output
    assert_eq!(report.stats.unresolved_chunks, 1);
    for outcome in &report.outcomes {
        assert_eq!(outcome.state, ResolutionState::Unresolved);
        assert_eq!(outcome.translated_text, outcome.source_text);
    }

    // One primary pass, then exactly retry_rounds (3) full fallback rounds
    for mock in &primaries {
        assert_eq!(mock.call_count(), 1);
    }
    for mock in &fallbacks {
        assert_eq!(mock.call_count(), 3);
    }
}

#[tokio::test]
async fn test_run_withOnlyTransportErrors_shouldBeBoundedByAttemptCeilingNotRounds() {
    let primary_mock = Arc::new(MockTranslator::always_wrong_count());
    let fallback_mock = Arc::new(MockTranslator::always_failing(TransportError::Timeout));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, primary_mock)],
    );
    let fallback = common::pool(
        PoolRole::Fallback,
        vec![common::endpoint("Fallback-1", PoolRole::Fallback, fallback_mock.clone())],
    );
    let mut options = common::options();
    options.max_attempts_per_chunk = 6;
    let dispatcher = common::dispatcher(primary, fallback, options);

    let report = dispatcher.run(&common::lines(2), None).await.unwrap();

    assert_eq!(report.stats.unresolved_chunks, 1);
    // Transport errors never consumed the 3 content-retry rounds: the single
    // fallback identity was tried until the overall attempt ceiling (6) ran
    // out, 1 attempt having gone to the primary
    assert_eq!(fallback_mock.call_count(), 5);
}

#[tokio::test]
async fn test_run_withBlankChunk_shouldResolveLocallyWithoutCalls() {
    let mock = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, mock.clone())],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let lines = vec![Line::new(1, ""), Line::new(2, "   ")];
    let report = dispatcher.run(&lines, None).await.unwrap();

    assert_eq!(mock.call_count(), 0);
    assert_eq!(report.stats.resolved_chunks, 1);
    assert!(report.outcomes.iter().all(|o| o.translated_text.is_empty()));
}

#[tokio::test]
async fn test_run_withEmptySourceLineInChunk_shouldMapToEmptyOutput() {
    let mock = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, mock)],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let lines = vec![
        Line::new(1, "hello"),
        Line::new(2, ""),
        Line::new(3, "world"),
    ];
    let report = dispatcher.run(&lines, None).await.unwrap();

    assert_eq!(report.outcomes[1].translated_text, "");
    assert_eq!(report.outcomes[0].translated_text, "vi:hello");
    assert_eq!(report.outcomes[2].translated_text, "vi:world");
}

#[tokio::test]
async fn test_run_withOneAuthFailure_shouldContinueOnRemainingIdentity() {
    let bad = Arc::new(MockTranslator::always_failing(TransportError::AuthInvalid(
        "HTTP 401".to_string(),
    )));
    let good = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![
            common::endpoint("Primary-1", PoolRole::Primary, bad),
            common::endpoint("Primary-2", PoolRole::Primary, good),
        ],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let report = dispatcher.run(&common::lines(12), None).await.unwrap();

    assert_eq!(report.stats.resolved_chunks, 2);
    let bad_stats = report
        .stats
        .endpoints
        .iter()
        .find(|e| e.name == "Primary-1")
        .unwrap();
    assert!(bad_stats.disabled);
}

#[tokio::test]
async fn test_run_withWholePrimaryPoolAuthInvalid_shouldBeSessionFatal() {
    let bad = Arc::new(MockTranslator::always_failing(TransportError::AuthInvalid(
        "HTTP 403".to_string(),
    )));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, bad)],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let result = dispatcher.run(&common::lines(3), None).await;
    assert!(matches!(result, Err(AppError::PoolExhausted { .. })));
}

#[tokio::test]
async fn test_run_withCancellationBeforeStart_shouldReportEverythingUnresolved() {
    let mock = Arc::new(MockTranslator::translating_with("vi:"));
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint("Primary-1", PoolRole::Primary, mock.clone())],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    dispatcher.cancel_handle().cancel();
    let report = dispatcher.run(&common::lines(23), None).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Canceled);
    assert_eq!(report.stats.unresolved_chunks, 3);
    assert_eq!(mock.call_count(), 0);
    // Partial results still come back with source text retained
    assert_eq!(report.outcomes.len(), 23);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.translated_text == o.source_text));
}

#[tokio::test]
async fn test_run_withEmptyInput_shouldCompleteTrivially() {
    let primary = common::pool(
        PoolRole::Primary,
        vec![common::endpoint(
            "Primary-1",
            PoolRole::Primary,
            Arc::new(MockTranslator::translating_with("vi:")),
        )],
    );
    let fallback = common::pool(PoolRole::Fallback, vec![]);
    let dispatcher = common::dispatcher(primary, fallback, common::options());

    let report = dispatcher.run(&[], None).await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert!(report.outcomes.is_empty());
}

#[tokio::test]
async fn test_run_withResumedSnapshot_shouldSkipResolvedChunks() {
    let lines = common::lines(23);

    // First run resolves everything
    let first_mock = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, first_mock)],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        common::options(),
    );
    let first = dispatcher.run(&lines, None).await.unwrap();
    let mut snapshot = first.snapshot;

    // Mark the middle chunk unresolved so only it gets re-dispatched
    snapshot.chunks[1].state = ResolutionState::Unresolved;

    let second_mock = Arc::new(MockTranslator::translating_with("vi2:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, second_mock.clone())],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        common::options(),
    );
    let second = dispatcher.run(&lines, Some(&snapshot)).await.unwrap();

    assert_eq!(second_mock.call_count(), 1);
    assert_eq!(second.stats.resolved_chunks, 3);
    // Restored chunks keep the first run's output, the re-dispatched chunk
    // carries the second run's
    assert_eq!(second.outcomes[0].translated_text, "vi:source line 1");
    assert_eq!(second.outcomes[10].translated_text, "vi2:source line 11");
}

#[tokio::test]
async fn test_run_withMismatchedSnapshot_shouldIgnoreItAndRedispatch() {
    let lines = common::lines(23);
    let mock = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, mock.clone())],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        common::options(),
    );
    let first = dispatcher.run(&lines, None).await.unwrap();

    // A snapshot taken over a different line count must not seed the run
    let shorter = common::lines(20);
    let mock2 = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, mock2.clone())],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        common::options(),
    );
    let report = dispatcher.run(&shorter, Some(&first.snapshot)).await.unwrap();

    assert_eq!(mock2.call_count(), 2);
    assert_eq!(report.stats.total_chunks, 2);
}
