/*!
 * End-to-end workflow tests: SRT file in, dispatch over mock endpoints,
 * translated SRT file out, snapshot round trip.
 */

use std::sync::Arc;

use subfall::app_config::PoolRole;
use subfall::providers::mock::MockTranslator;
use subfall::session::SessionSnapshot;
use subfall::subtitle_processor::SubtitleCollection;

use crate::common;

const SAMPLE_SRT: &str = "\
1
00:00:01,000 --> 00:00:02,500
first line

2
00:00:03,000 --> 00:00:04,000
second line

3
00:00:05,000 --> 00:00:06,000
third line
";

#[tokio::test]
async fn test_workflow_withSrtFile_shouldWriteTranslatedFile() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("episode.srt");
    let output = dir.path().join("episode.vi.srt");
    std::fs::write(&input, SAMPLE_SRT).unwrap();

    let collection = SubtitleCollection::from_file(&input).unwrap();
    let lines = collection.to_lines();

    let mock = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, mock)],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        common::options(),
    );
    let report = dispatcher.run(&lines, None).await.unwrap();

    collection
        .with_outcomes(&report.outcomes)
        .unwrap()
        .write_to_file(&output)
        .unwrap();

    let translated = SubtitleCollection::from_file(&output).unwrap();
    assert_eq!(translated.entries.len(), 3);
    assert_eq!(translated.entries[0].text, "vi:first line");
    // Timecodes are carried through untouched
    assert_eq!(
        translated.entries[1].timecode,
        collection.entries[1].timecode
    );
}

#[tokio::test]
async fn test_workflow_withSnapshotFile_shouldResumeAcrossRuns() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("episode.subfall.json");

    let lines = common::lines(15);
    let mut options = common::options();
    options.chunk_size = 5;

    let first_mock = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, first_mock)],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        options.clone(),
    );
    let report = dispatcher.run(&lines, None).await.unwrap();
    report.snapshot.save(&snapshot_path).unwrap();

    // A later run seeded from the file re-queries nothing
    let snapshot = SessionSnapshot::load(&snapshot_path).unwrap();
    let second_mock = Arc::new(MockTranslator::translating_with("vi:"));
    let dispatcher = common::dispatcher(
        common::pool(
            PoolRole::Primary,
            vec![common::endpoint("Primary-1", PoolRole::Primary, second_mock.clone())],
        ),
        common::pool(PoolRole::Fallback, vec![]),
        options,
    );
    let resumed = dispatcher.run(&lines, Some(&snapshot)).await.unwrap();

    assert_eq!(second_mock.call_count(), 0);
    assert_eq!(resumed.stats.resolved_chunks, 3);
    assert_eq!(resumed.outcomes.len(), 15);
}
