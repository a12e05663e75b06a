//! Retry controller scenarios against a scripted comparator.

use std::collections::{HashMap, VecDeque};
use std::fs;

use tempfile::TempDir;

use regime_reconcile_core::config::LayoutConfig;
use regime_reconcile_core::matcher::DistanceMetric;
use regime_reconcile_core::report::RunReport;
use regime_reconcile_core::resolver::{LutResolver, LutSource};
use regime_reconcile_core::{
    pair_schedule, CancelToken, DiffResult, GreedyMatcher, PairComparator, PairStatus,
    ReconcileController, ReconcileError, ReconcileResult, RetryPolicy, RunDirectory, RunPair,
    TallyLog,
};

struct Scripted {
    scores: HashMap<String, VecDeque<DiffResult>>,
}

impl Scripted {
    fn new(script: Vec<(&str, Vec<(usize, f64)>)>) -> Self {
        let scores = script
            .into_iter()
            .map(|(tag, attempts)| {
                let queue = attempts
                    .into_iter()
                    .map(|(count, percent)| DiffResult { count, percent })
                    .collect();
                (tag.to_string(), queue)
            })
            .collect();
        Self { scores }
    }
}

impl PairComparator for Scripted {
    fn compare(&mut self, pair: &RunPair) -> ReconcileResult<DiffResult> {
        let tag = pair.tag().to_string();
        self.scores
            .get_mut(&tag)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ReconcileError::trainer(format!("no score left for {}", tag)))
    }
}

fn run(tag: &str) -> RunDirectory {
    RunDirectory::new(format!("/data/2019-GA/SOM_5x5_4_00724_3_{}", tag))
}

fn adjacent_pairs(tags: &[&str]) -> Vec<RunPair> {
    tags.windows(2)
        .enumerate()
        .map(|(i, w)| RunPair {
            first: run(w[0]),
            second: run(w[1]),
            first_index: i,
            second_index: i + 1,
        })
        .collect()
}

#[test]
fn test_three_pair_tally() {
    let tmp = TempDir::new().unwrap();
    let tally_path = tmp.path().join("tally_diffs.txt");

    let pairs = adjacent_pairs(&["02", "03", "04", "05"]);
    let mut comparator = Scripted::new(vec![
        ("02-03", vec![(1200, 2.1)]),
        ("03-04", vec![(500, 0.9)]),
        ("04-05", vec![(900, 6.2), (880, 5.5)]),
    ]);

    let mut tally = TallyLog::create(&tally_path).unwrap();
    let mut controller =
        ReconcileController::new(RetryPolicy { threshold: 4.0, budget: 2 }, CancelToken::new());
    let report = controller.run(&pairs, &mut comparator, &mut tally).unwrap();
    drop(tally);

    let text = fs::read_to_string(&tally_path).unwrap();
    println!("[AFTER] {}", text);
    assert_eq!(
        text,
        "dirs,num_diff_pixels,% diff\n02-03,1200,2.10\n03-04,500,0.90\n04-05,880,5.50\n"
    );
    assert_eq!(text.lines().filter(|l| l.is_empty()).count(), 0);

    let statuses: Vec<PairStatus> = report.pairs.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        [PairStatus::Accepted, PairStatus::Accepted, PairStatus::Abandoned]
    );
    println!("[VERIFIED] three rows in processing order, abandoned pair recorded");
}

#[test]
fn test_report_round_trip_after_run() {
    let tmp = TempDir::new().unwrap();
    let pairs = adjacent_pairs(&["02", "03", "04"]);
    let mut comparator = Scripted::new(vec![
        ("02-03", vec![(40, 4.5), (30, 3.0)]),
        ("03-04", vec![(10, 1.0)]),
    ]);
    let mut tally = TallyLog::new(Vec::new(), "memory").unwrap();
    let mut controller =
        ReconcileController::new(RetryPolicy { threshold: 4.0, budget: 3 }, CancelToken::new());

    let report = controller.run(&pairs, &mut comparator, &mut tally).unwrap();
    let path = tmp.path().join("reconcile_report.json");
    report.write_to(&path).unwrap();

    let back = RunReport::read_from(&path).unwrap();
    assert_eq!(back.pairs[0].status, PairStatus::AcceptedAfterRetry);
    assert_eq!(back.pairs[0].attempts, 2);
    assert_eq!(back.threshold, Some(4.0));
    assert!(back.finished_at.is_some());
}

#[test]
fn test_self_pair_uses_identity_without_lut_lookup() {
    let tmp = TempDir::new().unwrap();
    let lut_dir = tmp.path().join("LUTs");
    fs::create_dir(&lut_dir).unwrap();
    // a file the resolver must not read
    fs::write(lut_dir.join("02-02.lut"), "not,a,lut").unwrap();

    let layout = LayoutConfig {
        nclasses: 3,
        lut_dir: Some(lut_dir),
        ..LayoutConfig::default()
    };
    let matcher = GreedyMatcher::new(DistanceMetric::Euclidean);
    let resolver = LutResolver::new(&layout, &matcher);

    let runs = vec![run("02"), run("03")];
    let schedule = pair_schedule(&runs, true);
    let self_pairs: Vec<&RunPair> = schedule.iter().filter(|p| p.is_self_pair()).collect();
    assert_eq!(self_pairs.len(), 2);

    for pair in self_pairs {
        let (lut, source) = resolver.resolve(pair).unwrap();
        assert_eq!(source, LutSource::Identity);
        assert!(lut.is_identity());
        assert_eq!(lut.len(), 3);
    }

    // the cross pair has no file and no neuron tables on disk
    let cross = schedule.iter().find(|p| !p.is_self_pair()).unwrap();
    assert!(resolver.resolve(cross).is_err());
    assert_eq!(
        resolver.lut_path(cross),
        Some(tmp.path().join("LUTs").join("02-03.lut"))
    );
}
