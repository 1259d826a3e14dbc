//! Summing numbers found in text files.
//!
//! Inputs are the list of open files and the text of each file; derived rules
//! parse each file into numbers, sum each file, and total the open files.

use std::sync::Arc;

use anyhow::Context;
use target_flow::{BuildError, EvalCollector, Incremental, Input, Reader, Rule, Target};

// ============================================================================
// Rules
// ============================================================================

struct OpenFiles;

impl Input for OpenFiles {
    const NAME: &'static str = "OPEN_FILES";
    type Args = ();
    type Value = Vec<String>;
}

struct FileText;

impl Input for FileText {
    const NAME: &'static str = "FILE_TEXT";
    type Args = (String,);
    type Value = String;
}

struct FileNums;

impl Rule for FileNums {
    const NAME: &'static str = "FILE_NUMS";
    type Args = (String,);
    type Value = Vec<i64>;

    fn eval(reader: &impl Reader, (path,): Self::Args) -> Result<Vec<i64>, BuildError> {
        let text = reader.get_or_eval::<FileText>((path.clone(),))?;
        let mut nums = Vec::new();
        for line in text.split('\n').map(str::trim).filter(|line| !line.is_empty()) {
            let num = line
                .parse::<i64>()
                .with_context(|| format!("{}: not a number: {:?}", path, line))?;
            nums.push(num);
        }
        Ok(nums)
    }
}

struct FileSum;

impl Rule for FileSum {
    const NAME: &'static str = "FILE_SUM";
    type Args = (String,);
    type Value = i64;

    fn eval(reader: &impl Reader, (path,): Self::Args) -> Result<i64, BuildError> {
        Ok(reader.get_or_eval::<FileNums>((path,))?.iter().sum())
    }
}

struct Total;

impl Rule for Total {
    const NAME: &'static str = "TOTAL";
    type Args = ();
    type Value = i64;

    fn eval(reader: &impl Reader, (): Self::Args) -> Result<i64, BuildError> {
        let paths = reader.get_or_eval::<OpenFiles>(())?;
        let mut total = 0;
        for path in paths.iter() {
            total += *reader.get_or_eval::<FileSum>((path.clone(),))?;
        }
        Ok(total)
    }
}

struct FileBelow;

impl Rule for FileBelow {
    const NAME: &'static str = "FILE_BELOW";
    type Args = (String, i64);
    type Value = bool;

    fn eval(reader: &impl Reader, (path, limit): Self::Args) -> Result<bool, BuildError> {
        Ok(*reader.get_or_eval::<FileSum>((path,))? < limit)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn path(p: &str) -> (String,) {
    (p.to_string(),)
}

fn set_text(engine: &mut Incremental, p: &str, text: &str) -> bool {
    engine.set_input::<FileText>(path(p), text.to_string())
}

fn open(engine: &mut Incremental, paths: &[&str]) -> bool {
    engine.set_input::<OpenFiles>((), paths.iter().map(|p| p.to_string()).collect())
}

fn setup() -> (Incremental, Arc<EvalCollector>) {
    let collector = Arc::new(EvalCollector::new());
    let mut engine = Incremental::with_handler(collector.clone());
    open(&mut engine, &["foo.txt", "bar.txt"]);
    set_text(&mut engine, "foo.txt", "10\n20\n\n 30 ");
    set_text(&mut engine, "bar.txt", "100");
    (engine, collector)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_inputs_read_back() {
    let (engine, _collector) = setup();
    assert_eq!(
        *engine.get_or_eval::<OpenFiles>(()).unwrap(),
        vec!["foo.txt".to_string(), "bar.txt".to_string()]
    );
    assert_eq!(*engine.get_or_eval::<FileText>(path("bar.txt")).unwrap(), "100");
}

#[test]
fn test_file_nums_and_sum() {
    let (engine, _collector) = setup();
    assert_eq!(
        *engine.get_or_eval::<FileNums>(path("foo.txt")).unwrap(),
        vec![10, 20, 30]
    );
    assert_eq!(*engine.get_or_eval::<FileSum>(path("foo.txt")).unwrap(), 60);
}

#[test]
fn test_total() {
    let (engine, _collector) = setup();
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
}

#[test]
fn test_recalc() {
    let (mut engine, collector) = setup();

    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
    assert_eq!(
        collector.take_targets_to_string(),
        vec![
            "FILE_NUMS(foo.txt)",
            "FILE_SUM(foo.txt)",
            "FILE_NUMS(bar.txt)",
            "FILE_SUM(bar.txt)",
            "TOTAL()",
        ]
    );

    // Idempotent re-read.
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
    assert!(collector.take_targets_to_string().is_empty());

    // Only bar and the total are touched.
    set_text(&mut engine, "bar.txt", "101");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 161);
    assert_eq!(
        collector.take_targets_to_string(),
        vec!["FILE_NUMS(bar.txt)", "FILE_SUM(bar.txt)", "TOTAL()"]
    );

    // Reformatting re-parses to the same numbers.
    set_text(&mut engine, "bar.txt", "\n 101 \n");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 161);
    assert_eq!(collector.take_targets_to_string(), vec!["FILE_NUMS(bar.txt)"]);

    // Different numbers, same sum.
    set_text(&mut engine, "bar.txt", "41\n60");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 161);
    assert_eq!(
        collector.take_targets_to_string(),
        vec!["FILE_NUMS(bar.txt)", "FILE_SUM(bar.txt)"]
    );
}

#[test]
fn test_write_stability() {
    let (mut engine, collector) = setup();
    engine.get_or_eval::<Total>(()).unwrap();
    collector.take_targets();
    let rev = engine.revision();

    assert!(!set_text(&mut engine, "foo.txt", "10\n20\n\n 30 "));
    assert!(!open(&mut engine, &["foo.txt", "bar.txt"]));
    assert_eq!(engine.revision(), rev);
    assert!(collector.take_inputs().is_empty());

    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
    assert!(collector.take_targets().is_empty());
}

#[test]
fn test_unrelated_targets_stay_cached() {
    let (mut engine, collector) = setup();
    engine.get_or_eval::<Total>(()).unwrap();
    engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 100)).unwrap();
    collector.take_targets();

    set_text(&mut engine, "bar.txt", "1");
    assert!(*engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 100)).unwrap());
    assert!(collector.take_targets().is_empty());

    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 61);
    assert_eq!(
        collector.take_targets_to_string(),
        vec!["FILE_NUMS(bar.txt)", "FILE_SUM(bar.txt)", "TOTAL()"]
    );
}

#[test]
fn test_file_below_distinct_limits() {
    let (mut engine, collector) = setup();
    assert!(!*engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 20)).unwrap());
    assert!(*engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 61)).unwrap());
    assert_eq!(
        collector.take_targets_to_string(),
        vec![
            "FILE_NUMS(foo.txt)",
            "FILE_SUM(foo.txt)",
            "FILE_BELOW(foo.txt, 20)",
            "FILE_BELOW(foo.txt, 61)",
        ]
    );

    // The sum changes but stays below 61: only the first limit flips.
    set_text(&mut engine, "foo.txt", "15");
    assert!(*engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 20)).unwrap());
    assert!(*engine.get_or_eval::<FileBelow>(("foo.txt".to_string(), 61)).unwrap());
    assert_eq!(
        collector.take_targets_to_string(),
        vec![
            "FILE_NUMS(foo.txt)",
            "FILE_SUM(foo.txt)",
            "FILE_BELOW(foo.txt, 20)",
            "FILE_BELOW(foo.txt, 61)",
        ]
    );
}

#[test]
fn test_opening_a_file() {
    let (mut engine, collector) = setup();
    engine.get_or_eval::<Total>(()).unwrap();
    collector.take_targets();

    set_text(&mut engine, "baz.txt", "5\n5");
    open(&mut engine, &["foo.txt", "bar.txt", "baz.txt"]);
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 170);
    assert_eq!(
        collector.take_targets_to_string(),
        vec!["FILE_NUMS(baz.txt)", "FILE_SUM(baz.txt)", "TOTAL()"]
    );

    let deps: Vec<String> = engine
        .dependencies::<Total>(())
        .unwrap()
        .iter()
        .map(Target::to_string)
        .collect();
    assert_eq!(
        deps,
        vec![
            "OPEN_FILES()",
            "FILE_SUM(foo.txt)",
            "FILE_SUM(bar.txt)",
            "FILE_SUM(baz.txt)",
        ]
    );
}

#[test]
fn test_closing_a_file_drops_dependency() {
    let (mut engine, collector) = setup();
    engine.get_or_eval::<Total>(()).unwrap();

    open(&mut engine, &["foo.txt"]);
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 60);
    collector.take_targets();

    // bar is no longer read, so editing it leaves the total alone.
    set_text(&mut engine, "bar.txt", "999");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 60);
    assert!(collector.take_targets().is_empty());
}

#[test]
fn test_unset_file_text() {
    let mut engine = Incremental::new();
    open(&mut engine, &["missing.txt"]);

    let err = engine.get_or_eval::<Total>(()).unwrap_err();
    let unset = err.as_unset_input().expect("unset input");
    assert_eq!(unset.target().to_string(), "FILE_TEXT(missing.txt)");
    assert_eq!(err.to_string(), "input for FILE_TEXT(missing.txt) should be set");

    set_text(&mut engine, "missing.txt", "3");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 3);
}

#[test]
fn test_malformed_number() {
    let (mut engine, collector) = setup();
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
    collector.take_targets();

    set_text(&mut engine, "bar.txt", "1\nabc");
    let err = engine.get_or_eval::<Total>(()).unwrap_err();
    assert!(matches!(err, BuildError::Rule(_)));
    assert!(err.to_string().contains("bar.txt: not a number"));
    assert!(err.downcast_ref::<std::num::ParseIntError>().is_some());
    assert!(collector.take_targets().is_empty());

    // The failed targets kept their old entries and are retried.
    set_text(&mut engine, "bar.txt", "100");
    assert_eq!(*engine.get_or_eval::<Total>(()).unwrap(), 160);
    assert_eq!(collector.take_targets_to_string(), vec!["FILE_NUMS(bar.txt)"]);
}
