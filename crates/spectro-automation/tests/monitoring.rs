//! End-to-end conditional monitoring: a termination conditional
//! watched across a simulated acquisition, indeterminate until enough
//! points exist, tripping once the signal decays.

use spectro_automation::{Conditional, ConditionalKind};
use spectro_core::{DataBlock, RunContext, SignalSeries, SnapshotContext};

#[test]
fn slope_termination_over_growing_history() {
    let cond = Conditional::parse(
        "slope(Ar40)<-0.5 and Ar40.cur>1",
        ConditionalKind::Termination { nfails: 1 },
    )
    .unwrap();

    let mut ctx = SnapshotContext::new().with_signal(SignalSeries::new("Ar40"));
    let data = DataBlock::new(vec!["H1".into()], vec![0.0]);

    // first point: slope is indeterminate, so the whole expression is
    let sig = ctx.signal_mut("Ar40").unwrap();
    sig.push(0.0, 100.0);
    assert_eq!(cond.evaluate(&ctx, &data), None);

    // flat signal: determinate and false
    let sig = ctx.signal_mut("Ar40").unwrap();
    sig.push(1.0, 100.0);
    assert_eq!(cond.evaluate(&ctx, &data), Some(false));

    // steep decay: trips
    let sig = ctx.signal_mut("Ar40").unwrap();
    sig.push(2.0, 10.0);
    sig.push(3.0, 5.0);
    assert_eq!(cond.evaluate(&ctx, &data), Some(true));
}

#[test]
fn window_limits_history_seen_by_check() {
    // A 3-point window over a signal that only misbehaves early:
    // the windowed average recovers once fresh points arrive.
    let spec_yaml = "
truncations:
  - check: average(Ar40, 3) < 1
";
    let conds = spectro_automation::load_conditionals(spec_yaml).unwrap();
    let cond = &conds[0];

    let mut sig = SignalSeries::new("Ar40");
    sig.push(0.0, 0.1);
    sig.push(1.0, 0.2);
    sig.push(2.0, 0.1);
    let ctx = SnapshotContext::new().with_signal(sig);
    let data = DataBlock::default();
    assert_eq!(cond.evaluate(&ctx, &data), Some(true));

    let mut sig = SignalSeries::new("Ar40");
    for (x, y) in [(0.0, 0.1), (1.0, 5.0), (2.0, 5.0), (3.0, 5.0)] {
        sig.push(x, y);
    }
    let ctx = SnapshotContext::new().with_signal(sig);
    assert_eq!(cond.evaluate(&ctx, &data), Some(false));
}
