use crate::sim::SimTime;

#[test]
fn transmission_time_rounds_to_nearest_nanosecond() {
    // 1040 B @ 5 Mbps = 1.664 ms
    assert_eq!(SimTime::for_bytes_at_rate(1040, 5_000_000), SimTime(1_664_000));
    // 1 B @ 3 bps = 2.666..s
    assert_eq!(SimTime::for_bytes_at_rate(1, 3), SimTime(2_666_666_667));
    assert!(SimTime::for_bytes_at_rate(1, 0) > SimTime::from_secs(1_000_000));
}

#[test]
fn float_seconds_conversion() {
    assert_eq!(SimTime::from_secs_f64(1.5), Some(SimTime::from_millis(1500)));
    assert_eq!(SimTime::from_secs_f64(0.0), Some(SimTime::ZERO));
    assert_eq!(SimTime::from_secs_f64(-1e-9), None);
    assert_eq!(SimTime::from_secs_f64(f64::INFINITY), None);
    assert_eq!(SimTime::from_millis(2).as_secs_f64(), 0.002);
}

#[test]
fn saturating_arithmetic() {
    assert_eq!(SimTime::MAX.saturating_add(SimTime(1)), SimTime::MAX);
    assert_eq!(SimTime(1).saturating_sub(SimTime(2)), SimTime::ZERO);
    assert_eq!(SimTime::from_secs(1).to_string(), "1.000000000s");
}
