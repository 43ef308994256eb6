use crate::error::SimError;
use crate::sim::{Event, FnEvent, SimTime, Simulator, World};
use std::any::Any;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct DummyWorld;

impl World for DummyWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Push {
    id: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for Push {
    fn execute(self: Box<Self>, _sim: &mut Simulator, _world: &mut dyn World) {
        let Push { id, log } = *self;
        log.lock().expect("log lock").push(id);
    }
}

/// 每次执行后在 `gap` 之后重新调度自己，直到 `remaining` 用完
struct Repeat {
    remaining: u32,
    gap: SimTime,
    log: Arc<Mutex<Vec<SimTime>>>,
}

impl Event for Repeat {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        let Repeat {
            remaining,
            gap,
            log,
        } = *self;
        log.lock().expect("log lock").push(sim.now());
        if remaining > 1 {
            sim.schedule_in(
                gap,
                Repeat {
                    remaining: remaining - 1,
                    gap,
                    log,
                },
            );
        }
    }
}

fn push(id: u32, log: &Arc<Mutex<Vec<u32>>>) -> Push {
    Push {
        id,
        log: Arc::clone(log),
    }
}

#[test]
fn scheduled_events_order_by_time_then_seq() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    sim.schedule_in(SimTime(20), push(3, &log));
    sim.schedule_in(SimTime(10), push(1, &log));
    sim.schedule_in(SimTime(10), push(2, &log));
    sim.schedule_in(SimTime(0), push(0, &log));
    sim.run(&mut world);

    assert_eq!(*log.lock().expect("log lock"), vec![0, 1, 2, 3]);
    assert_eq!(sim.now(), SimTime(20));
    assert_eq!(sim.events_executed(), 4);
}

#[test]
fn run_until_executes_only_events_within_horizon() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    sim.schedule_in(SimTime::from_millis(5), push(1, &log));
    sim.schedule_in(SimTime::from_millis(10), push(2, &log));
    sim.schedule_in(SimTime::from_millis(11), push(3, &log));

    sim.run_until(SimTime::from_millis(10), &mut world);
    assert_eq!(*log.lock().expect("log lock"), vec![1, 2]);
    assert_eq!(sim.now(), SimTime::from_millis(10));
    assert_eq!(sim.pending_events(), 1);

    assert_eq!(sim.shutdown(), 1);
    assert_eq!(sim.pending_events(), 0);
    sim.run(&mut world);
    assert_eq!(*log.lock().expect("log lock"), vec![1, 2]);
}

#[test]
fn run_until_advances_clock_to_horizon_when_idle() {
    let mut sim = Simulator::default();
    let mut world = DummyWorld;
    sim.run_until(SimTime::from_secs(3), &mut world);
    assert_eq!(sim.now(), SimTime::from_secs(3));
    assert_eq!(sim.events_executed(), 0);
}

#[test]
fn self_rescheduling_events_are_serviced_before_horizon() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    sim.schedule_in(
        SimTime::from_millis(1),
        Repeat {
            remaining: 100,
            gap: SimTime::from_millis(1),
            log: Arc::clone(&log),
        },
    );
    sim.run_until(SimTime::from_millis(10), &mut world);

    let times = log.lock().expect("log lock").clone();
    assert_eq!(times.len(), 10);
    assert_eq!(times.first(), Some(&SimTime::from_millis(1)));
    assert_eq!(times.last(), Some(&SimTime::from_millis(10)));
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sim.pending_events(), 1);
}

#[test]
fn events_scheduled_now_during_execution_run_after_current() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    let inner = Arc::clone(&log);
    sim.schedule_fn(SimTime(5), move |sim, _world| {
        inner.lock().expect("log lock").push(1);
        sim.schedule_in(SimTime::ZERO, Push { id: 3, log: inner });
    });
    sim.schedule_in(SimTime(5), push(2, &log));
    sim.run(&mut world);

    assert_eq!(*log.lock().expect("log lock"), vec![1, 2, 3]);
}

#[test]
fn cancelled_event_never_fires() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    let a = sim.schedule_in(SimTime(10), push(1, &log));
    sim.schedule_in(SimTime(20), push(2, &log));
    assert!(sim.is_pending(a));
    assert!(sim.cancel(a));
    assert!(!sim.is_pending(a));
    sim.run(&mut world);

    assert_eq!(*log.lock().expect("log lock"), vec![2]);
    assert_eq!(sim.events_executed(), 1);
}

#[test]
fn cancel_after_fire_or_twice_is_noop() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sim = Simulator::default();
    let mut world = DummyWorld;

    let a = sim.schedule_in(SimTime(10), push(1, &log));
    sim.run(&mut world);
    assert!(!sim.cancel(a));

    let b = sim.schedule_in(SimTime(10), push(2, &log));
    assert!(sim.cancel(b));
    assert!(!sim.cancel(b));
    sim.run(&mut world);
    assert_eq!(*log.lock().expect("log lock"), vec![1]);
}

#[test]
fn scheduling_in_the_past_is_reported() {
    let mut sim = Simulator::default();
    let mut world = DummyWorld;
    sim.run_until(SimTime::from_secs(2), &mut world);

    let err = sim
        .schedule_at(SimTime::from_secs(1), FnEvent(|_: &mut Simulator, _: &mut dyn World| {}))
        .expect_err("past");
    assert!(matches!(err, SimError::ScheduleInPast { .. }));
    assert!(
        sim.schedule_at(SimTime::from_secs(2), FnEvent(|_: &mut Simulator, _: &mut dyn World| {}))
            .is_ok()
    );
}

#[test]
fn negative_delay_is_reported_not_clamped() {
    let mut sim = Simulator::default();
    let err = sim
        .schedule_in_secs(-0.5, FnEvent(|_: &mut Simulator, _: &mut dyn World| {}))
        .expect_err("negative");
    assert!(matches!(err, SimError::NegativeDelay(d) if d == -0.5));
    assert!(
        sim.schedule_in_secs(f64::NAN, FnEvent(|_: &mut Simulator, _: &mut dyn World| {}))
            .is_err()
    );
    assert_eq!(sim.pending_events(), 0);

    let id = sim
        .schedule_in_secs(0.25, FnEvent(|_: &mut Simulator, _: &mut dyn World| {}))
        .expect("ok");
    assert!(sim.is_pending(id));
}
