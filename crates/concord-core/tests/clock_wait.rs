//! Waits across a full velocity profile: speed changes, ramps, and jumps
//! all re-time a pending wait so it still fires exactly at its virtual
//! target.

use std::cell::Cell;
use std::rc::Rc;

use concord_core::{ManualTimer, WarpClock};

fn fired_flag() -> (Rc<Cell<bool>>, impl FnOnce()) {
    let fired = Rc::new(Cell::new(false));
    let hook = {
        let fired = Rc::clone(&fired);
        move || fired.set(true)
    };
    (fired, hook)
}

#[test]
fn wait_survives_a_full_velocity_profile() {
    let timer = ManualTimer::new();
    let mut clock = WarpClock::new(0.0, timer.wall_source(), timer.clone());
    let (fired, hook) = fired_flag();
    clock.wait_until(1000.0, hook);

    // Plain running: 200 virtual units consumed.
    timer.advance(200.0);
    assert_eq!(clock.current_time(), 200.0);
    assert!(!fired.get());

    // Half speed: the remaining 800 would now take 1600 wall units.
    clock.set_velocity(0.5).expect("valid velocity");
    timer.advance(400.0);
    assert_eq!(clock.current_time(), 400.0);
    assert!(!fired.get());

    // Ramp in 100 extra units at the default 0.1 rate: a 1000-wall-unit
    // window at effective velocity 0.6. The remaining 600 virtual units
    // are covered exactly when the ramp expires.
    clock.change(100.0).expect("valid ramp");
    timer.advance(999.0);
    assert!(!fired.get());
    timer.advance(1.0);
    assert!(fired.get());
    assert_eq!(clock.current_time(), 1000.0);
    assert_eq!(clock.pending_waits(), 0);
}

#[test]
fn jump_consumes_wait_distance() {
    let timer = ManualTimer::new();
    let mut clock = WarpClock::new(0.0, timer.wall_source(), timer.clone());
    let (fired, hook) = fired_flag();
    clock.wait_until(1000.0, hook);

    timer.advance(300.0);
    clock.jump(400.0).expect("forward jump");
    assert_eq!(clock.current_time(), 700.0);
    assert!(!fired.get());

    // Only 300 virtual units remain to the absolute target.
    timer.advance(299.0);
    assert!(!fired.get());
    timer.advance(1.0);
    assert!(fired.get());
    assert_eq!(clock.current_time(), 1000.0);
}

#[test]
fn parallel_waits_fire_in_target_order() {
    let timer = ManualTimer::new();
    let mut clock = WarpClock::new(0.0, timer.wall_source(), timer.clone());
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    for target in [300.0, 100.0, 200.0] {
        let order = Rc::clone(&order);
        #[allow(clippy::cast_possible_truncation)]
        clock.wait_until(target, move || order.borrow_mut().push(target as i64));
    }
    clock.set_velocity(2.0).expect("valid velocity");
    timer.advance(150.0);
    assert_eq!(*order.borrow(), vec![100, 200, 300]);
}
