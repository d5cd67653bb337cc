use super::*;

#[test]
fn first_move_is_sent() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.should_send(Point::new(0.0, 0.0), 1000));
}

#[test]
fn moves_inside_throttle_window_are_dropped() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.should_send(Point::new(0.0, 0.0), 1000));
    assert!(!throttle.should_send(Point::new(50.0, 50.0), 1049));
    assert!(throttle.should_send(Point::new(50.0, 50.0), 1050));
}

#[test]
fn tiny_moves_are_dropped_even_after_window() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.should_send(Point::new(10.0, 10.0), 0));
    assert!(!throttle.should_send(Point::new(11.5, 8.5), 500));
}

#[test]
fn movement_on_one_axis_is_enough() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.should_send(Point::new(10.0, 10.0), 0));
    assert!(throttle.should_send(Point::new(10.0, 12.0), 100));
}

#[test]
fn dropped_moves_do_not_reset_the_reference_point() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.should_send(Point::new(0.0, 0.0), 0));
    assert!(!throttle.should_send(Point::new(1.0, 0.0), 100));
    assert!(throttle.should_send(Point::new(2.0, 0.0), 200));
}
