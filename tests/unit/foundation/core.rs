use super::*;

#[test]
fn enclosing_rounds_outward() {
    let r = DeviceRect::enclosing(Rect::new(0.5, 1.2, 10.1, 10.0));
    assert_eq!(r, DeviceRect::new(0, 1, 11, 9));
}

#[test]
fn enclosing_handles_inverted_and_non_finite_input() {
    let r = DeviceRect::enclosing(Rect::new(10.0, 10.0, 0.0, 0.0));
    assert_eq!(r, DeviceRect::new(0, 0, 10, 10));

    let r = DeviceRect::enclosing(Rect::new(f64::NAN, 0.0, 1.0, 1.0));
    assert!(r.is_empty());
}

#[test]
fn union_ignores_empty_rects() {
    let a = DeviceRect::new(0, 0, 10, 10);
    let b = DeviceRect::new(5, -5, 10, 10);
    assert_eq!(a.union(b), DeviceRect::new(0, -5, 15, 15));
    assert_eq!(a.union(DeviceRect::default()), a);
    assert_eq!(DeviceRect::default().union(b), b);
}

#[test]
fn hex_colors_parse_with_and_without_alpha() {
    assert_eq!(Rgba8::from_hex("#ff0000").unwrap(), Rgba8::opaque(255, 0, 0));
    assert_eq!(
        Rgba8::from_hex("#00ff0080").unwrap(),
        Rgba8::new(0, 255, 0, 128)
    );
    assert!(Rgba8::from_hex("ff0000").is_err());
    assert!(Rgba8::from_hex("#ff00").is_err());
    assert!(Rgba8::from_hex("#gg0000").is_err());
}

#[test]
fn premultiply_then_unpremultiply_is_close() {
    let c = Rgba8::new(200, 100, 50, 128);
    let back = c.premultiply().to_straight();
    assert_eq!(back.a, 128);
    assert!(back.r.abs_diff(200) <= 2);
    assert!(back.g.abs_diff(100) <= 2);
    assert!(back.b.abs_diff(50) <= 2);
    assert_eq!(Rgba8Premul::transparent().to_straight(), Rgba8::TRANSPARENT);
}
