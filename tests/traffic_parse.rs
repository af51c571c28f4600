// tests/traffic_parse.rs
use regional_trends::traffic::parse_traffic;

#[test]
fn documented_examples() {
    assert_eq!(parse_traffic(""), 0);
    assert_eq!(parse_traffic("200K+"), 200_000);
    assert_eq!(parse_traffic("5M"), 5_000_000);
    assert_eq!(parse_traffic("1,234"), 1_234);
    assert_eq!(parse_traffic("garbage"), 0);
}

#[test]
fn lowercase_suffix_and_whitespace() {
    assert_eq!(parse_traffic("  50k+ "), 50_000);
    assert_eq!(parse_traffic("2,000,000+"), 2_000_000);
    assert_eq!(parse_traffic("0.5M"), 500_000);
}
