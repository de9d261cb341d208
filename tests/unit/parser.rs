//! Response classification for the dayAvg endpoint

use btc_rate_average::fetcher::parser::{DayAvgParser, RATE_LIMIT_MARKER};
use btc_rate_average::fetcher::AttemptOutcome;
use btc_rate_average::Currency;

#[test]
fn test_usd_and_eur_bodies() {
    let usd = DayAvgParser::classify(r#"{"USD":67012.34,"ConversionType":{"type":"direct","conversionSymbol":""}}"#, Currency::Usd);
    assert!(matches!(usd, AttemptOutcome::Success(r) if (r - 67012.34).abs() < 1e-9));

    let eur = DayAvgParser::classify(r#"{"EUR":61500.5}"#, Currency::Eur);
    assert!(matches!(eur, AttemptOutcome::Success(r) if r == 61500.5));
}

#[test]
fn test_wrong_currency_key_is_failure() {
    let outcome = DayAvgParser::classify(r#"{"USD":1.0}"#, Currency::Eur);
    assert!(matches!(outcome, AttemptOutcome::Failure(_)));
}

#[test]
fn test_rate_limit_body_is_not_a_failure() {
    let body = format!(
        r#"{{"Response":"Error","Message":"{RATE_LIMIT_MARKER}","RateLimit":{{"calls_made":{{"second":21}}}}}}"#
    );
    assert!(DayAvgParser::is_rate_limited(&body));
    assert!(matches!(
        DayAvgParser::classify(&body, Currency::Usd),
        AttemptOutcome::RateLimited
    ));
}

#[test]
fn test_garbage_body_is_failure() {
    for body in ["", "<html>502</html>", "{\"USD\":null}", "[]"] {
        assert!(
            matches!(DayAvgParser::classify(body, Currency::Usd), AttemptOutcome::Failure(_)),
            "{body:?}"
        );
    }
}
