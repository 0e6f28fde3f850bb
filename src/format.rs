//! Shop-floor length notation: sixteenths of an inch out, mixed fractions in.

const DENOMINATOR: i64 = 16;

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Formats a length to the nearest 1/16, e.g. `71.6875` -> `"71 11/16"`.
///
/// The whole part is omitted when zero and the fraction when it rounds away,
/// so `0.6875` -> `"11/16"` and `71.0` -> `"71"`.
pub fn format_sixteenths(value: f64) -> String {
    let sixteenths = (value * DENOMINATOR as f64).round() as i64;
    let whole = sixteenths / DENOMINATOR;
    let rem = sixteenths % DENOMINATOR;
    if rem == 0 {
        return format!("{whole}");
    }
    let g = gcd(rem.abs(), DENOMINATOR);
    let (num, den) = (rem / g, DENOMINATOR / g);
    if whole == 0 {
        format!("{num}/{den}")
    } else {
        format!("{whole} {}/{den}", num.abs())
    }
}

fn parse_term(term: &str) -> Option<f64> {
    match term.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den)
        }
        None => term.parse().ok(),
    }
}

/// Parses the number formats found in shop spreadsheets:
/// `71.5`, `0.75`, `3/4`, `1 1/4`, `1-1/4` and `3/4"`.
///
/// Returns `None` when the text is blank or unparsable.
pub fn parse_length(raw: &str) -> Option<f64> {
    let s = raw
        .trim()
        .trim_end_matches('"')
        .trim()
        .replace(['\u{2013}', '\u{2014}'], "-");
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    let normalized = s.replace('-', " ");
    let mut total = 0.0;
    let mut terms = 0;
    for term in normalized.split_whitespace() {
        total += parse_term(term)?;
        terms += 1;
    }
    (terms > 0 && total.is_finite()).then_some(total)
}
