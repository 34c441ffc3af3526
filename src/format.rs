/// Format a bit rate with a compact decimal unit (e.g. "1.5 Mbps", "800 bps")
pub fn format_bps(bits_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["bps", "Kbps", "Mbps", "Gbps"];
    const STEP: f64 = 1_000.0;

    let mut value = if bits_per_sec.is_finite() {
        bits_per_sec.max(0.0)
    } else {
        0.0
    };

    let mut unit = 0;
    while unit + 1 < UNITS.len() && value >= STEP {
        value /= STEP;
        unit += 1;
    }

    // Rounding can carry into the next unit (999.6 bps -> 1 Kbps)
    let rounded = if unit == 0 {
        value.round()
    } else {
        (value * 10.0).round() / 10.0
    };
    if rounded >= STEP && unit + 1 < UNITS.len() {
        value /= STEP;
        unit += 1;
    }

    if unit == 0 {
        format!("{} bps", value.round() as u64)
    } else {
        format!("{} {}", trim(value), UNITS[unit])
    }
}

// One decimal, without a trailing ".0"
fn trim(value: f64) -> String {
    let s = format!("{:.1}", value);
    match s.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => s,
    }
}
