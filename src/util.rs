use std::time::Duration;

/// Placeholder shown wherever a statistic has too little data
pub const NO_DATA: &str = "--";

pub fn mean_duration(data: &[Duration]) -> Option<Duration> {
    let count = data.len();

    match count {
        positive if positive > 0 => {
            Some(data.iter().sum::<Duration>() / count as u32)
        }
        _ => None,
    }
}

/// `s.cc` below a minute, `m:ss.cc` above; hundredths are rounded
pub fn format_time(d: Duration) -> String {
    let centis = (d.as_millis() + 5) / 10;
    let minutes = centis / 6000;
    let secs = (centis % 6000) / 100;
    let hundredths = centis % 100;

    if minutes > 0 {
        format!("{}:{:02}.{:02}", minutes, secs, hundredths)
    } else {
        format!("{}.{:02}", secs, hundredths)
    }
}

/// Tenths of a second, used for the inspection countdown
pub fn format_tenths(d: Duration) -> String {
    format!("{:.1}", d.as_secs_f64())
}

pub fn format_optional(d: Option<Duration>) -> String {
    d.map(format_time).unwrap_or_else(|| NO_DATA.to_string())
}
