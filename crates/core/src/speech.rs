//! Expansion of canonical values into spoken Czech.
//!
//! Text-to-speech engines read digits, ISO dates and unit symbols
//! poorly, so every generated utterance passes through [`speak`] before
//! synthesis. The scanner finds ISO dates, `HH:MM` times, digit runs
//! (including thousands separators), kilowatt abbreviations and percent
//! signs, and replaces each with its spoken Czech form.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

const UNKNOWN_NUMBER: &str = "neznámé číslo";
const UNKNOWN_DATE: &str = "neznámé datum";
const UNKNOWN_TIME: &str = "neznámý čas";

/// Cardinals 0-20; everything above is composed.
const SMALL: [&str; 21] = [
    "nula", "jedna", "dva", "tři", "čtyři", "pět", "šest", "sedm", "osm", "devět", "deset",
    "jedenáct", "dvanáct", "třináct", "čtrnáct", "patnáct", "šestnáct", "sedmnáct", "osmnáct",
    "devatenáct", "dvacet",
];

/// Tens 20-90, indexed by the tens digit.
const TENS: [&str; 10] = [
    "", "deset", "dvacet", "třicet", "čtyřicet", "padesát", "šedesát", "sedmdesát", "osmdesát",
    "devadesát",
];

/// Hundreds 100-900, indexed by the hundreds digit. Czech declines the
/// counted noun, so these are full phrases.
const HUNDREDS: [&str; 10] = [
    "", "sto", "dvě stě", "tři sta", "čtyři sta", "pět set", "šest set", "sedm set", "osm set",
    "devět set",
];

/// Genitive ordinals for days of the month, 1-20. 21-29 and 31 are
/// composed from these.
const DAY_ORDINALS: [&str; 21] = [
    "",
    "prvního",
    "druhého",
    "třetího",
    "čtvrtého",
    "pátého",
    "šestého",
    "sedmého",
    "osmého",
    "devátého",
    "desátého",
    "jedenáctého",
    "dvanáctého",
    "třináctého",
    "čtrnáctého",
    "patnáctého",
    "šestnáctého",
    "sedmnáctého",
    "osmnáctého",
    "devatenáctého",
    "dvacátého",
];

/// Month names in genitive, indexed by month - 1.
const MONTHS: [&str; 12] = [
    "ledna", "února", "března", "dubna", "května", "června", "července", "srpna", "září",
    "října", "listopadu", "prosince",
];

/// Weekday phrases with the fused preposition, Monday first.
const WEEKDAYS: [&str; 7] = [
    "v pondělí", "v úterý", "ve středu", "ve čtvrtek", "v pátek", "v sobotu", "v neděli",
];

/// Hour phrases on the 12-hour dial with the fused preposition,
/// indexed by the 24-hour value.
const HOURS: [&str; 24] = [
    "ve dvanáct", "v jednu", "ve dvě", "ve tři", "ve čtyři", "v pět", "v šest", "v sedm",
    "v osm", "v devět", "v deset", "v jedenáct", "ve dvanáct", "v jednu", "ve dvě", "ve tři",
    "ve čtyři", "v pět", "v šest", "v sedm", "v osm", "v devět", "v deset", "v jedenáct",
];

static NUMBERS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2}|\d{2}:\d{2}|(\d+[\s.,]?)+)").unwrap());
static KILOWATT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[kK][wW]").unwrap());
static PERCENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"%").unwrap());

/// What a scanned span was recognized as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Date,
    Time,
    Power,
    Percent,
}

/// One span of the input text together with its spoken replacement.
#[derive(Clone, Debug, PartialEq)]
pub struct SpokenValue {
    pub value: String,
    /// Byte span in the source text.
    pub span: (usize, usize),
    pub kind: ValueKind,
    pub spoken: String,
}

/// Scan `text` for values a speech synthesizer would mispronounce.
/// Spans never overlap; numeric spans come first, then kilowatt and
/// percent markers.
pub fn find_values_to_rewrite(text: &str, current_date: Option<NaiveDate>) -> Vec<SpokenValue> {
    let mut result = Vec::new();

    for found in NUMBERS_PATTERN.find_iter(text) {
        let original = found.as_str();
        let cleaned: String = original.chars().filter(|c| *c != ' ').collect();
        let value = cleaned.trim_matches(|c: char| c.is_ascii_punctuation());

        let (kind, mut spoken) = if value.contains('-') {
            (ValueKind::Date, date_str_to_words(value, current_date))
        } else if value.contains(':') {
            (ValueKind::Time, time_str_to_words(value))
        } else if value.chars().all(|c| c.is_ascii_digit()) && !value.is_empty() {
            (ValueKind::Integer, integer_str_to_words(value))
        } else if value.parse::<f64>().is_ok() {
            (ValueKind::Float, float_to_words(value))
        } else {
            continue;
        };

        // The spoken form keeps the original span's trailing whitespace
        // so the replacement does not glue words together.
        let trailing = original.len() - original.trim_end().len();
        spoken.push_str(&original[original.len() - trailing..]);

        result.push(SpokenValue {
            value: original.to_string(),
            span: (found.start(), found.end()),
            kind,
            spoken,
        });
    }

    for found in KILOWATT_PATTERN.find_iter(text) {
        result.push(SpokenValue {
            value: found.as_str().to_string(),
            span: (found.start(), found.end()),
            kind: ValueKind::Power,
            spoken: " kilowattů".to_string(),
        });
    }

    for found in PERCENT_PATTERN.find_iter(text) {
        result.push(SpokenValue {
            value: found.as_str().to_string(),
            span: (found.start(), found.end()),
            kind: ValueKind::Percent,
            spoken: " procent".to_string(),
        });
    }

    result
}

/// Rewrite every recognized value in `text` to its spoken Czech form.
/// `current_date` enables the "dnes"/"zítra" shortcuts for dates.
pub fn speak(text: &str, current_date: Option<NaiveDate>) -> String {
    let mut values = find_values_to_rewrite(text, current_date);
    values.sort_by_key(|value| value.span.0);

    // Replace back to front so earlier byte offsets stay valid.
    let mut output = text.to_string();
    for value in values.iter().rev() {
        output.replace_range(value.span.0..value.span.1, &value.spoken);
    }
    output
}

/// Czech cardinal words for a non-negative integer.
///
/// Groups of three digits are rendered most significant first, each
/// followed by its scale word (tisíc, milión, miliarda) declined by the
/// group's value: 1 takes the bare singular with the leading "jedna"
/// suppressed, 2-4 take the plural, everything else the genitive.
pub fn integer_to_words(value: u64) -> String {
    if value <= 20 {
        return SMALL[value as usize].to_string();
    }

    let mut digits = Vec::new();
    let mut rest = value;
    while rest > 0 {
        digits.push((rest % 10) as usize);
        rest /= 10;
    }
    while digits.len() % 3 != 0 {
        digits.push(0);
    }

    let group_count = digits.len() / 3;
    let top_order = group_count - 1;
    let mut parts: Vec<String> = Vec::new();

    for order in (0..group_count).rev() {
        let ones = digits[order * 3];
        let tens = digits[order * 3 + 1];
        let hundreds = digits[order * 3 + 2];
        if hundreds == 0 && tens == 0 && ones == 0 {
            continue;
        }

        if hundreds > 0 {
            parts.push(HUNDREDS[hundreds].to_string());
        }
        if tens == 1 {
            parts.push(SMALL[10 + ones].to_string());
        } else if tens > 1 {
            parts.push(TENS[tens].to_string());
        }
        // Suppress the leading "jedna" of the most significant group
        // ("tisíc", not "jedna tisíc") and the ones digit already
        // folded into a teen.
        let bare_group = hundreds == 0 && tens == 0;
        if ones > 0 && tens != 1 && !(order == top_order && ones == 1 && bare_group) {
            parts.push(SMALL[ones].to_string());
        }

        let scale = match (order, ones, bare_group) {
            (0, ..) => None,
            (1, 1, true) => Some("tisíc"),
            (1, 2..=4, true) => Some("tisíce"),
            (1, ..) => Some("tisíc"),
            (2, 1, true) => Some("milión"),
            (2, 2..=4, true) => Some("milióny"),
            (2, ..) => Some("miliónů"),
            (3, 1, true) => Some("miliarda"),
            (3, 2..=4, true) => Some("miliardy"),
            (3, ..) => Some("miliard"),
            _ => None,
        };
        if let Some(scale) = scale {
            parts.push(scale.to_string());
        }
    }

    parts.join(" ")
}

fn integer_str_to_words(value: &str) -> String {
    match value.parse::<u64>() {
        Ok(number) => integer_to_words(number),
        Err(_) => UNKNOWN_NUMBER.to_string(),
    }
}

/// Czech words for a decimal number. The fraction is rounded to three
/// places; a fraction with a leading zero is spelled digit by digit so
/// "0.01" does not collapse into "nula celá jedna".
pub fn float_to_words(value: &str) -> String {
    let Ok(number) = value.parse::<f64>() else {
        return UNKNOWN_NUMBER.to_string();
    };
    let integral = number.trunc() as u64;
    let rounded = format!("{:.3}", number.fract());
    let fraction = rounded[2..].trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    let integral_words = integer_to_words(integral);
    if fraction.parse::<u64>().unwrap_or(0) == 0 {
        return integral_words;
    }

    let fraction_words = if fraction.starts_with('0') {
        fraction
            .chars()
            .map(|digit| SMALL[digit.to_digit(10).unwrap_or(0) as usize])
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        integer_str_to_words(fraction)
    };
    format!("{integral_words} celá {fraction_words}")
}

/// Spoken form of a calendar date: "dnes" or "zítra" relative to
/// `current_date` when it is known, otherwise weekday plus genitive
/// ordinal day plus month.
pub fn date_to_words(value: NaiveDate, current_date: Option<NaiveDate>) -> String {
    if let Some(today) = current_date {
        if value == today {
            return "dnes".to_string();
        }
        if Some(value) == today.checked_add_days(Days::new(1)) {
            return "zítra".to_string();
        }
    }
    let weekday = WEEKDAYS[value.weekday().num_days_from_monday() as usize];
    format!("{weekday} {} {}", day_ordinal(value.day()), MONTHS[value.month0() as usize])
}

fn date_str_to_words(value: &str, current_date: Option<NaiveDate>) -> String {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date_to_words(date, current_date),
        Err(_) => UNKNOWN_DATE.to_string(),
    }
}

fn day_ordinal(day: u32) -> String {
    match day {
        1..=20 => DAY_ORDINALS[day as usize].to_string(),
        21..=29 => format!("dvacátého {}", DAY_ORDINALS[(day - 20) as usize]),
        30 => "třicátého".to_string(),
        _ => "třicátého prvního".to_string(),
    }
}

/// Spoken form of a clock time on the 12-hour dial with a day-period
/// qualifier. Zero minutes are left unsaid; "ve třináct" disambiguates
/// the one hour where "v jednu patnáct" would read as early morning.
pub fn time_to_words(value: NaiveTime) -> String {
    use chrono::Timelike;

    let hour = value.hour();
    let minute = value.minute();

    let day_period = match hour {
        4..=9 => "ráno",
        10..=11 => "dopoledne",
        17..=23 => "večer",
        0..=3 => "v noci",
        _ => "",
    };

    if minute == 0 {
        return format!("{} {day_period}", HOURS[hour as usize]).trim_end().to_string();
    }

    let hour_words = if hour == 13 { "ve třináct" } else { HOURS[hour as usize] };
    format!("{hour_words} {} {day_period}", minute_words(minute)).trim_end().to_string()
}

fn time_str_to_words(value: &str) -> String {
    match NaiveTime::parse_from_str(value, "%H:%M") {
        Ok(time) => time_to_words(time),
        Err(_) => UNKNOWN_TIME.to_string(),
    }
}

fn minute_words(minute: u32) -> String {
    let minute = minute as usize;
    match minute {
        0..=9 => format!("nula {}", SMALL[minute]),
        10..=20 => SMALL[minute].to_string(),
        _ if minute % 10 == 0 => TENS[minute / 10].to_string(),
        _ => format!("{} {}", TENS[minute / 10], SMALL[minute % 10]),
    }
}

/// The next strictly-future occurrence of `weekday` after `from`.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - from.weekday().num_days_from_monday() - 1)
        % 7
        + 1;
    from + Days::new(u64::from(ahead))
}
