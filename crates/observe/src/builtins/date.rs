//! Date methods.

use crate::builtins::arg;
use crate::error::ObserveError;
use crate::value::{Composite, Object, Value};

const MS_PER_DAY: i64 = 86_400_000;

pub(crate) fn call(
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let time = current(object);
    let result = match method {
        "getTime" | "valueOf" => Value::from(time),
        "setTime" => {
            let next = arg(args, 0).to_number();
            *object.borrow_mut() = Composite::Date(next);
            Value::from(next)
        }
        "toISOString" | "toJSON" | "toString" => match iso_string(time) {
            Some(text) => Value::from(text),
            None if method == "toString" => Value::from("Invalid Date"),
            None if method == "toJSON" => Value::Null,
            None => return Some(Err(ObserveError::thrown("Invalid time value"))),
        },
        "getUTCFullYear" | "getUTCMonth" | "getUTCDate" => match civil(time) {
            Some((year, month, day)) => Value::from(match method {
                "getUTCFullYear" => year as f64,
                "getUTCMonth" => f64::from(month - 1),
                _ => f64::from(day),
            }),
            None => Value::from(f64::NAN),
        },
        _ => return None,
    };
    Some(Ok(result))
}

fn current(object: &Object) -> f64 {
    match &*object.borrow() {
        Composite::Date(time) => *time,
        _ => f64::NAN,
    }
}

/// Milliseconds held by a date value, looking through wrappers.
pub(crate) fn time_of(value: &Value) -> f64 {
    value.underlying().map_or(f64::NAN, |object| current(&object))
}

/// `YYYY-MM-DDTHH:mm:ss.sssZ`, or `None` for an invalid date.
pub(crate) fn iso_string(time: f64) -> Option<String> {
    let (year, month, day) = civil(time)?;
    let ms = (time as i64).rem_euclid(MS_PER_DAY);
    Some(format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1000 % 60,
        ms % 1000
    ))
}

/// Proleptic Gregorian (year, month 1-12, day 1-31) of a UTC timestamp.
fn civil(time: f64) -> Option<(i64, u32, u32)> {
    if !time.is_finite() {
        return None;
    }
    let days = (time as i64).div_euclid(MS_PER_DAY) + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days.rem_euclid(146_097);
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    Some((year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_string() {
        assert_eq!(iso_string(0.0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            iso_string(951_782_400_123.0).as_deref(),
            Some("2000-02-29T00:00:00.123Z")
        );
        assert_eq!(iso_string(-1.0).as_deref(), Some("1969-12-31T23:59:59.999Z"));
        assert_eq!(iso_string(f64::NAN), None);
    }

    #[test]
    fn test_set_time_round_trip() {
        let date = Value::new_date(0.0);
        date.invoke("setTime", [Value::from(86_400_000)]).unwrap();
        assert_eq!(date.invoke("getTime", []).unwrap().as_number(), Some(86_400_000.0));
        assert_eq!(date.invoke("getUTCDate", []).unwrap().as_number(), Some(2.0));
        assert_eq!(
            date.invoke("toString", []).unwrap().as_str(),
            Some("1970-01-02T00:00:00.000Z")
        );
    }
}
