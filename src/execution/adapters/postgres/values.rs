//! Conversion of `PostgreSQL` column values into JSON.
//!
//! Booleans and integers keep their JSON type. Floats do too unless they are
//! not finite, in which case they become `null`. JSON columns pass through.
//! Text, byte strings, and temporal and identifier types are rendered as
//! strings. `numeric` is decoded into its exact decimal text, and
//! `interval`, network address and `money` values into the text the server
//! prints for them.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::Row;
use postgres::types::{FromSql, Kind, Type};
use serde_json::{Number, Value};
use std::error::Error;
use std::fmt::Write as _;
use uuid::Uuid;

type DecodeError = Box<dyn Error + Sync + Send>;

const NUMERIC_POSITIVE: u16 = 0x0000;
const NUMERIC_NEGATIVE: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POSITIVE_INFINITY: u16 = 0xD000;
const NUMERIC_NEGATIVE_INFINITY: u16 = 0xF000;

/// Converts every column of `row` into a JSON value.
///
/// # Errors
///
/// Returns the driver error when a column cannot be decoded.
pub fn encode_row(row: &Row) -> Result<Vec<Value>, postgres::Error> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| encode_value(row, index, column.type_()))
        .collect()
}

fn encode_value(row: &Row, index: usize, ty: &Type) -> Result<Value, postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(Value::from),
        Type::OID => row.try_get::<_, Option<u32>>(index)?.map(Value::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)?
            .map(|float| float_value(f64::from(float))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.map(float_value),
        Type::NUMERIC => row
            .try_get::<_, Option<NumericText>>(index)?
            .map(|numeric| Value::String(numeric.0)),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(index)?,
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(|timestamp| Value::String(timestamp.to_rfc3339())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(|timestamp| Value::String(timestamp.to_string())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|date| Value::String(date.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(index)?
            .map(|time| Value::String(time.to_string())),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(index)?
            .map(|uuid| Value::String(uuid.to_string())),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(index)?
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        Type::BOOL_ARRAY => array_value(row.try_get::<_, Option<Vec<Option<bool>>>>(index)?),
        Type::INT2_ARRAY => array_value(row.try_get::<_, Option<Vec<Option<i16>>>>(index)?),
        Type::INT4_ARRAY => array_value(row.try_get::<_, Option<Vec<Option<i32>>>>(index)?),
        Type::INT8_ARRAY => array_value(row.try_get::<_, Option<Vec<Option<i64>>>>(index)?),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            array_value(row.try_get::<_, Option<Vec<Option<String>>>>(index)?)
        }
        _ => row
            .try_get::<_, Option<RawText>>(index)?
            .map(|raw| Value::String(raw.0)),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn float_value(float: f64) -> Value {
    Number::from_f64(float).map_or(Value::Null, Value::Number)
}

fn array_value<T>(items: Option<Vec<Option<T>>>) -> Option<Value>
where
    Value: From<T>,
{
    items.map(|values| {
        Value::Array(
            values
                .into_iter()
                .map(|item| item.map_or(Value::Null, Value::from))
                .collect(),
        )
    })
}

/// Text rendering for types without a native mapping.
///
/// Types whose binary wire format is their text (text-like types, enums,
/// `xml`, extension types such as `citext`) are read as lossy UTF-8.
/// Intervals, network addresses and `money` are decoded from their binary
/// layout. Other types are rendered as a placeholder naming the type.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let text = match *ty {
            Type::INTERVAL => decode_interval(raw)?,
            Type::INET => decode_inet(raw, false)?,
            Type::CIDR => decode_inet(raw, true)?,
            Type::MACADDR | Type::MACADDR8 => decode_macaddr(raw)?,
            Type::MONEY => decode_money(raw)?,
            _ if has_text_wire_format(ty) => String::from_utf8_lossy(raw).into_owned(),
            _ => format!("<{}>", ty.name()),
        };
        Ok(Self(text))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn has_text_wire_format(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::XML
    ) || matches!(ty.kind(), Kind::Enum(_))
        || (matches!(ty.kind(), Kind::Simple) && ty.oid() >= FIRST_USER_OID)
}

/// Types created by extensions get oids from this value upward.
const FIRST_USER_OID: u32 = 16_384;

/// Exact decimal text of a `numeric` value.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn read_bytes(raw: &[u8], offset: usize, width: usize) -> Result<&[u8], DecodeError> {
    raw.get(offset..offset.saturating_add(width))
        .filter(|bytes| bytes.len() == width)
        .ok_or_else(|| "value is truncated".into())
}

fn read_array<const N: usize>(raw: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    Ok(<[u8; N]>::try_from(read_bytes(raw, offset, N)?)?)
}

/// Reads a big-endian two's complement integer of `width` bytes.
fn read_signed(raw: &[u8], offset: usize, width: usize) -> Result<i64, DecodeError> {
    let bytes = read_bytes(raw, offset, width)?;
    let negative = bytes.first().is_some_and(|first| first & 0x80 != 0);
    let initial: i64 = if negative { -1 } else { 0 };
    Ok(bytes
        .iter()
        .fold(initial, |value, byte| (value << 8) | i64::from(*byte)))
}

fn read_u8(raw: &[u8], offset: usize) -> Result<u8, DecodeError> {
    raw.get(offset)
        .copied()
        .ok_or_else(|| "value is truncated".into())
}

fn read_u16(raw: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let bytes = read_bytes(raw, offset, 2)?;
    Ok(bytes
        .iter()
        .fold(0, |value, byte| (value << 8) | u16::from(*byte)))
}

fn read_i16(raw: &[u8], offset: usize) -> Result<i32, DecodeError> {
    Ok(i32::try_from(read_signed(raw, offset, 2)?)?)
}

fn read_i32(raw: &[u8], offset: usize) -> Result<i32, DecodeError> {
    Ok(i32::try_from(read_signed(raw, offset, 4)?)?)
}

fn read_i64(raw: &[u8], offset: usize) -> Result<i64, DecodeError> {
    read_signed(raw, offset, 8)
}

/// Quotient and remainder, both zero for a zero divisor.
fn split(value: u64, divisor: u64) -> (u64, u64) {
    (
        value.checked_div(divisor).unwrap_or(0),
        value.checked_rem(divisor).unwrap_or(0),
    )
}

/// Decodes the binary `numeric` wire format: digit count, weight, sign, and
/// display scale headers followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    let digit_count = usize::from(read_u16(raw, 0)?);
    let weight = read_i16(raw, 2)?;
    let sign = read_u16(raw, 4)?;
    let scale = usize::from(read_u16(raw, 6)?);

    match sign {
        NUMERIC_NAN => return Ok(String::from("NaN")),
        NUMERIC_POSITIVE_INFINITY => return Ok(String::from("Infinity")),
        NUMERIC_NEGATIVE_INFINITY => return Ok(String::from("-Infinity")),
        NUMERIC_POSITIVE | NUMERIC_NEGATIVE => {}
        other => return Err(format!("unknown numeric sign {other:#06x}").into()),
    }

    let digits = (0..digit_count)
        .map(|position| read_u16(raw, 8 + position * 2))
        .collect::<Result<Vec<_>, _>>()?;
    let digit_at = |position: i32| -> u16 {
        usize::try_from(position)
            .ok()
            .and_then(|index| digits.get(index).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEGATIVE {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        for position in 0..=weight {
            let digit = digit_at(position);
            if position == 0 {
                write!(text, "{digit}")?;
            } else {
                write!(text, "{digit:04}")?;
            }
        }
    }

    if scale > 0 {
        let mut fraction = String::new();
        let mut position = weight.saturating_add(1);
        while fraction.len() < scale {
            write!(fraction, "{:04}", digit_at(position))?;
            position = position.saturating_add(1);
        }
        fraction.truncate(scale);
        text.push('.');
        text.push_str(&fraction);
    }
    Ok(text)
}

const MICROS_PER_SECOND: u64 = 1_000_000;
const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;

/// Decodes an `interval` (microseconds, days, months) into the server's
/// default `postgres` output style, e.g. `1 year 2 mons -3 days +04:05:06.5`.
fn decode_interval(raw: &[u8]) -> Result<String, DecodeError> {
    let micros = read_i64(raw, 0)?;
    let days = read_i32(raw, 8)?;
    let months = read_i32(raw, 12)?;
    Ok(format_interval(micros, days, months))
}

fn format_interval(micros: i64, days: i32, months: i32) -> String {
    let mut text = String::new();
    let mut previous_negative = false;
    let parts = [
        (months.checked_div(12).unwrap_or(0), "year"),
        (months.checked_rem(12).unwrap_or(0), "mon"),
        (days, "day"),
    ];
    for (value, unit) in parts {
        if value == 0 {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        if previous_negative && value > 0 {
            text.push('+');
        }
        let plural = if value == 1 { "" } else { "s" };
        text.push_str(&format!("{value} {unit}{plural}"));
        previous_negative = value < 0;
    }

    if text.is_empty() || micros != 0 {
        if !text.is_empty() {
            text.push(' ');
        }
        if micros < 0 {
            text.push('-');
        } else if previous_negative {
            text.push('+');
        }
        let (hours, within_hour) = split(micros.unsigned_abs(), MICROS_PER_HOUR);
        let (minutes, within_minute) = split(within_hour, MICROS_PER_MINUTE);
        let (seconds, fraction) = split(within_minute, MICROS_PER_SECOND);
        text.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            text.push('.');
            text.push_str(digits.trim_end_matches('0'));
        }
    }
    text
}

const INET_FAMILY_V4: u8 = 2;
const INET_FAMILY_V6: u8 = 3;

/// Decodes `inet`/`cidr`: family, prefix bits, cidr flag, address length,
/// then the address bytes. `inet` omits a full-length prefix.
fn decode_inet(raw: &[u8], always_prefix: bool) -> Result<String, DecodeError> {
    let family = read_u8(raw, 0)?;
    let bits = read_u8(raw, 1)?;
    let (address, full_prefix) = match family {
        INET_FAMILY_V4 => (Ipv4Addr::from(read_array::<4>(raw, 4)?).to_string(), 32),
        INET_FAMILY_V6 => (Ipv6Addr::from(read_array::<16>(raw, 4)?).to_string(), 128),
        other => return Err(format!("unknown inet family {other}").into()),
    };
    Ok(if always_prefix || bits != full_prefix {
        format!("{address}/{bits}")
    } else {
        address
    })
}

/// Decodes `macaddr` and `macaddr8` as colon-separated lowercase hex.
fn decode_macaddr(raw: &[u8]) -> Result<String, DecodeError> {
    if !matches!(raw.len(), 6 | 8) {
        return Err(format!("unexpected mac address length {}", raw.len()).into());
    }
    Ok(raw
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Decodes `money`, stored as a count of cents, in the `C` locale layout
/// the server uses by default: `$1,234.50`, `-$0.05`.
fn decode_money(raw: &[u8]) -> Result<String, DecodeError> {
    read_i64(raw, 0).map(format_money)
}

fn format_money(cents: i64) -> String {
    let (units, fraction) = split(cents.unsigned_abs(), 100);
    let digits = units.to_string();
    let mut grouped = String::new();
    for (position, digit) in digits.chars().enumerate() {
        let remaining = digits.len().saturating_sub(position);
        if position > 0 && remaining.checked_rem(3) == Some(0) {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${grouped}.{fraction:02}")
}
