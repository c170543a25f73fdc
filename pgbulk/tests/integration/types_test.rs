use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use pgbulk::test_utils::database::spawn_database;
use pgbulk::{
    BulkImporter, ColumnMapping, CustomValue, EnumMember, ImportConfig, TableMapping, TypeKey,
    Value, ValueKind,
};
use serde_json::json;
use telemetry::tracing::init_test_tracing;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum Mood {
    Happy,
    Grumpy,
}

impl EnumMember for Mood {
    const TYPE_NAME: &'static str = "mood";

    fn member_name(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Grumpy => "grumpy",
        }
    }
}

/// Rendered through [`fmt::Display`] since no codec is registered for it.
#[derive(Debug, Clone)]
struct Point {
    x: i32,
    y: i32,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl CustomValue for Point {
    fn type_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("point")
    }
}

#[derive(Debug, Clone)]
struct Sample {
    id: i32,
    flag: bool,
    small: i16,
    big: i64,
    real: f32,
    double: f64,
    amount: BigDecimal,
    label: String,
    day: NaiveDate,
    at: NaiveTime,
    local: NaiveDateTime,
    zoned: chrono::DateTime<FixedOffset>,
    key: Uuid,
    doc: serde_json::Value,
    tags: Vec<String>,
    scores: Vec<Option<i32>>,
    mood: Mood,
    location: Point,
}

fn sample_mapping() -> Arc<TableMapping<Sample>> {
    let mapping = TableMapping::builder("samples")
        .schema("test")
        .column(ColumnMapping::new("id", ValueKind::I32, |s: &Sample| s.id).identifier())
        .column(ColumnMapping::new("flag", ValueKind::Bool, |s: &Sample| s.flag))
        .column(ColumnMapping::new("small_int", ValueKind::I16, |s: &Sample| s.small))
        .column(ColumnMapping::new("big_int", ValueKind::I64, |s: &Sample| s.big))
        .column(ColumnMapping::new("real_num", ValueKind::F32, |s: &Sample| s.real))
        .column(ColumnMapping::new("double_num", ValueKind::F64, |s: &Sample| s.double))
        .column(ColumnMapping::new("amount", ValueKind::Numeric, |s: &Sample| {
            s.amount.clone()
        }))
        .column(ColumnMapping::new("label", ValueKind::String, |s: &Sample| {
            s.label.clone()
        }))
        .column(ColumnMapping::new("day_date", ValueKind::Date, |s: &Sample| s.day))
        .column(ColumnMapping::new("clock", ValueKind::Time, |s: &Sample| s.at))
        .column(ColumnMapping::new("local_ts", ValueKind::Timestamp, |s: &Sample| s.local))
        .column(ColumnMapping::new("zoned_ts", ValueKind::TimestampTz, |s: &Sample| s.zoned))
        .column(ColumnMapping::new("key_id", ValueKind::Uuid, |s: &Sample| s.key))
        .column(ColumnMapping::new("doc", ValueKind::Json, |s: &Sample| s.doc.clone()))
        .column(ColumnMapping::new("tags", ValueKind::List, |s: &Sample| {
            Value::list(s.tags.iter().map(String::as_str))
        }))
        .column(ColumnMapping::new("scores", ValueKind::Array, |s: &Sample| {
            Value::array(s.scores.iter().copied())
        }))
        .column(ColumnMapping::new("mood", TypeKey::named("mood"), |s: &Sample| {
            Value::from_enum(&s.mood)
        }))
        .column(ColumnMapping::new("location", TypeKey::named("point"), |s: &Sample| {
            Value::custom(s.location.clone())
        }))
        .build()
        .unwrap();

    Arc::new(mapping)
}

const SAMPLES_DDL: &str = "create table test.samples (
    id integer primary key,
    flag boolean,
    small_int smallint,
    big_int bigint,
    real_num real,
    double_num double precision,
    amount numeric,
    label text,
    day_date date,
    clock time,
    local_ts timestamp,
    zoned_ts timestamptz,
    key_id uuid,
    doc jsonb,
    tags text[],
    scores integer[],
    mood mood,
    location point
)";

#[tokio::test(flavor = "multi_thread")]
async fn builtin_values_round_trip_through_copy() {
    init_test_tracing();
    let mut database = spawn_database().await;
    database
        .run_sql("create type mood as enum ('happy', 'grumpy')")
        .await;
    database.run_sql(SAMPLES_DDL).await;

    let zoned = FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 2, 29, 13, 45, 30)
        .unwrap();
    let key = Uuid::new_v4();
    let samples = vec![
        Sample {
            id: 1,
            flag: true,
            small: -7,
            big: 9_000_000_000,
            real: 1.5,
            double: f64::INFINITY,
            amount: BigDecimal::from_str("1E+10").unwrap(),
            label: "multi\nline, \"quoted\" text".to_string(),
            day: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            at: NaiveTime::from_hms_milli_opt(13, 45, 30, 500).unwrap(),
            local: NaiveDate::from_ymd_opt(2024, 2, 29)
                .unwrap()
                .and_hms_opt(13, 45, 30)
                .unwrap(),
            zoned,
            key,
            doc: json!({"a": [1, "two"], "b": null}),
            tags: vec!["plain".to_string(), "with space".to_string(), "".to_string()],
            scores: vec![Some(1), None, Some(3)],
            mood: Mood::Grumpy,
            location: Point { x: 3, y: -4 },
        },
        Sample {
            id: 2,
            flag: false,
            small: 0,
            big: 0,
            real: 0.0,
            double: f64::NAN,
            amount: BigDecimal::from_str("-0.125").unwrap(),
            label: String::new(),
            day: NaiveDate::from_ymd_opt(1999, 12, 31).unwrap(),
            at: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            local: NaiveDate::from_ymd_opt(1999, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
            zoned,
            key,
            doc: json!([]),
            tags: Vec::new(),
            scores: Vec::new(),
            mood: Mood::Happy,
            location: Point { x: 0, y: 0 },
        },
    ];

    let importer = BulkImporter::new(ImportConfig::default());
    let rows = importer
        .insert(database.client_mut(), &sample_mapping(), samples)
        .await
        .unwrap();
    assert_eq!(rows, 2);

    let row = database
        .client()
        .query_one(
            "select flag::text, small_int::text, big_int::text, real_num::text, double_num::text,
                amount::text, label, day_date::text, clock::text, local_ts::text,
                zoned_ts = '2024-02-29T11:45:30Z', key_id, doc::text, tags::text, scores::text,
                mood::text, location::text
             from test.samples where id = 1",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(row.get::<_, String>(0), "true");
    assert_eq!(row.get::<_, String>(1), "-7");
    assert_eq!(row.get::<_, String>(2), "9000000000");
    assert_eq!(row.get::<_, String>(3), "1.5");
    assert_eq!(row.get::<_, String>(4), "Infinity");
    assert_eq!(row.get::<_, String>(5), "10000000000");
    assert_eq!(row.get::<_, String>(6), "multi\nline, \"quoted\" text");
    assert_eq!(row.get::<_, String>(7), "2024-02-29");
    assert_eq!(row.get::<_, String>(8), "13:45:30.5");
    assert_eq!(row.get::<_, String>(9), "2024-02-29 13:45:30");
    assert!(row.get::<_, bool>(10));
    assert_eq!(row.get::<_, Uuid>(11), key);
    assert_eq!(row.get::<_, String>(12), r#"{"a": [1, "two"], "b": null}"#);
    assert_eq!(row.get::<_, String>(13), r#"{plain,"with space",""}"#);
    assert_eq!(row.get::<_, String>(14), "{1,NULL,3}");
    assert_eq!(row.get::<_, String>(15), "grumpy");
    assert_eq!(row.get::<_, String>(16), "(3,-4)");

    let row = database
        .client()
        .query_one(
            "select double_num::text, amount::text, label, tags::text, scores::text
             from test.samples where id = 2",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(row.get::<_, String>(0), "NaN");
    assert_eq!(row.get::<_, String>(1), "-0.125");
    // Under the default null mode an empty string is indistinguishable from null.
    assert_eq!(row.get::<_, Option<String>>(2), None);
    assert_eq!(row.get::<_, String>(3), "{}");
    assert_eq!(row.get::<_, String>(4), "{}");
}
