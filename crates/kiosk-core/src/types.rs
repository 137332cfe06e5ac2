use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in source video pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence for this box.
    #[serde(default)]
    pub score: f32,
}

impl BoundingBox {
    /// Scale the box geometry independently on each axis.
    pub fn scale(&self, sx: f32, sy: f32) -> BoundingBox {
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            score: self.score,
        }
    }

    /// Map a box from video coordinates onto a display surface of a different size.
    ///
    /// A zero-sized video yields the box unchanged.
    pub fn to_display(&self, video: (u32, u32), display: (u32, u32)) -> BoundingBox {
        if video.0 == 0 || video.1 == 0 {
            return *self;
        }
        self.scale(
            display.0 as f32 / video.0 as f32,
            display.1 as f32 / video.1 as f32,
        )
    }
}

/// Face signature vector produced by the external recognition model
/// (typically 128-dimensional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub Vec<f32>);

impl Signature {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute Euclidean distance between two signatures.
    ///
    /// Signatures of different lengths come from different models and are
    /// never comparable: the distance is infinite.
    pub fn euclidean_distance(&self, other: &Signature) -> f32 {
        if self.0.len() != other.0.len() {
            return f32::INFINITY;
        }
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found by the detector: box, landmarks, and signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub landmarks: Vec<[f32; 2]>,
    pub descriptor: Signature,
}

/// A registered employee. The name is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub name: String,
    pub pin: String,
    pub company_number: String,
}

/// One clock-in/clock-out shift. Open while `clock_out` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub name: String,
    /// Calendar day of the clock-in, e.g. "1/1/2024".
    pub date: String,
    pub clock_in: String,
    /// Stored as `""` while the record is open.
    #[serde(default, with = "empty_as_none")]
    pub clock_out: Option<String>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }
}

/// Stored signatures keyed by employee name, in registration order.
///
/// Order matters: matching is first-hit over this order.
pub type SignatureRoster = IndexMap<String, Signature>;

/// Format a timestamp's calendar day the way the kiosk displays it ("1/1/2024").
pub fn format_date(at: &NaiveDateTime) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

/// Format a timestamp's wall-clock time ("9:00:00 AM").
pub fn format_time(at: &NaiveDateTime) -> String {
    at.format("%-I:%M:%S %p").to_string()
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Signature::new(vec![0.1, 0.2, 0.3]);
        assert_eq!(a.euclidean_distance(&a.clone()), 0.0);
    }

    #[test]
    fn test_euclidean_distance_3_4_5() {
        let a = Signature::new(vec![0.0, 0.0]);
        let b = Signature::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_length_mismatch() {
        let a = Signature::new(vec![0.0, 0.0]);
        let b = Signature::new(vec![0.0, 0.0, 0.0]);
        assert!(a.euclidean_distance(&b).is_infinite());
    }

    #[test]
    fn test_signature_serializes_as_plain_array() {
        let sig = Signature::new(vec![0.5, -0.25]);
        assert_eq!(serde_json::to_string(&sig).unwrap(), "[0.5,-0.25]");
    }

    #[test]
    fn test_record_open_serializes_as_empty_string() {
        let rec = AttendanceRecord {
            name: "Eve".into(),
            date: "1/1/2024".into(),
            clock_in: "9:00:00 AM".into(),
            clock_out: None,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Eve","date":"1/1/2024","clockIn":"9:00:00 AM","clockOut":""}"#
        );
        let back: AttendanceRecord = serde_json::from_str(&json).unwrap();
        assert!(back.is_open());
    }

    #[test]
    fn test_employee_uses_camel_case_keys() {
        let json = r#"{"name":"Carol","pin":"1234","companyNumber":"C100"}"#;
        let emp: Employee = serde_json::from_str(json).unwrap();
        assert_eq!(emp.company_number, "C100");
    }

    #[test]
    fn test_signature_roster_keeps_insertion_order() {
        let json = r#"{"Zed":[1.0],"Alice":[2.0],"Bob":[3.0]}"#;
        let roster: SignatureRoster = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = roster.keys().map(String::as_str).collect();
        assert_eq!(names, ["Zed", "Alice", "Bob"]);
    }

    #[test]
    fn test_format_date_and_time() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(17, 5, 9)
            .unwrap();
        assert_eq!(format_date(&at), "1/1/2024");
        assert_eq!(format_time(&at), "5:05:09 PM");
    }

    #[test]
    fn test_box_to_display_scaling() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 100.0, height: 50.0, score: 0.9 };
        let d = b.to_display((640, 480), (320, 240));
        assert_eq!(d, BoundingBox { x: 5.0, y: 10.0, width: 50.0, height: 25.0, score: 0.9 });
    }

    #[test]
    fn test_box_to_display_zero_video() {
        let b = BoundingBox { x: 1.0, y: 2.0, width: 3.0, height: 4.0, score: 0.5 };
        assert_eq!(b.to_display((0, 0), (320, 240)), b);
    }
}
