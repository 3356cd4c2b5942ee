//! Per-image tagging table.
//!
//! Kept frames are written without any metadata. Once a run finishes, the
//! [`SelectionRecord`]s are turned into a [`TaggingTable`]: one CSV row per
//! image carrying its capture time, GPS position, heading, and camera
//! identity. [`apply_metadata`] hands that table to `exiftool`, which writes
//! the tags into every image in one pass.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use chrono::{DateTime, FixedOffset};

use crate::error::GeoframesError;
use crate::exiftool::EXIFTOOL;
use crate::pipeline::SelectionRecord;

/// File name of the intermediate CSV written next to the images.
pub const METADATA_CSV: &str = "metadata.csv";

/// Projection tag for full spherical panoramas.
pub const PROJECTION_TYPE: &str = "equirectangular";

const COLUMNS: [&str; 16] = [
    "SourceFile",
    "AllDates",
    "SubSecTimeOriginal",
    "SubSecTimeDigitized",
    "OffsetTime",
    "OffsetTimeOriginal",
    "OffsetTimeDigitized",
    "GPSLatitude",
    "GPSLongitude",
    "GPSLatitudeRef",
    "GPSLongitudeRef",
    "GPSImgDirection",
    "XMP-GPano:ProjectionType",
    "Make",
    "Model",
    "FocalLength",
];

/// Camera identity written into every image.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Focal length in millimetres.
    pub focal_length: f64,
}

impl Default for CameraProfile {
    fn default() -> Self {
        Self {
            make: "Insta360".to_string(),
            model: "X4".to_string(),
            focal_length: 1.2,
        }
    }
}

/// Tags for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggingRow {
    /// Image the row applies to.
    pub source_file: PathBuf,
    /// Capture time, in the offset the run started in.
    pub capture_time: DateTime<FixedOffset>,
    /// Signed latitude in degrees.
    pub latitude: f64,
    /// Signed longitude in degrees.
    pub longitude: f64,
    /// Heading in degrees, when the track carried one.
    pub image_direction: Option<f64>,
}

impl TaggingRow {
    /// Build the row for a kept frame.
    pub fn from_record(record: &SelectionRecord) -> Self {
        Self {
            source_file: record.file_path.clone(),
            capture_time: record.frame_time,
            latitude: record.position.latitude,
            longitude: record.position.longitude,
            image_direction: record.position.course,
        }
    }

    /// `YYYY:MM:DD HH:MM:SS` in the capture time's own offset.
    pub fn all_dates(&self) -> String {
        self.capture_time.format("%Y:%m:%d %H:%M:%S").to_string()
    }

    /// Milliseconds past the second, three digits.
    pub fn sub_sec_time(&self) -> String {
        format!("{:03}", self.capture_time.timestamp_subsec_millis().min(999))
    }

    /// UTC offset as `±HH:MM`.
    pub fn offset_time(&self) -> String {
        self.capture_time.format("%:z").to_string()
    }

    /// `N` or `S`.
    pub fn latitude_ref(&self) -> &'static str {
        if self.latitude < 0.0 { "S" } else { "N" }
    }

    /// `E` or `W`.
    pub fn longitude_ref(&self) -> &'static str {
        if self.longitude < 0.0 { "W" } else { "E" }
    }

    fn fields(&self, camera: &CameraProfile) -> [String; 16] {
        let sub_sec = self.sub_sec_time();
        let offset = self.offset_time();
        [
            self.source_file.display().to_string(),
            self.all_dates(),
            sub_sec.clone(),
            sub_sec,
            offset.clone(),
            offset.clone(),
            offset,
            self.latitude.abs().to_string(),
            self.longitude.abs().to_string(),
            self.latitude_ref().to_string(),
            self.longitude_ref().to_string(),
            self.image_direction
                .map(|course| course.to_string())
                .unwrap_or_default(),
            PROJECTION_TYPE.to_string(),
            camera.make.clone(),
            camera.model.clone(),
            camera.focal_length.to_string(),
        ]
    }
}

/// All rows for one run, ready for `exiftool -csv=`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggingTable {
    camera: CameraProfile,
    rows: Vec<TaggingRow>,
}

impl TaggingTable {
    /// One row per record, in record order.
    pub fn from_records(records: &[SelectionRecord], camera: &CameraProfile) -> Self {
        Self {
            camera: camera.clone(),
            rows: records.iter().map(TaggingRow::from_record).collect(),
        }
    }

    /// The rows.
    pub fn rows(&self) -> &[TaggingRow] {
        &self.rows
    }

    /// Column headers, in write order.
    pub fn columns() -> &'static [&'static str] {
        &COLUMNS
    }

    /// Write the table with a header line to any writer.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::MetadataWrite`] if a row cannot be written.
    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<(), GeoframesError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(COLUMNS)?;
        for row in &self.rows {
            csv_writer.write_record(row.fields(&self.camera))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframesError::MetadataWrite`] if the file cannot be
    /// created or written.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), GeoframesError> {
        let file = fs::File::create(path.as_ref()).map_err(|error| {
            GeoframesError::MetadataWrite(format!(
                "cannot create {}: {error}",
                path.as_ref().display()
            ))
        })?;
        self.write_to(file)
    }
}

/// Tag every kept image in `directory` from `records`.
///
/// The intermediate CSV is removed afterwards whether or not `exiftool`
/// succeeded. An empty record list is a no-op.
///
/// # Errors
///
/// Returns [`GeoframesError::MetadataWrite`] if the CSV cannot be written or
/// `exiftool` fails, and [`GeoframesError::ExternalTool`] if `exiftool`
/// cannot be started.
pub fn apply_metadata<P: AsRef<Path>>(
    records: &[SelectionRecord],
    directory: P,
    camera: &CameraProfile,
) -> Result<(), GeoframesError> {
    if records.is_empty() {
        log::info!("No frames kept, skipping metadata");
        return Ok(());
    }

    let directory = directory.as_ref();
    let csv_path = directory.join(METADATA_CSV);
    TaggingTable::from_records(records, camera).write_csv(&csv_path)?;

    log::info!(
        "Writing metadata for {} images in {}",
        records.len(),
        directory.display()
    );
    let status = Command::new(EXIFTOOL)
        .args(["-api", "largefilesupport=1", "-overwrite_original"])
        .arg(format!("-csv={}", csv_path.display()))
        .arg(directory)
        .stdout(Stdio::null())
        .status();

    if let Err(error) = fs::remove_file(&csv_path) {
        log::warn!("Failed to remove {}: {error}", csv_path.display());
    }

    let status = status.map_err(|error| GeoframesError::ExternalTool {
        tool: EXIFTOOL.to_string(),
        reason: error.to_string(),
    })?;
    if !status.success() {
        return Err(GeoframesError::MetadataWrite(format!(
            "{EXIFTOOL} exited with {status}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Waypoint;

    fn record(time: &str, latitude: f64, longitude: f64, course: Option<f64>) -> SelectionRecord {
        let frame_time = DateTime::parse_from_rfc3339(time).unwrap();
        let mut position = Waypoint::new(Some(frame_time), latitude, longitude);
        position.course = course;
        SelectionRecord {
            frame_index: 0,
            file_path: PathBuf::from("out/out_000000.jpg"),
            frame_time,
            position,
        }
    }

    #[test]
    fn row_formats_time_parts() {
        let row = TaggingRow::from_record(&record("2024-05-01T10:00:07.045+02:00", 1.0, 2.0, None));
        assert_eq!(row.all_dates(), "2024:05:01 10:00:07");
        assert_eq!(row.sub_sec_time(), "045");
        assert_eq!(row.offset_time(), "+02:00");
    }

    #[test]
    fn negative_offset() {
        let row = TaggingRow::from_record(&record("2024-05-01T10:00:00-05:30", 1.0, 2.0, None));
        assert_eq!(row.offset_time(), "-05:30");
        assert_eq!(row.sub_sec_time(), "000");
    }

    #[test]
    fn southern_western_refs_use_absolute_values() {
        let row = TaggingRow::from_record(&record("2024-05-01T10:00:00Z", -33.5, -70.25, Some(181.5)));
        let fields = row.fields(&CameraProfile::default());
        assert_eq!(fields[7], "33.5");
        assert_eq!(fields[8], "70.25");
        assert_eq!(fields[9], "S");
        assert_eq!(fields[10], "W");
        assert_eq!(fields[11], "181.5");
    }

    #[test]
    fn missing_course_is_empty() {
        let row = TaggingRow::from_record(&record("2024-05-01T10:00:00Z", 10.0, 20.0, None));
        let fields = row.fields(&CameraProfile::default());
        assert_eq!(fields[9], "N");
        assert_eq!(fields[10], "E");
        assert_eq!(fields[11], "");
        assert_eq!(fields[12], PROJECTION_TYPE);
        assert_eq!(fields[13], "Insta360");
        assert_eq!(fields[14], "X4");
        assert_eq!(fields[15], "1.2");
    }

    #[test]
    fn csv_has_header_and_one_line_per_record() {
        let records = vec![
            record("2024-05-01T10:00:00Z", 1.0, 2.0, None),
            record("2024-05-01T10:00:01Z", 1.0, 2.0, Some(90.0)),
        ];
        let table = TaggingTable::from_records(&records, &CameraProfile::default());
        let mut output = Vec::new();
        table.write_to(&mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("SourceFile,AllDates,"));
        assert!(lines[0].ends_with("XMP-GPano:ProjectionType,Make,Model,FocalLength"));
        assert!(lines[2].starts_with("out/out_000000.jpg,2024:05:01 10:00:01,000,"));
    }
}
