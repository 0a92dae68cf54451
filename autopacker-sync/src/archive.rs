//! Zip-side helpers: entry listing, timestamp conversion, file appends.
//!
//! Zip timestamps are MS-DOS local times with two-second resolution, which
//! is where [`TIMESTAMP_TOLERANCE`] comes from.

use std::fs::File;
use std::io::{self, BufReader, Seek, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{io_err, zip_err, SyncError};
use crate::scan::DiskFile;

/// Maximum mtime drift between a disk file and its entry that still counts
/// as unchanged.
pub const TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(2);

/// One entry as recorded in an existing archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the central directory, used for raw copies.
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// List every entry of the archive at `path`.
pub fn read_entries(path: &Path) -> Result<Vec<ArchiveEntry>, SyncError> {
    let mut archive = open_archive(path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|e| zip_err(path, e))?;
        entries.push(ArchiveEntry {
            index,
            name: entry.name().to_string(),
            size: entry.size(),
            modified: entry.last_modified().and_then(from_zip_time),
        });
    }
    Ok(entries)
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, SyncError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| zip_err(path, e))
}

/// `a` and `b` are no more than [`TIMESTAMP_TOLERANCE`] apart.
pub fn within_tolerance(a: SystemTime, b: SystemTime) -> bool {
    let delta = match a.duration_since(b) {
        Ok(delta) => delta,
        Err(err) => err.duration(),
    };
    delta <= TIMESTAMP_TOLERANCE
}

/// An entry is current when its size matches and its mtime is within tolerance.
///
/// Files older than the zip epoch are stored with the clamped epoch stamp;
/// such an entry is current as long as the disk file is still that old.
pub fn is_current(disk: &DiskFile, entry: &ArchiveEntry) -> bool {
    entry.size == disk.size
        && entry
            .modified
            .map(|modified| {
                within_tolerance(modified, disk.modified) || clamped_to_epoch(modified, disk.modified)
            })
            .unwrap_or(false)
}

fn clamped_to_epoch(stored: SystemTime, disk: SystemTime) -> bool {
    from_zip_time(DateTime::default())
        .map(|epoch| disk < epoch && within_tolerance(stored, epoch))
        .unwrap_or(false)
}

/// Local wall-clock time of `time` as a zip timestamp.
///
/// Times outside the DOS range (before 1980) clamp to the zip epoch.
pub fn to_zip_time(time: SystemTime) -> DateTime {
    let local: chrono::DateTime<Local> = time.into();
    let Ok(year) = u16::try_from(local.year()) else {
        return DateTime::default();
    };
    DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .unwrap_or_default()
}

/// Inverse of [`to_zip_time`]; `None` for nonsensical stored dates.
pub fn from_zip_time(stamp: DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(
        stamp.year().into(),
        stamp.month().into(),
        stamp.day().into(),
    )?;
    let naive = date.and_hms_opt(
        stamp.hour().into(),
        stamp.minute().into(),
        stamp.second().into(),
    )?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(local.into())
}

/// Deflate `file` into `zip` under `name`, stamped with the file's mtime.
pub fn append_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    archive: &Path,
    file: &DiskFile,
    name: &str,
) -> Result<(), SyncError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(to_zip_time(file.modified))
        .large_file(file.size >= u64::from(u32::MAX));
    zip.start_file(name, options)
        .map_err(|e| zip_err(archive, e))?;

    let mut input = File::open(&file.path).map_err(|e| io_err(&file.path, e))?;
    io::copy(&mut input, zip).map_err(|e| io_err(&file.path, e))?;
    Ok(())
}
