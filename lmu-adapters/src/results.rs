//! Result file writer
//!
//! One semicolon-separated file per session. The whole file is rewritten
//! on every update so it always reflects the latest stats, one row per
//! competitor ordered by position.
//!
//! Sinks are driven from the ingestion task, so file I/O steps off the async
//! worker with `block_in_place` when running on a multi-threaded runtime.

use anyhow::{Context, Result};
use chrono::Local;
use lmu_core::model::{CompetitorStats, SessionInfo};
use lmu_core::units::format_lap_time;
use lmu_core::{ResultSink, ResultSinkFactory};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

const DELIMITER: char = ';';

const HEADER: [&str; 18] = [
    "Position",
    "SteamID",
    "DriverName",
    "VehicleName",
    "VehicleModel",
    "VehicleNumber",
    "CarClass",
    "LapsCompleted",
    "MaxSpeed",
    "BestLapTime",
    "BestSector1",
    "BestSector2",
    "BestSector3",
    "BestLapTimeCalc",
    "BestSector1Calc",
    "BestSector2Calc",
    "BestSector3Calc",
    "MaxSpeedOnBestLapCalc",
];

/// Opens a [`ResultFile`] per session inside a directory
pub struct ResultFileFactory {
    dir: PathBuf,
}

impl ResultFileFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ResultSinkFactory for ResultFileFactory {
    fn open(&self, session: &SessionInfo) -> Result<Box<dyn ResultSink>> {
        blocking(|| std::fs::create_dir_all(&self.dir))
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(file_name(session, Local::now()));
        Ok(Box::new(ResultFile::new(path)))
    }
}

/// `{date}_{track}_{session}_telemetry.csv`, spaces replaced by underscores
pub fn file_name(session: &SessionInfo, opened_at: chrono::DateTime<Local>) -> String {
    format!(
        "{}_{}_{}_telemetry.csv",
        opened_at.format("%Y-%m-%d_%H-%M-%S"),
        session.track_name.replace(' ', "_"),
        session.session.replace(' ', "_"),
    )
}

/// Result file for one session
pub struct ResultFile {
    path: PathBuf,
    rows: HashMap<String, CompetitorStats>,
}

impl ResultFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            rows: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file from the current rows
    pub fn write_current_state(&self) -> Result<()> {
        let mut content = Vec::new();
        write_table(&mut content, self.rows.values())?;
        blocking(|| std::fs::write(&self.path, &content))
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), rows = self.rows.len(), "Result file written");
        Ok(())
    }
}

impl ResultSink for ResultFile {
    fn update(&mut self, stats: &CompetitorStats) -> Result<()> {
        self.rows.insert(stats.driver_name.clone(), stats.clone());
        self.write_current_state()
    }

    fn close(&mut self) -> Result<()> {
        self.write_current_state()
    }
}

/// Run blocking file I/O without stalling the other tasks on this worker.
/// `block_in_place` is unavailable on the current-thread runtime, where the
/// call runs inline.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Write the header and one row per competitor, ordered by position
pub fn write_table<'a, W: Write>(
    out: &mut W,
    stats: impl IntoIterator<Item = &'a CompetitorStats>,
) -> Result<()> {
    let mut rows: Vec<&CompetitorStats> = stats.into_iter().collect();
    rows.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.driver_name.cmp(&b.driver_name))
    });

    write_record(out, HEADER.iter().map(|h| h.to_string()))?;
    for s in rows {
        write_record(
            out,
            [
                s.position.to_string(),
                s.steam_id.to_string(),
                s.driver_name.clone(),
                s.vehicle_name.clone(),
                s.vehicle_model.clone(),
                s.vehicle_number.clone(),
                s.car_class.clone(),
                s.laps_completed.to_string(),
                format!("{:.1}", s.max_speed),
                format_lap_time(s.best_lap_time),
                format_lap_time(s.best_sector1),
                format_lap_time(s.best_sector2),
                format_lap_time(s.best_sector3),
                format_lap_time(s.best_lap_time_calculated),
                format_lap_time(s.best_sector1_calculated),
                format_lap_time(s.best_sector2_calculated),
                format_lap_time(s.best_sector3_calculated),
                format!("{:.1}", s.max_speed_on_best_lap_calculated),
            ],
        )?;
    }
    Ok(())
}

fn write_record<W: Write>(out: &mut W, fields: impl IntoIterator<Item = String>) -> Result<()> {
    let line = fields
        .into_iter()
        .map(|f| escape_field(&f))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());
    writeln!(out, "{}", line)?;
    Ok(())
}

/// Quote fields containing the delimiter, quotes or line breaks
fn escape_field(field: &str) -> String {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stats(name: &str, position: i32) -> CompetitorStats {
        CompetitorStats {
            driver_name: name.to_string(),
            vehicle_name: "Toyota GR010 #7".to_string(),
            vehicle_model: "Toyota GR010".to_string(),
            vehicle_number: "7".to_string(),
            car_class: "Hypercar".to_string(),
            steam_id: 42,
            position,
            laps_completed: 3,
            max_speed: 301.26,
            best_lap_time: 95.2,
            best_sector1: 31.0,
            best_sector2: 32.5,
            best_sector3: 31.7,
            ..Default::default()
        }
    }

    #[test]
    fn test_file_name() {
        let session = SessionInfo {
            track_name: "Circuit de la Sarthe".to_string(),
            session: "RACE 1".to_string(),
            ..Default::default()
        };
        let at = Local.with_ymd_and_hms(2024, 6, 15, 16, 0, 5).unwrap();
        assert_eq!(
            file_name(&session, at),
            "2024-06-15_16-00-05_Circuit_de_la_Sarthe_RACE_1_telemetry.csv"
        );
    }

    #[test]
    fn test_table_rows_ordered_by_position() {
        let a = stats("Alice", 2);
        let b = stats("Bob", 1);
        let mut out = Vec::new();
        write_table(&mut out, [&a, &b]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Position;SteamID;DriverName"));
        assert!(lines[1].starts_with("1;42;Bob;"));
        assert!(lines[2].starts_with("2;42;Alice;"));
    }

    #[test]
    fn test_row_formats_times_and_na() {
        let mut out = Vec::new();
        write_table(&mut out, [&stats("Alice", 1)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row: Vec<_> = text.lines().nth(1).unwrap().split(';').collect();

        assert_eq!(row.len(), HEADER.len());
        assert_eq!(row[8], "301.3");
        assert_eq!(row[9], "1:35.200");
        assert_eq!(row[10], "0:31.000");
        assert_eq!(row[12], "0:31.700");
        // No calculated best yet
        assert_eq!(row[13], "N/A");
        assert_eq!(row[17], "0.0");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a;b"), "\"a;b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_result_file_rewritten_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ResultFile::new(dir.path().join("results.csv"));

        file.update(&stats("Alice", 1)).unwrap();
        file.update(&stats("Bob", 2)).unwrap();
        let mut alice = stats("Alice", 3);
        alice.laps_completed = 4;
        file.update(&alice).unwrap();
        file.close().unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2;42;Bob;"));
        assert!(lines[2].starts_with("3;42;Alice;"));
    }

    #[test]
    fn test_factory_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ResultFileFactory::new(dir.path().join("results"));
        let session = SessionInfo {
            track_name: "Spa".to_string(),
            session: "RACE1".to_string(),
            ..Default::default()
        };
        let mut sink = factory.open(&session).unwrap();
        sink.update(&stats("Alice", 1)).unwrap();
        sink.close().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("results"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("_Spa_RACE1_telemetry.csv"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_from_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ResultFileFactory::new(dir.path().join("results"));
        let session = SessionInfo {
            track_name: "Spa".to_string(),
            session: "RACE1".to_string(),
            ..Default::default()
        };

        let mut sink = factory.open(&session).unwrap();
        sink.update(&stats("Alice", 1)).unwrap();
        sink.update(&stats("Bob", 2)).unwrap();
        sink.close().unwrap();

        let entry = std::fs::read_dir(dir.path().join("results"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let text = std::fs::read_to_string(entry.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_writes_from_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = ResultFile::new(dir.path().join("results.csv"));
        file.update(&stats("Alice", 1)).unwrap();
        file.close().unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("1;42;Alice;"));
    }
}
