//! Tab-separated movement and predation logs.
//!
//! Animals append one line per step into in-memory buffers; the engine
//! drains them into files every few ticks. Column layouts are fixed so
//! downstream tooling can rely on them.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use weaver_types::{AnimalId, DryMass, Instar, Point, TimeStep};

use crate::config::OutputConfig;

/// Header of `movements.txt`.
pub const MOVEMENTS_HEADER: &str = "id\ttimeStep\tstartPointX\tstartPointY\tendPointX\tendPointY";

/// Header of `predation.txt`.
pub const PREDATION_HEADER: &str = "timeStep\tpredator\tprey\tpreySpecies\tpreyInstar\tfood";

/// File name of the movement log.
pub const MOVEMENTS_FILE: &str = "movements.txt";

/// File name of the predation log.
pub const PREDATION_FILE: &str = "predation.txt";

/// One successful predation, as written to the log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredationRecord<'a> {
    /// Step the predation happened in.
    pub time_step: TimeStep,
    /// The predator.
    pub predator: AnimalId,
    /// The prey.
    pub prey: AnimalId,
    /// Name of the prey species.
    pub prey_species: &'a str,
    /// Instar of the prey.
    pub prey_instar: Instar,
    /// Dry mass transferred to the predator.
    pub food: DryMass,
}

/// In-memory log buffers of a run.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffers {
    movements: Option<String>,
    predation: Option<String>,
}

impl OutputBuffers {
    /// Buffers for the logs enabled in `config`.
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            movements: config.movements.then(String::new),
            predation: config.predation.then(String::new),
        }
    }

    /// Buffers that record nothing.
    pub const fn disabled() -> Self {
        Self {
            movements: None,
            predation: None,
        }
    }

    /// Append one movement line.
    pub fn record_movement(&mut self, id: AnimalId, time_step: TimeStep, start: Point, end: Point) {
        if let Some(buffer) = self.movements.as_mut() {
            let _ = writeln!(
                buffer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                id.into_inner(),
                time_step.value(),
                start.x,
                start.y,
                end.x,
                end.y
            );
        }
    }

    /// Append one predation line.
    pub fn record_predation(&mut self, record: &PredationRecord<'_>) {
        if let Some(buffer) = self.predation.as_mut() {
            let _ = writeln!(
                buffer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                record.time_step.value(),
                record.predator.into_inner(),
                record.prey.into_inner(),
                record.prey_species,
                record.prey_instar,
                record.food.value()
            );
        }
    }

    /// Movement lines recorded since the last drain.
    pub fn movements(&self) -> &str {
        self.movements.as_deref().unwrap_or_default()
    }

    /// Predation lines recorded since the last drain.
    pub fn predations(&self) -> &str {
        self.predation.as_deref().unwrap_or_default()
    }

    /// Take the pending movement lines, leaving the buffer empty.
    pub fn take_movements(&mut self) -> String {
        self.movements.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Take the pending predation lines, leaving the buffer empty.
    pub fn take_predations(&mut self) -> String {
        self.predation.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Append pending lines to the log files under `directory`.
    ///
    /// Files are created with their header on first use.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the first file that cannot be written.
    pub fn flush_to(&mut self, directory: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(directory)?;
        if self.movements.is_some() {
            let lines = self.take_movements();
            append(&directory.join(MOVEMENTS_FILE), MOVEMENTS_HEADER, &lines)?;
        }
        if self.predation.is_some() {
            let lines = self.take_predations();
            append(&directory.join(PREDATION_FILE), PREDATION_HEADER, &lines)?;
        }
        Ok(())
    }
}

fn append(path: &Path, header: &str, lines: &str) -> std::io::Result<()> {
    let fresh = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if fresh {
        writeln!(file, "{header}")?;
    }
    file.write_all(lines.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn movement_lines_follow_the_header_columns() {
        let mut buffers = OutputBuffers::new(&OutputConfig::default());
        let id = AnimalId::new();
        buffers.record_movement(id, TimeStep::new(3), Point::new(0.5, 1.0), Point::new(2.0, 1.5));
        let line = buffers.movements().lines().next().unwrap();
        let columns: Vec<&str> = line.split('\t').collect();
        assert_eq!(columns.len(), MOVEMENTS_HEADER.split('\t').count());
        assert_eq!(columns.get(1), Some(&"3"));
        assert_eq!(columns.get(4), Some(&"2"));
    }

    #[test]
    fn disabled_logs_stay_empty() {
        let config = OutputConfig {
            movements: false,
            ..OutputConfig::default()
        };
        let mut buffers = OutputBuffers::new(&config);
        buffers.record_movement(AnimalId::new(), TimeStep::ZERO, Point::default(), Point::default());
        assert!(buffers.movements().is_empty());
        buffers.record_predation(&PredationRecord {
            time_step: TimeStep::new(1),
            predator: AnimalId::new(),
            prey: AnimalId::new(),
            prey_species: "Collembola",
            prey_instar: Instar::FIRST,
            food: DryMass::new(0.25),
        });
        assert!(buffers.predations().ends_with("Collembola\t1\t0.25\n"));
        assert_eq!(buffers.take_predations().lines().count(), 1);
        assert!(buffers.predations().is_empty());
    }

    #[test]
    fn flush_writes_headers_once() {
        let directory = std::env::temp_dir().join(format!("weaver-output-{}", AnimalId::new().into_inner()));
        let mut buffers = OutputBuffers::new(&OutputConfig::default());
        buffers.record_movement(AnimalId::new(), TimeStep::new(1), Point::default(), Point::default());
        buffers.flush_to(&directory).unwrap();
        buffers.record_movement(AnimalId::new(), TimeStep::new(2), Point::default(), Point::default());
        buffers.flush_to(&directory).unwrap();
        let written = std::fs::read_to_string(directory.join(MOVEMENTS_FILE)).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert_eq!(written.lines().next(), Some(MOVEMENTS_HEADER));
        let predations = std::fs::read_to_string(directory.join(PREDATION_FILE)).unwrap();
        assert_eq!(predations.lines().count(), 1);
        std::fs::remove_dir_all(&directory).unwrap();
    }
}
