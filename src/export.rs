//! A deterministic snapshot of the current fit for writing out, and the sinks it can be
//! written to.
//!
//! Tabular output is append-only: every export adds new rows and never rewrites the
//! rows of earlier exports. The rendered image is overwritten on every export.
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::peak_set::PeakSet;
use crate::signal::Signal;
use crate::text;

/// The file per-peak parameter rows are appended to
pub const EXPORT_TABLE_NAME: &str = "export.csv";
/// The file per-export area rows are appended to
pub const AREAS_TABLE_NAME: &str = "areas.csv";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write export: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to render image: {0}")]
    Render(String),
}

/// One peak's exported parameters, independent of its identity
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExportRow {
    /// The 1-based position of the peak among the exported peaks
    pub peak_number: usize,
    pub center: f64,
    pub amplitude: f64,
    pub width: f64,
    /// `amplitude * width * sqrt(2 * pi)`
    pub area: f64,
    /// The area falling inside the signal's x-range
    pub area_in_range: f64,
}

/// Everything an exporter needs, in [`PeakSet`] order. Pending peaks are left out.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExportView {
    /// The name of the trace, used to label rows and name the image
    pub name: String,
    pub rows: Vec<ExportRow>,
    /// The observed signal coordinates
    pub signal_x: Vec<f64>,
    pub signal_y: Vec<f64>,
    /// The grid the model curves are sampled on, spanning the signal's x-range
    pub grid: Vec<f64>,
    /// The composite curve on `grid`, raised by the baseline if there is one
    pub composite: Vec<f64>,
    /// The constant offset fit under the peaks, if any
    pub baseline: Option<f64>,
    /// Each exported peak's own curve on `grid`
    pub components: Vec<Vec<f64>>,
}

impl ExportView {
    /// Build the view of `peaks` against `signal`, sampling curves on `samples` points
    pub fn new(name: impl Into<String>, signal: &Signal, peaks: &PeakSet, samples: usize) -> Self {
        let (lo, hi) = (signal.start(), signal.end());
        let rows = peaks
            .iter()
            .filter(|p| !p.is_pending())
            .enumerate()
            .filter_map(|(i, p)| {
                Some(ExportRow {
                    peak_number: i + 1,
                    center: p.center(),
                    amplitude: p.amplitude()?,
                    width: p.width()?,
                    area: p.area()?,
                    area_in_range: p.area_between(lo, hi)?,
                })
            })
            .collect();
        let grid = signal.grid(samples);
        let composite = peaks.composite_over(&grid);
        let components = peaks
            .iter()
            .filter(|p| !p.is_pending())
            .map(|p| p.predict(&grid))
            .collect();
        Self {
            name: name.into(),
            rows,
            signal_x: signal.x().to_vec(),
            signal_y: signal.y().to_vec(),
            grid,
            composite,
            baseline: None,
            components,
        }
    }

    /// Attach a fitted constant offset, raising the composite curve by it
    pub fn with_baseline(mut self, baseline: Option<f64>) -> Self {
        let shift = baseline.unwrap_or_default() - self.baseline.unwrap_or_default();
        self.composite.iter_mut().for_each(|v| *v += shift);
        self.baseline = baseline;
        self
    }

    /// The tab-delimited peak table
    pub fn table(&self) -> String {
        text::peak_table(&self.rows)
    }

    pub fn total_area(&self) -> f64 {
        self.rows.iter().map(|r| r.area).sum()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "plotting")] {
        fn render_image(view: &ExportView, path: &Path) -> Result<(), ExportError> {
            crate::plot::draw_png_file(view, path)
        }
    } else {
        fn render_image(_view: &ExportView, path: &Path) -> Result<(), ExportError> {
            log::debug!("Not rendering {}, the plotting feature is disabled", path.display());
            Ok(())
        }
    }
}

/// Somewhere an [`ExportView`] can be written to
pub trait ExportSink {
    fn export(&mut self, view: &ExportView) -> Result<(), ExportError>;
}

/// Collects exports in memory, following the same append and overwrite rules as
/// [`DirectoryExporter`]
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    /// Every exported row, tagged with its trace name, in export order
    pub rows: Vec<(String, ExportRow)>,
    /// The most recent view, standing in for the image
    pub image: Option<ExportView>,
    pub exports: usize,
}

impl ExportSink for MemoryExporter {
    fn export(&mut self, view: &ExportView) -> Result<(), ExportError> {
        self.rows
            .extend(view.rows.iter().map(|r| (view.name.clone(), *r)));
        self.image = Some(view.clone());
        self.exports += 1;
        Ok(())
    }
}

/// Writes exports into a directory as `export.csv`, `areas.csv`, and `<name>.png`
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    directory: PathBuf,
    render_image: bool,
}

impl DirectoryExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            render_image: cfg!(feature = "plotting"),
        }
    }

    /// Whether to render `<name>.png`. Only possible with the `plotting` feature.
    pub fn render_image(mut self, render_image: bool) -> Self {
        self.render_image = render_image && cfg!(feature = "plotting");
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn export_table_path(&self) -> PathBuf {
        self.directory.join(EXPORT_TABLE_NAME)
    }

    pub fn areas_table_path(&self) -> PathBuf {
        self.directory.join(AREAS_TABLE_NAME)
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.png"))
    }

    /// Open `path` for appending, reporting whether it was just created
    fn open_append(path: &Path) -> io::Result<(io::BufWriter<fs::File>, bool)> {
        let created = !path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok((io::BufWriter::new(file), created))
    }

    fn append_tables(&self, view: &ExportView) -> Result<(), ExportError> {
        let (mut writer, created) = Self::open_append(&self.export_table_path())?;
        if created {
            text::write_export_header(&mut writer)?;
        }
        text::write_export_rows(&mut writer, view)?;
        writer.flush()?;

        let (mut writer, created) = Self::open_append(&self.areas_table_path())?;
        if created {
            text::write_areas_header(&mut writer, view.rows.len())?;
        }
        text::write_areas_row(&mut writer, view)?;
        writer.flush()?;
        Ok(())
    }
}

impl ExportSink for DirectoryExporter {
    fn export(&mut self, view: &ExportView) -> Result<(), ExportError> {
        fs::create_dir_all(&self.directory)?;
        self.append_tables(view)?;
        if self.render_image {
            render_image(view, &self.image_path(&view.name))?;
        }
        log::debug!(
            "Exported {} rows for {} to {}",
            view.rows.len(),
            view.name,
            self.directory.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::mixture_signal;
    use tempfile::TempDir;

    fn view() -> ExportView {
        let signal = mixture_signal(&[(100.0, 30.0, 4.0), (50.0, 70.0, 3.0)]);
        let mut peaks = PeakSet::new();
        peaks.add_seeded(30.0, 100.0, 4.0).unwrap();
        peaks.add_pending(50.0).unwrap();
        peaks.add_seeded(70.0, 50.0, 3.0).unwrap();
        ExportView::new("lane 1", &signal, &peaks, 200)
    }

    fn scratch_directory() -> (TempDir, PathBuf) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("exports");
        (root, dir)
    }

    #[test]
    fn test_view_skips_pending() {
        let view = view();
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.components.len(), 2);
        assert_eq!(view.rows[1].peak_number, 2);
        assert_eq!(view.rows[1].center, 70.0);
        let expected = 100.0 * 4.0 * (2.0 * std::f64::consts::PI).sqrt();
        assert!((view.rows[0].area - expected).abs() < 1e-9);
        assert!((view.rows[0].area_in_range - expected).abs() < 1e-6);
        assert_eq!(view.grid.len(), 200);
        assert_eq!(view.grid[0], 0.0);
        assert_eq!(view.grid[199], 100.0);
        assert!(view.table().starts_with("Peak\tArea"));
    }

    #[test]
    fn test_view_baseline() {
        let plain = view();
        let raised = view().with_baseline(Some(2.5));
        assert_eq!(raised.baseline, Some(2.5));
        assert_eq!(raised.rows, plain.rows);
        for (a, b) in plain.composite.iter().zip(raised.composite.iter()) {
            assert!((b - a - 2.5).abs() < 1e-12);
        }
        let lowered = raised.with_baseline(None);
        assert_eq!(lowered.baseline, None);
        for (a, b) in plain.composite.iter().zip(lowered.composite.iter()) {
            assert!((b - a).abs() < 1e-12);
        }
    }

    #[test]
    fn test_directory_export_baseline_column() {
        let (_root, dir) = scratch_directory();
        let mut exporter = DirectoryExporter::new(&dir).render_image(false);
        exporter.export(&view().with_baseline(Some(10.0))).unwrap();
        let text = fs::read_to_string(exporter.export_table_path()).unwrap();
        let row = text.lines().find(|l| l.starts_with("lane 1,1,")).unwrap();
        assert!(row.starts_with("lane 1,1,10,"), "{row}");
    }

    #[test]
    fn test_memory_export_appends() {
        let view = view();
        let mut sink = MemoryExporter::default();
        sink.export(&view).unwrap();
        sink.export(&view).unwrap();
        assert_eq!(sink.rows.len(), 4);
        assert_eq!(sink.exports, 2);
        assert_eq!(sink.image.as_ref(), Some(&view));
    }

    #[test]
    fn test_directory_export_appends_tables() {
        let (_root, dir) = scratch_directory();
        let mut exporter = DirectoryExporter::new(&dir).render_image(false);
        let view = view();
        exporter.export(&view).unwrap();
        let first = fs::read_to_string(exporter.export_table_path()).unwrap();
        exporter.export(&view).unwrap();
        let second = fs::read_to_string(exporter.export_table_path()).unwrap();

        assert!(second.starts_with(&first));
        let rows = |text: &str| text.lines().filter(|l| l.starts_with("lane 1,")).count();
        assert_eq!(rows(&first), 2);
        assert_eq!(rows(&second), 4);
        assert_eq!(second.lines().filter(|l| l.starts_with("filename")).count(), 1);

        let areas = fs::read_to_string(exporter.areas_table_path()).unwrap();
        assert_eq!(areas.lines().count(), 3);
        assert!(areas.starts_with("Filename,Peak 1"));
        assert!(!exporter.image_path("lane 1").exists());
        assert!(first.starts_with("filename,Peak,y0,Area"));
    }

    #[cfg(feature = "plotting")]
    #[test]
    fn test_directory_export_overwrites_image() {
        let (_root, dir) = scratch_directory();
        let mut exporter = DirectoryExporter::new(&dir);
        let view = view();
        exporter.export(&view).unwrap();
        assert!(exporter.image_path("lane 1").exists());
        exporter.export(&view).unwrap();

        let pngs = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .count();
        assert_eq!(pngs, 1);
        let text = fs::read_to_string(exporter.export_table_path()).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("lane 1,")).count(), 4);
    }
}
