//! Reading signals from, and writing peak tables to, delimited text.
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path;

use crate::export::{ExportRow, ExportView};
use crate::signal::{Signal, SignalError};

/// The header of the per-peak parameter table
pub const PEAK_TABLE_HEADER: [&str; 5] = ["Peak", "Area", "xc", "Amp", "w"];

/// The header of the appended per-peak CSV table
pub const EXPORT_TABLE_HEADER: [&str; 7] = ["filename", "Peak", "y0", "Area", "xc", "Amp", "w"];

/// The minimum number of area columns named in an areas table header
const MIN_AREA_COLUMNS: usize = 6;

fn parse_pair(line: &str) -> Option<(f64, f64)> {
    let mut fields = line
        .split(|c: char| c == ',' || c == ';' || c == '\t' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    Some((x, y))
}

/// Read a two column signal from delimited text.
///
/// Columns may be separated by commas, tabs, semicolons, or spaces, and any
/// further columns are ignored. Lines before the first numeric row are treated
/// as headers and skipped, as are blank lines.
pub fn read_signal<R: BufRead>(reader: R) -> Result<Signal, SignalError> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SignalError::Io(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_pair(line) {
            Some((xi, yi)) => {
                x.push(xi);
                y.push(yi);
            }
            None if x.is_empty() => {
                log::debug!("Skipping header line {}: {line}", i + 1);
            }
            None => {
                return Err(SignalError::Parse {
                    line: i + 1,
                    reason: format!("expected two numeric columns, found {line:?}"),
                })
            }
        }
    }
    Signal::new(x, y)
}

pub fn read_signal_file<P: AsRef<path::Path>>(path: P) -> Result<Signal, SignalError> {
    let file = fs::File::open(path).map_err(|e| SignalError::Io(e.to_string()))?;
    read_signal(io::BufReader::new(file))
}

/// Write `signal` as tab-delimited text, one sample per line
pub fn write_signal<W: Write>(signal: &Signal, writer: &mut W) -> io::Result<()> {
    for (x, y) in signal.iter() {
        writeln!(writer, "{x}\t{y}")?;
    }
    Ok(())
}

pub fn to_file<P: AsRef<path::Path>>(signal: &Signal, path: P) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    write_signal(signal, &mut writer)?;
    writer.flush()
}

/// Format `rows` as a tab-delimited table with a [`PEAK_TABLE_HEADER`] header
pub fn peak_table(rows: &[ExportRow]) -> String {
    let mut table = PEAK_TABLE_HEADER.join("\t");
    for row in rows {
        table.push_str(&format!(
            "\n{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            row.peak_number, row.area, row.center, row.amplitude, row.width
        ));
    }
    table
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

/// Write the header of a per-peak parameter CSV table
pub fn write_export_header<W: Write>(writer: W) -> io::Result<()> {
    let mut writer = csv_writer(writer);
    writer.write_record(EXPORT_TABLE_HEADER)?;
    writer.flush()
}

/// Append one export's rows to a per-peak parameter CSV table, preceded by a blank
/// separator line. The `y0` column is left empty when no baseline was fit.
pub fn write_export_rows<W: Write>(mut writer: W, view: &ExportView) -> io::Result<()> {
    writeln!(writer)?;
    let baseline = view.baseline.map(|b| b.to_string()).unwrap_or_default();
    let mut writer = csv_writer(writer);
    for row in view.rows.iter() {
        writer.write_record([
            view.name.clone(),
            row.peak_number.to_string(),
            baseline.clone(),
            row.area.to_string(),
            row.center.to_string(),
            row.amplitude.to_string(),
            row.width.to_string(),
        ])?;
    }
    writer.flush()
}

/// Write the header of an areas CSV table
pub fn write_areas_header<W: Write>(writer: W, n_peaks: usize) -> io::Result<()> {
    let mut writer = csv_writer(writer);
    let mut header = vec!["Filename".to_string()];
    header.extend((1..=n_peaks.max(MIN_AREA_COLUMNS)).map(|i| format!("Peak {i}")));
    writer.write_record(&header)?;
    writer.flush()
}

/// Append one export's areas as a single CSV row
pub fn write_areas_row<W: Write>(writer: W, view: &ExportView) -> io::Result<()> {
    let mut writer = csv_writer(writer);
    let mut record = vec![view.name.clone()];
    record.extend(view.rows.iter().map(|row| row.area.to_string()));
    writer.write_record(&record)?;
    writer.flush()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_signal_with_header() {
        let text = "Distance (cm),Gray Value\n0,1.5\n1,2.5\n\n2,3.5\n";
        let signal = read_signal(text.as_bytes()).unwrap();
        assert_eq!(signal.x(), &[0.0, 1.0, 2.0]);
        assert_eq!(signal.y(), &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_read_signal_delimiters() {
        let text = "1\t10\t99\n2; 20\n3 30\n";
        let signal = read_signal(text.as_bytes()).unwrap();
        assert_eq!(signal.y(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_read_signal_errors() {
        let err = read_signal("x,y\n0,1\noops\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SignalError::Parse { line: 3, .. }), "{err}");
        let err = read_signal("x,y\n0,1\n".as_bytes()).unwrap_err();
        assert_eq!(err, SignalError::TooFewPoints(1));
        let err = read_signal("1,1\n0,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SignalError::NotIncreasing { .. }));
    }

    #[test]
    fn test_write_read_signal() {
        let signal = Signal::from_pairs([(0.5, 1.0), (1.0, 4.25), (1.5, 2.0)]).unwrap();
        let mut buffer = Vec::new();
        write_signal(&signal, &mut buffer).unwrap();
        assert_eq!(read_signal(buffer.as_slice()).unwrap(), signal);
    }

    #[test]
    fn test_lane_file() {
        let signal = read_signal_file("test/data/lane.txt").unwrap();
        assert_eq!(signal.len(), 401);
        assert_eq!(signal.start(), 0.0);
        assert_eq!(signal.end(), 200.0);

        let file = tempfile::NamedTempFile::new().unwrap();
        to_file(&signal, file.path()).unwrap();
        assert_eq!(read_signal_file(file.path()).unwrap(), signal);
    }

    fn view(name: &str, baseline: Option<f64>) -> ExportView {
        let signal = Signal::from_pairs([(0.0, 1.0), (1.0, 4.0), (2.0, 1.0)]).unwrap();
        let mut view = ExportView::new(name, &signal, &crate::PeakSet::new(), 3);
        view.rows.push(ExportRow {
            peak_number: 1,
            center: 2.0,
            amplitude: 3.0,
            width: 0.5,
            area: 4.0,
            area_in_range: 3.5,
        });
        view.with_baseline(baseline)
    }

    #[test]
    fn test_csv_rows() {
        let mut buffer = Vec::new();
        write_export_header(&mut buffer).unwrap();
        write_export_rows(&mut buffer, &view("lane, 1", None)).unwrap();
        write_export_rows(&mut buffer, &view("lane \"2\"", Some(1.5))).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "filename,Peak,y0,Area,xc,Amp,w\n\n\"lane, 1\",1,,4,2,3,0.5\n\n\"lane \"\"2\"\"\",1,1.5,4,2,3,0.5\n"
        );

        let mut buffer = Vec::new();
        write_areas_header(&mut buffer, 1).unwrap();
        write_areas_row(&mut buffer, &view("lane2", None)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "Filename,Peak 1,Peak 2,Peak 3,Peak 4,Peak 5,Peak 6\nlane2,4\n"
        );
    }

    #[test]
    fn test_peak_table() {
        let table = peak_table(&view("lane", None).rows);
        assert_eq!(
            table,
            "Peak\tArea\txc\tAmp\tw\n1\t4.000000\t2.000000\t3.000000\t0.500000"
        );
    }
}
