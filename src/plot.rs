//! Render an [`ExportView`] as a static summary image.
//!
//! The image carries no text, so rendering does not depend on any system fonts.
use std::path;

use plotters::prelude::*;

use crate::export::{ExportError, ExportView};
use crate::peak_statistics::minmax;

pub const IMAGE_SIZE: (u32, u32) = (800, 600);

fn render_error<E: std::fmt::Display>(err: E) -> ExportError {
    ExportError::Render(err.to_string())
}

pub fn draw_png_file<P>(view: &ExportView, path: P) -> Result<(), ExportError>
where
    P: AsRef<path::Path>,
{
    let backend = BitMapBackend::new(path.as_ref(), IMAGE_SIZE);
    draw_on_bitmap(view, backend)
}

/// Draw the raw trace in black, each peak in blue, and the composite curve in red
pub fn draw_on_bitmap(view: &ExportView, backend: BitMapBackend) -> Result<(), ExportError> {
    let root = backend.into_drawing_area();

    let (xmin, xmax) = minmax(&view.signal_x);
    let (signal_min, signal_max) = minmax(&view.signal_y);
    let (_, composite_max) = minmax(&view.composite);
    let ymin = signal_min.min(0.0);
    let mut ymax = signal_max.max(composite_max);
    if !(ymax > ymin) {
        ymax = ymin + 1.0;
    }
    let ymax = ymax + (ymax - ymin) * 0.05;

    root.fill(&WHITE).map_err(render_error)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .build_cartesian_2d(xmin..xmax, ymin..ymax)
        .map_err(render_error)?;

    let trace = LineSeries::new(
        view.signal_x
            .iter()
            .copied()
            .zip(view.signal_y.iter().copied()),
        ShapeStyle {
            color: BLACK.mix(1.0),
            filled: false,
            stroke_width: 1,
        },
    );
    chart.draw_series(trace).map_err(render_error)?;

    for component in view.components.iter() {
        let series = LineSeries::new(
            view.grid.iter().copied().zip(component.iter().copied()),
            ShapeStyle {
                color: BLUE.mix(0.6),
                filled: false,
                stroke_width: 1,
            },
        );
        chart.draw_series(series).map_err(render_error)?;
    }

    let composite = LineSeries::new(
        view.grid.iter().copied().zip(view.composite.iter().copied()),
        ShapeStyle {
            color: RED.mix(1.0),
            filled: false,
            stroke_width: 2,
        },
    );
    chart.draw_series(composite).map_err(render_error)?;

    root.present().map_err(render_error)?;
    Ok(())
}
