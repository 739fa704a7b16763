//! Plotters-powered diagnostic chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description; all series and bounds are computed
/// outside the render call.
pub struct MaskPlottersChart<'a> {
    /// Line series for the fitted double sigmoid.
    pub curve: &'a [(f64, f64)],
    /// Observed scan rows inside the fit window: `(pixel, counts, error)`.
    pub points: &'a [(f64, f64, f64)],
    /// Pixel bounds (the fit window).
    pub x_bounds: [f64; 2],
    /// Count bounds.
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl<'a> Widget for MaskPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.0}"))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let curve_color = RGBColor(255, 0, 0);
            let bar_color = RGBColor(128, 128, 128);
            let points_color = WHITE;

            // Error bars, clipped to the visible count range.
            chart.draw_series(self.points.iter().map(|&(x, y, e)| {
                let lo = (y - e).clamp(y0, y1);
                let hi = (y + e).clamp(y0, y1);
                PathElement::new(vec![(x, lo), (x, hi)], bar_color)
            }))?;

            chart.draw_series(LineSeries::new(self.curve.iter().copied(), &curve_color))?;

            // `Circle` radii are mis-scaled by the ratatui backend; use pixels.
            chart.draw_series(
                self.points
                    .iter()
                    .filter(|&&(_, y, _)| y >= y0 && y <= y1)
                    .map(|&(x, y, _)| Pixel::new((x, y), points_color)),
            )?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
