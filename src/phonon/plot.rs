//! # 能带图
//!
//! 使用 `plotters` 绘制声子色散曲线，输出格式由扩展名决定 (png / svg)。
//! 高对称点处画竖线并标注名称，断开的路径段标注为 `X|M`。
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs` 调用
//! - 使用 `plotters` 渲染图表

use super::BandStructure;
use crate::error::{CalcError, Result};

use plotters::prelude::*;
use std::path::Path;

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok(PlotFormat::Png),
            "svg" => Ok(PlotFormat::Svg),
            _ => Err(CalcError::InvalidArgument(format!(
                "plot_path must end with .png or .svg: {}",
                path.display()
            ))),
        }
    }
}

/// 高对称点在横轴上的位置与标签
pub fn tick_labels(bands: &BandStructure) -> Vec<(f64, String)> {
    let mut ticks: Vec<(f64, String)> = Vec::new();
    for segment in &bands.path.segments {
        let start = segment.distances.first().copied().unwrap_or(0.0);
        let end = segment.distances.last().copied().unwrap_or(start);
        match ticks.last_mut() {
            Some((x, name)) if (*x - start).abs() < 1e-12 => {
                if name != segment.start.name {
                    *name = format!("{}|{}", name, segment.start.name);
                }
            }
            _ => ticks.push((start, segment.start.name.to_string())),
        }
        ticks.push((end, segment.end.name.to_string()));
    }
    ticks
}

/// 生成能带图
pub fn generate_band_plot(
    bands: &BandStructure,
    output_path: &Path,
    title: &str,
    width: u32,
    height: u32,
) -> Result<()> {
    match PlotFormat::from_path(output_path)? {
        PlotFormat::Svg => {
            let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
            draw_bands(&root, bands, title)?;
            root.present()
                .map_err(|e| CalcError::PlotError(e.to_string()))?;
        }
        PlotFormat::Png => {
            let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
            draw_bands(&root, bands, title)?;
            root.present()
                .map_err(|e| CalcError::PlotError(e.to_string()))?;
        }
    }
    Ok(())
}

fn draw_bands<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    bands: &BandStructure,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;

    let x_max = bands.path.total_distance().max(1e-6);
    let (lo, hi) = bands
        .frequencies
        .iter()
        .flatten()
        .flatten()
        .fold((0.0f64, 0.0f64), |(lo, hi), &f| (lo.min(f), hi.max(f)));
    let pad = ((hi - lo) * 0.05).max(0.1);
    let y_range = (lo - pad)..(hi + pad);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_range.clone())
        .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc("Frequency (THz)")
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;

    // 高对称点竖线与标签
    let ticks = tick_labels(bands);
    let guide = BLACK.mix(0.4);
    chart
        .draw_series(ticks.iter().map(|(x, _)| {
            PathElement::new(vec![(*x, y_range.start), (*x, y_range.end)], guide)
        }))
        .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;
    chart
        .draw_series(ticks.iter().map(|(x, name)| {
            Text::new(
                name.clone(),
                (*x, y_range.start),
                ("sans-serif", 18).into_font(),
            )
        }))
        .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;

    if lo < 0.0 {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), (x_max, 0.0)],
                BLACK.mix(0.3),
            )))
            .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;
    }

    // 色散曲线
    let line_color = RGBColor(0, 102, 204);
    for (segment, freqs) in bands.path.segments.iter().zip(&bands.frequencies) {
        let n_bands = freqs.first().map_or(0, |f| f.len());
        for band in 0..n_bands {
            chart
                .draw_series(LineSeries::new(
                    segment
                        .distances
                        .iter()
                        .zip(freqs)
                        .map(|(d, f)| (*d, f[band])),
                    line_color.stroke_width(2),
                ))
                .map_err(|e| CalcError::PlotError(format!("{:?}", e)))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;
    use crate::phonon::qpoints::band_path;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            PlotFormat::from_path(Path::new("phonon_band.png")).unwrap(),
            PlotFormat::Png
        );
        assert_eq!(
            PlotFormat::from_path(Path::new("out/band.SVG")).unwrap(),
            PlotFormat::Svg
        );
        assert!(PlotFormat::from_path(Path::new("band.pdf")).is_err());
        assert!(PlotFormat::from_path(Path::new("band")).is_err());
    }

    #[test]
    fn test_tick_labels_merge_breaks() {
        let lattice = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let path = band_path(&lattice, 3);
        let frequencies = path
            .segments
            .iter()
            .map(|s| vec![vec![0.0; 3]; s.qpoints.len()])
            .collect();
        let bands = BandStructure { path, frequencies };
        let names: Vec<String> = tick_labels(&bands).into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["Γ", "X", "M", "Γ", "R", "X|M", "R"]);
    }
}
