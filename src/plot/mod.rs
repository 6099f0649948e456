//! Plot assembly: groups projected points by category and attaches display
//! labels and colors. Rendering itself happens in the client.

pub mod colormap;
pub mod wrap;

pub use colormap::Colormap;

use crate::config::PlotConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::types::{CorpusItem, PlotData, PlotGroup, PlotPoint, ProjectedPoint};

/// Position sampled for single-group plots and the theme color.
const BASE_SAMPLE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotOptions {
    pub wrap_width: usize,
    pub colormap: Colormap,
}

impl PlotOptions {
    pub fn from_config(config: &PlotConfig) -> Result<Self> {
        Ok(Self {
            wrap_width: config.wrap_width,
            colormap: config.colormap.parse()?,
        })
    }
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            wrap_width: 100,
            colormap: Colormap::Mako,
        }
    }
}

/// Build plot groups from projected points and the corpus rows they came from.
///
/// With no (or an empty) `category_field` a single group holds every point.
/// Otherwise there is one group per distinct category value, in first-seen order.
pub fn assemble(
    points: &[ProjectedPoint],
    items: &[CorpusItem],
    label_field: &str,
    category_field: Option<&str>,
    options: &PlotOptions,
) -> Result<PlotData> {
    if points.len() != items.len() {
        return Err(PipelineError::Alignment(format!(
            "{} projected points for {} corpus items; re-run projection",
            points.len(),
            items.len()
        )));
    }

    let dimensions = points.first().map(|p| p.coordinates.len()).unwrap_or(0);
    let category_field = category_field.filter(|f| !f.is_empty());

    let mut groups: Vec<PlotGroup> = Vec::new();
    for point in points {
        let item = items.get(point.source_index).ok_or_else(|| {
            PipelineError::Alignment(format!(
                "projected point refers to item {} of {}",
                point.source_index,
                items.len()
            ))
        })?;
        let plot_point = PlotPoint {
            coordinates: point.coordinates.clone(),
            label: wrap::display_label(&item.row.text(label_field)?, options.wrap_width),
            source_index: point.source_index,
        };

        let category = category_field
            .map(|field| item.row.text(field))
            .transpose()?;
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.points.push(plot_point),
            None => groups.push(PlotGroup {
                category,
                color: String::new(),
                points: vec![plot_point],
            }),
        }
    }

    let count = groups.len();
    for (i, group) in groups.iter_mut().enumerate() {
        let t = if category_field.is_none() {
            BASE_SAMPLE
        } else {
            i as f32 / count as f32
        };
        group.color = options.colormap.sample_hex(t);
    }

    tracing::info!(
        points = points.len(),
        groups = groups.len(),
        dimensions,
        "plot assembled"
    );

    Ok(PlotData {
        dimensions,
        theme_color: options.colormap.sample_hex(BASE_SAMPLE),
        groups,
    })
}
