//! Visualization module for SEMLAB using Rerun.io
//!
//! Logs widget scenes as 2D archetypes so a harness run can be scrubbed
//! step by step in the viewer. Hidden nodes (effective opacity 0) are
//! skipped.
//!
//! Enable with the `visualization` feature flag.

use crate::scene::{Color, Scene, Shape};
use rerun::{RecordingStream, RecordingStreamBuilder};

/// Rerun-based logger for widget scenes
pub struct RerunSceneLogger {
    rec: RecordingStream,
}

fn color(c: Color, opacity: f64) -> rerun::Color {
    let alpha = (c.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
    rerun::Color::from_unmultiplied_rgba(c.r, c.g, c.b, alpha)
}

impl RerunSceneLogger {
    /// Create a logger that spawns the Rerun viewer
    pub fn new(app_id: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).spawn()?;
        Ok(Self { rec })
    }

    /// Create a logger that saves to a file
    pub fn new_to_file(app_id: &str, path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).save(path)?;
        Ok(Self { rec })
    }

    /// Log every visible node of `scene` under `entity/<index>`
    pub fn log_scene(&self, entity: &str, scene: &Scene) -> Result<(), Box<dyn std::error::Error>> {
        let mut nodes = Vec::new();
        scene.walk(|node, opacity| {
            if opacity > 0.0 {
                nodes.push((node.clone(), opacity));
            }
        });

        // Replace whatever the previous step drew
        self.rec.log(entity, &rerun::Clear::recursive())?;

        for (i, (node, opacity)) in nodes.iter().enumerate() {
            let path = format!("{}/{}", entity, node.id.clone().unwrap_or_else(|| i.to_string()));
            let paint = node.style.stroke.or(node.style.fill).map(|c| color(c, *opacity));

            match &node.shape {
                Shape::Rect { x, y, width, height, .. } => {
                    let mut boxes = rerun::Boxes2D::from_mins_and_sizes(
                        [[*x as f32, *y as f32]],
                        [[*width as f32, *height as f32]],
                    );
                    if let Some(c) = paint {
                        boxes = boxes.with_colors([c]);
                    }
                    self.rec.log(path, &boxes)?;
                }
                Shape::Ellipse { cx, cy, rx, ry } => {
                    let mut boxes = rerun::Boxes2D::from_centers_and_half_sizes(
                        [[*cx as f32, *cy as f32]],
                        [[*rx as f32, *ry as f32]],
                    );
                    if let Some(c) = paint {
                        boxes = boxes.with_colors([c]);
                    }
                    self.rec.log(path, &boxes)?;
                }
                Shape::Circle { cx, cy, r } => {
                    let mut points = rerun::Points2D::new([[*cx as f32, *cy as f32]]).with_radii([*r as f32]);
                    if let Some(c) = paint {
                        points = points.with_colors([c]);
                    }
                    self.rec.log(path, &points)?;
                }
                Shape::Line { x1, y1, x2, y2 } => {
                    let mut strips = rerun::LineStrips2D::new([[[*x1 as f32, *y1 as f32], [*x2 as f32, *y2 as f32]]])
                        .with_radii([node.style.stroke_width as f32 / 2.0]);
                    if let Some(c) = paint {
                        strips = strips.with_colors([c]);
                    }
                    self.rec.log(path, &strips)?;
                }
                Shape::Text { x, y, content, .. } => {
                    let mut label = rerun::Points2D::new([[*x as f32, *y as f32]])
                        .with_radii([0.5])
                        .with_labels([content.as_str()]);
                    if let Some(c) = paint {
                        label = label.with_colors([c]);
                    }
                    self.rec.log(path, &label)?;
                }
            }
        }

        Ok(())
    }

    /// Log a free-form event line (action dispatched, reference loaded, ...)
    pub fn log_event(&self, entity: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.rec.log(entity, &rerun::TextLog::new(text))?;
        Ok(())
    }

    /// Set the harness step for timeline scrubbing
    pub fn set_step(&self, step: u64) {
        self.rec.set_time_sequence("step", step as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Rerun viewer
    fn test_logger_creation() {
        let logger = RerunSceneLogger::new("semlab_test");
        assert!(logger.is_ok());
    }
}
