pub mod diagram;
pub mod display_width;
pub mod dot;
pub mod error;
pub mod layout;
pub mod parser;
pub mod raster;
pub mod regcred;
pub mod routing;
pub mod svg_renderer;
pub mod text_renderer;

use std::path::{Path, PathBuf};

use tracing::info;

pub use error::{Error, Result};

use diagram::{Diagram, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Png,
    Svg,
    Dot,
    Text,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Svg => "svg",
            Format::Dot => "dot",
            Format::Text => "txt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub format: Format,
    pub direction: Option<Direction>,
    /// Pixel multiplier for PNG output; ignored by the other formats.
    pub scale: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: Format::Png,
            direction: None,
            scale: 1.0,
        }
    }
}

pub fn render(diagram: &Diagram, options: &RenderOptions) -> Result<Vec<u8>> {
    let oriented;
    let diagram = match options.direction {
        Some(direction) if direction != diagram.direction() => {
            oriented = diagram.clone().with_direction(direction);
            &oriented
        }
        _ => diagram,
    };

    match options.format {
        Format::Dot => {
            if diagram.nodes().is_empty() {
                return Err(Error::EmptyDiagram);
            }
            Ok(dot::render(diagram).into_bytes())
        }
        Format::Text => Ok(text_renderer::render(&layout::compute(diagram)?).into_bytes()),
        Format::Svg => Ok(svg_renderer::render(&layout::compute(diagram)?).into_bytes()),
        Format::Png => {
            let svg = svg_renderer::render(&layout::compute(diagram)?);
            raster::svg_to_png(&svg, options.scale)
        }
    }
}

/// Renders `diagram` into `dir` as `<file stem>.<extension>` and returns the
/// written path. The directory must already exist.
pub fn write_to_dir(diagram: &Diagram, dir: &Path, options: &RenderOptions) -> Result<PathBuf> {
    let bytes = render(diagram, options)?;
    let path = dir.join(format!(
        "{}.{}",
        diagram.file_stem(),
        options.format.extension()
    ));
    std::fs::write(&path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote diagram");
    Ok(path)
}
