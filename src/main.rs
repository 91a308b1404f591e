use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use regcred_diagram::diagram::{Diagram, Direction};
use regcred_diagram::{Error, Format, RenderOptions, Result, parser, regcred};

#[derive(Parser)]
#[command(
    name = "regcred-diagram",
    about = "Render the regcred-injector architecture diagram (or a diagram description file)"
)]
struct Cli {
    /// Diagram description file, `-` for stdin. Defaults to the built-in
    /// regcred-injector diagram.
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = FormatArg::Png)]
    format: FormatArg,

    /// Directory the output file is written to
    #[arg(long, short = 'o', default_value = ".")]
    out_dir: PathBuf,

    /// Override the diagram's layout direction
    #[arg(long, short = 'd', value_enum, ignore_case = true)]
    direction: Option<DirectionArg>,

    /// Pixel scale for PNG output
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Write the rendering to stdout instead of a file
    #[arg(long)]
    stdout: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Svg,
    Dot,
    Txt,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => Format::Png,
            FormatArg::Svg => Format::Svg,
            FormatArg::Dot => Format::Dot,
            FormatArg::Txt => Format::Text,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Lr,
    #[value(alias = "tb")]
    Td,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Lr => Direction::LeftRight,
            DirectionArg::Td => Direction::TopDown,
        }
    }
}

impl Cli {
    fn options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format.into(),
            direction: self.direction.map(Direction::from),
            scale: self.scale,
        }
    }

    fn load(&self) -> Result<Diagram> {
        let Some(path) = &self.input else {
            return regcred::regcred_injector();
        };
        let text = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| Error::Read {
                    path: path.clone(),
                    source,
                })?;
            buf
        } else {
            std::fs::read_to_string(path).map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?
        };
        parser::parse_diagram(&text)
    }

    fn run(&self) -> Result<()> {
        let diagram = self.load()?;
        let options = self.options();
        if self.stdout {
            let bytes = regcred_diagram::render(&diagram, &options)?;
            let mut out = std::io::stdout().lock();
            out.write_all(&bytes)?;
            out.flush()?;
        } else {
            regcred_diagram::write_to_dir(&diagram, &self.out_dir, &options)?;
        }
        Ok(())
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.run() {
        error!("{e}");
        std::process::exit(1);
    }
}
