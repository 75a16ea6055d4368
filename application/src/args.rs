//! [`Args`] definitions.

use clap::Parser;

/// Server of the vacation rental reservation engine.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    ///
    /// Missing file is not an error: the configuration is then taken from the
    /// `CONF.*` environment variables and the defaults.
    #[arg(short, long, env = "CONF_FILE", default_value = "config.toml")]
    pub config: String,
}

impl Args {
    /// Parses command line arguments.
    ///
    /// # Errors
    ///
    /// Errors if failed to parse command line arguments.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}
