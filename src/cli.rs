use std::path::PathBuf;

use clap::Parser;

use crate::cache::{MAX_CAPACITY, MIN_CAPACITY};
use crate::config::{Theme, ViewerConfig};

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q / Ctrl+Q   : Quit
  Space / d / Right  : Next image
  a / Left           : Previous image
  Ctrl+S             : Save image to the download directory
  c / Ctrl+C         : Copy image to clipboard
  r                  : Reload config file and apply it
  t                  : Toggle light / dark theme
  ?                  : Toggle help overlay
";

/// One-line reminder shown in the status bar.
pub const KEYS_TIP: &str = "Keys: a, Space/d, Ctrl+S, c, r, t, ?";

#[derive(Parser, Debug)]
#[command(name = "randview", about = "Page through random images from a web API", after_help = HELP_KEYS)]
pub struct Cli {
    /// Endpoint that answers each GET with a random image
    #[arg(short = 'u', long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Number of images to prefetch (1-20)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(MIN_CAPACITY as i64..=MAX_CAPACITY as i64))]
    pub cache_size: Option<u8>,

    /// Directory that Ctrl+S saves into
    #[arg(short = 'o', long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub theme: Option<Theme>,

    /// Config file to use instead of the platform default
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ViewerConfig::config_path)
    }

    /// Overlay command-line flags on top of the loaded settings.
    pub fn apply_to(&self, config: &mut ViewerConfig) {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(n) = self.cache_size {
            config.max_cache_size = n as usize;
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(theme) = self.theme {
            config.theme = theme;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "randview",
            "--api-url",
            "https://example.com/r",
            "-c",
            "12",
            "--theme",
            "light",
        ])
        .unwrap();

        let mut cfg = ViewerConfig::default();
        let dir = cfg.download_dir.clone();
        cli.apply_to(&mut cfg);
        assert_eq!(cfg.api_url, "https://example.com/r");
        assert_eq!(cfg.max_cache_size, 12);
        assert_eq!(cfg.theme, Theme::Light);
        assert_eq!(cfg.download_dir, dir);
        assert!(!cli.save_config);
    }

    #[test]
    fn cache_size_is_range_checked() {
        assert!(Cli::try_parse_from(["randview", "-c", "0"]).is_err());
        assert!(Cli::try_parse_from(["randview", "-c", "21"]).is_err());
        assert!(Cli::try_parse_from(["randview", "-c", "20"]).is_ok());
    }

    #[test]
    fn explicit_config_path_wins() {
        let cli = Cli::try_parse_from(["randview", "--config", "/tmp/x.toml"]).unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/x.toml"));
    }
}
