//! Export subcommand.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// User whose board is exported
    #[arg(short, long)]
    pub user: String,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,
}

impl ExportArgs {
    /// Compress when asked to, or when the output file ends in `.gz`.
    pub fn should_compress(&self) -> bool {
        if self.gzip {
            return true;
        }

        self.output
            .as_ref()
            .is_some_and(|path| path.extension().is_some_and(|ext| ext == "gz"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(output: Option<&str>, gzip: bool) -> ExportArgs {
        ExportArgs {
            user: "u1".to_string(),
            output: output.map(PathBuf::from),
            gzip,
        }
    }

    #[test]
    fn test_should_compress() {
        assert!(args(None, true).should_compress());
        assert!(args(Some("board.json.gz"), false).should_compress());
        assert!(!args(Some("board.json"), false).should_compress());
        assert!(!args(None, false).should_compress());
    }
}
