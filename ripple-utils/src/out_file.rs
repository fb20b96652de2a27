use crate::{Error, RippleResult};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Destination for emitted text, spelled the way drivers pass it on the
/// command line: "-" or "<out>" for stdout, "<err>" for stderr, "<null>"
/// to discard, anything else as a file path.
#[derive(Debug, Clone)]
pub enum OutputFile {
    Null,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl OutputFile {
    /// Open the sink. A file target is created or truncated; an emitter
    /// writes a given artifact exactly once, and failures surface as
    /// write errors rather than aborting the process.
    pub fn writer(&self) -> RippleResult<Box<dyn Write>> {
        Ok(match self {
            OutputFile::Null => Box::new(io::sink()),
            OutputFile::Stdout => Box::new(BufWriter::new(io::stdout())),
            OutputFile::Stderr => Box::new(BufWriter::new(io::stderr())),
            OutputFile::File(path) => {
                let file = std::fs::File::create(path).map_err(|e| {
                    Error::write_error(format!(
                        "cannot open `{}` for writing: {}",
                        path.display(),
                        e
                    ))
                })?;
                Box::new(BufWriter::new(file))
            }
        })
    }
}

impl FromStr for OutputFile {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "-" | "<out>" => OutputFile::Stdout,
            "<err>" => OutputFile::Stderr,
            "<null>" => OutputFile::Null,
            path => OutputFile::File(PathBuf::from(path)),
        })
    }
}

impl std::fmt::Display for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFile::Null => write!(f, "<null>"),
            OutputFile::Stdout => write!(f, "-"),
            OutputFile::Stderr => write!(f, "<err>"),
            OutputFile::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_markers_and_paths() {
        assert!(matches!("-".parse(), Ok(OutputFile::Stdout)));
        assert!(matches!("<out>".parse(), Ok(OutputFile::Stdout)));
        assert!(matches!("<err>".parse(), Ok(OutputFile::Stderr)));
        assert!(matches!("<null>".parse(), Ok(OutputFile::Null)));
        match "out/top.v".parse() {
            Ok(OutputFile::File(path)) => {
                assert_eq!(path, PathBuf::from("out/top.v"));
            }
            other => panic!("expected a file target, got {other:?}"),
        }
    }

    #[test]
    fn display_round_trips_the_spelling() {
        for s in ["-", "<err>", "<null>", "out/top.v"] {
            let file: OutputFile = s.parse().unwrap();
            assert_eq!(file.to_string(), s);
        }
    }

    #[test]
    fn null_sink_accepts_writes() {
        let mut sink = OutputFile::Null.writer().unwrap();
        sink.write_all(b"module m(); endmodule\n").unwrap();
    }

    #[test]
    fn unwritable_paths_are_write_errors_not_panics() {
        let target =
            OutputFile::File(PathBuf::from("no_such_dir/deeper/top.v"));
        let err = match target.writer() {
            Err(e) => e,
            Ok(_) => panic!("expected a write error"),
        };
        assert!(err.message().contains("cannot open"));
    }
}
