//! Opening SAM and whitelist files, plain or gzip-compressed, or stdin/stdout for "-".

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

fn is_gzip(path: &str) -> bool {
    path.ends_with(".gz") || path.ends_with(".bgz")
}

/// Opens a line reader over `path` (use "-" to read from standard input).
pub fn get_reader(path: &str) -> io::Result<Box<dyn BufRead>> {
    if path == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else if is_gzip(path) {
        let file = File::open(path)?;
        // Multi-member aware so bgzip output reads past the first block
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Buffered output that must be finished explicitly so gzip trailer errors are seen
pub enum OutputWriter {
    Plain(BufWriter<Box<dyn Write>>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl OutputWriter {
    /// Flushes all buffered data and, for gzip output, writes the final block and trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(mut writer) => writer.flush(),
            OutputWriter::Gzip(writer) => {
                let encoder = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Plain(writer) => writer.write(buf),
            OutputWriter::Gzip(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(writer) => writer.flush(),
            OutputWriter::Gzip(writer) => writer.flush(),
        }
    }
}

/// Opens a buffered writer to `path` (use "-" to write to standard output).
/// Paths ending in `.gz` are gzip-compressed.
pub fn get_writer(path: &str) -> io::Result<OutputWriter> {
    if path == "-" {
        Ok(OutputWriter::Plain(BufWriter::new(Box::new(io::stdout()))))
    } else if is_gzip(path) {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        Ok(OutputWriter::Gzip(BufWriter::new(encoder)))
    } else {
        let file = File::create(path)?;
        Ok(OutputWriter::Plain(BufWriter::new(Box::new(file))))
    }
}
