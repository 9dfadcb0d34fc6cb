//! Check and write command implementations

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use iqrf_core::pgm::{FileKind, PgmStatus, Programmer};
use iqrf_core::port::IoSource;

use super::open_driver;
use crate::cli::{FileArgs, KindArg};

/// [`embedded_io::Read`] over a `std::io::Read`
struct StdReader<R>(R);

impl<R> embedded_io::ErrorType for StdReader<R> {
    type Error = io::Error;
}

impl<R: io::Read> embedded_io::Read for StdReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

type DiskSource = IoSource<StdReader<BufReader<File>>>;

/// A programming file on disk, streamed on every pass
struct ProgrammingFile {
    path: PathBuf,
    kind: FileKind,
    len: u32,
}

impl ProgrammingFile {
    fn open(args: &FileArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let kind = match args.kind {
            Some(kind) => kind.into(),
            None => infer_kind(&args.input)?,
        };
        let len = u32::try_from(fs::metadata(&args.input)?.len())
            .map_err(|_| format!("{} is too large", args.input.display()))?;
        log::info!("{} ({} bytes, {:?})", args.input.display(), len, kind);
        Ok(Self {
            path: args.input.clone(),
            kind,
            len,
        })
    }

    /// A fresh source positioned at the start of the file
    fn source(&self) -> io::Result<DiskSource> {
        let file = File::open(&self.path)?;
        Ok(IoSource::new(StdReader(BufReader::new(file))))
    }

    fn programmer(&self) -> Programmer {
        Programmer::new(self.kind, self.len)
    }
}

impl From<KindArg> for FileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Hex => FileKind::Hex,
            KindArg::Plugin => FileKind::Plugin,
            KindArg::Config => FileKind::Config,
        }
    }
}

fn infer_kind(path: &Path) -> Result<FileKind, Box<dyn std::error::Error>> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(FileKind::from_extension)
        .ok_or_else(|| {
            format!(
                "Cannot tell the file kind of {} (use --kind)",
                path.display()
            )
            .into()
        })
}

fn progress_bar(message: &'static str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(pb)
}

fn check_file(file: &ProgrammingFile) -> Result<(), Box<dyn std::error::Error>> {
    let mut pgm = file.programmer();
    let mut source = file.source()?;
    loop {
        match pgm.check_file(&mut source)? {
            PgmStatus::InProgress(_) => {}
            PgmStatus::Success => return Ok(()),
        }
    }
}

/// Validate a programming file
pub fn run_check(args: &FileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file = ProgrammingFile::open(args)?;
    check_file(&file).map_err(|e| format!("{}: {}", args.input.display(), e))?;
    println!("{} is a valid {:?} file", args.input.display(), file.kind);
    Ok(())
}

/// Validate a programming file, then upload it
pub fn run_write(
    port: &str,
    args: &FileArgs,
    no_check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = ProgrammingFile::open(args)?;
    if !no_check {
        check_file(&file).map_err(|e| format!("{}: {}", args.input.display(), e))?;
    }

    let mut driver = open_driver(port, |data: &[u8]| {
        log::debug!("Unsolicited packet during upload: {:02X?}", data);
    })?;
    println!("Found: {}", driver.identity());

    let mut pgm = file.programmer();
    let mut source = file.source()?;
    let pb = progress_bar("Writing")?;

    loop {
        driver.tick();
        match pgm.write_file(&mut driver, &mut source) {
            Ok(PgmStatus::InProgress(percent)) => pb.set_position(u64::from(percent)),
            Ok(PgmStatus::Success) => break,
            Err(e) => {
                pb.abandon_with_message("Failed");
                return Err(e.into());
            }
        }
        driver.wait_tick();
    }

    pb.finish_with_message("Write complete");
    println!("Wrote {} bytes from {}", file.len, args.input.display());
    Ok(())
}
