//! Handle for compilation input and output data.
//!
//! [`CompilationData`] abstracts whether an artifact lives in a file chosen by the
//! caller, in a temporary file owned by the handle, or in an in-memory buffer.
//! File-backed data is memory-mapped when read; [`CompilationData::bytes`] hands
//! out the mapping itself, so inspecting or forwarding a large module does not copy
//! it.

use std::{
    fmt,
    fs,
    io::{Read, Seek, SeekFrom, Write},
    ops::Deref,
    path::{Path, PathBuf},
};

use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::{
    precompilation::{detect_source_type, SourceType},
    Error::Error,
    Result,
};

#[derive(Debug)]
enum Storage {
    Empty,
    File(PathBuf),
    Temporary(NamedTempFile),
    Memory(Vec<u8>),
}

/// Read access to the bytes of a [`CompilationData`].
///
/// Dereferences to the raw bytes. File-backed data stays mapped for as long as the
/// view is alive.
#[derive(Debug)]
pub enum DataView<'a> {
    /// An empty handle or an empty file
    Empty,
    /// The buffer of an in-memory handle
    Borrowed(&'a [u8]),
    /// A memory-mapped file
    Mapped(Mmap),
}

impl DataView<'_> {
    /// Returns `true` if the bytes are served from a file mapping.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, DataView::Mapped(_))
    }
}

impl Deref for DataView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DataView::Empty => &[],
            DataView::Borrowed(data) => data,
            DataView::Mapped(mmap) => mmap,
        }
    }
}

/// A named compilation artifact tagged with its [`SourceType`].
///
/// An empty handle (see [`CompilationData::new`]) is typically used as compilation
/// output; [`CompilationData::write_from`] turns it into an in-memory buffer.
///
/// # Examples
///
/// ```rust
/// use qpuc::precompilation::{CompilationData, SourceType};
///
/// let data = CompilationData::from_memory(b"; ModuleID = 'k'\n".to_vec(), SourceType::Unknown)
///     .with_detected_type()?;
/// assert_eq!(data.source_type(), SourceType::LlvmIrText);
/// assert_eq!(data.raw_data()?.len(), 17);
/// # Ok::<(), qpuc::Error>(())
/// ```
#[derive(Debug)]
pub struct CompilationData {
    source_type: SourceType,
    storage: Storage,
}

impl Default for CompilationData {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationData {
    /// Creates an empty handle of unknown type.
    #[must_use]
    pub fn new() -> Self {
        CompilationData {
            source_type: SourceType::Unknown,
            storage: Storage::Empty,
        }
    }

    /// Refers to the file at `path`. The file is not touched until the data is read.
    pub fn from_file(path: impl Into<PathBuf>, source_type: SourceType) -> Self {
        CompilationData {
            source_type,
            storage: Storage::File(path.into()),
        }
    }

    /// Wraps an in-memory buffer.
    #[must_use]
    pub fn from_memory(data: Vec<u8>, source_type: SourceType) -> Self {
        CompilationData {
            source_type,
            storage: Storage::Memory(data),
        }
    }

    /// Reads everything from `reader` into an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if reading fails.
    pub fn from_reader(mut reader: impl Read, source_type: SourceType) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_memory(data, source_type))
    }

    /// Creates an empty temporary file which is deleted when the handle is dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be created.
    pub fn temporary(source_type: SourceType) -> Result<Self> {
        let file = tempfile::Builder::new().prefix("qpuc-").tempfile()?;
        Ok(CompilationData {
            source_type,
            storage: Storage::Temporary(file),
        })
    }

    /// Replaces an [`SourceType::Unknown`] tag with the type detected from the data.
    ///
    /// # Errors
    /// Returns an error if the data cannot be read.
    pub fn with_detected_type(mut self) -> Result<Self> {
        if self.source_type == SourceType::Unknown {
            self.source_type = detect_source_type(&self.bytes()?);
        }
        Ok(self)
    }

    /// The type tag of the data.
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// The path of the backing file, `None` for in-memory and empty handles.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File(path) => Some(path),
            Storage::Temporary(file) => Some(file.path()),
            Storage::Empty | Storage::Memory(_) => None,
        }
    }

    /// Returns `true` if the handle refers to some data (possibly zero bytes long).
    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self.storage, Storage::Empty)
    }

    /// Borrows the raw bytes, mapping file-backed data into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the backing file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn bytes(&self) -> Result<DataView<'_>> {
        match &self.storage {
            Storage::Empty => Ok(DataView::Empty),
            Storage::Memory(data) => Ok(DataView::Borrowed(data)),
            Storage::File(path) => map_file(path),
            Storage::Temporary(file) => map_file(file.path()),
        }
    }

    /// Returns an owned copy of the raw bytes.
    ///
    /// # Errors
    /// Same as [`CompilationData::bytes`].
    pub fn raw_data(&self) -> Result<Vec<u8>> {
        Ok(self.bytes()?.to_vec())
    }

    /// Writes the raw bytes into `out`.
    ///
    /// # Errors
    /// Returns an error if reading the data or writing into `out` fails.
    pub fn read_into(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(&self.bytes()?)?;
        Ok(())
    }

    /// Replaces the content with everything read from `input`.
    ///
    /// File-backed handles overwrite their file, empty handles become in-memory
    /// buffers.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if reading or writing fails.
    pub fn write_from(&mut self, input: &mut impl Read) -> Result<()> {
        if matches!(self.storage, Storage::Empty) {
            self.storage = Storage::Memory(Vec::new());
        }

        match &mut self.storage {
            Storage::Empty => {}
            Storage::Memory(data) => {
                data.clear();
                input.read_to_end(data)?;
            }
            Storage::File(path) => {
                let mut file = fs::File::create(path.as_path())?;
                std::io::copy(input, &mut file)?;
            }
            Storage::Temporary(file) => {
                let handle = file.as_file_mut();
                handle.set_len(0)?;
                handle.seek(SeekFrom::Start(0))?;
                std::io::copy(input, handle)?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CompilationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Storage::Empty => write!(f, "(empty)"),
            Storage::File(path) => write!(f, "file '{}'", path.display()),
            Storage::Temporary(file) => write!(f, "temporary file '{}'", file.path().display()),
            Storage::Memory(data) => write!(f, "in-memory data ({} bytes)", data.len()),
        }?;
        write!(f, " [{}]", self.source_type)
    }
}

fn map_file(path: &Path) -> Result<DataView<'static>> {
    let file = fs::File::open(path)?;
    // zero-length mappings are rejected on some platforms
    if file.metadata()?.len() == 0 {
        return Ok(DataView::Empty);
    }

    #[allow(unsafe_code)]
    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(mmap) => mmap,
        Err(error) => return Err(Error(error.to_string())),
    };

    Ok(DataView::Mapped(mmap))
}
