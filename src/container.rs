//! Container archives on disk
//!
//! [`ContainerAssembler`] turns the hashcode container returned by the
//! service into the final ASiC-E artifact by appending the original file
//! bodies. [`ContainerArchive`] inspects existing archives and converts a
//! regular ASiC-E into a hashcode container for upload.

use crate::digest::{DigestAlgorithm, DigestFile};
use crate::error::{Result, SigaError};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the mimetype entry
pub const MIMETYPE_ENTRY: &str = "mimetype";

/// Prefix of signature/manifest entries
pub const META_INF_PREFIX: &str = "META-INF/";

/// SHA-256 hashcode manifest; its presence marks a hashcode container
pub const HASHCODES_SHA256_ENTRY: &str = "META-INF/hashcodes-sha256.xml";

/// SHA-512 hashcode manifest
pub const HASHCODES_SHA512_ENTRY: &str = "META-INF/hashcodes-sha512.xml";

/// Mimetype of ASiC-E containers
pub const ASICE_MIMETYPE: &str = "application/vnd.etsi.asic-e+zip";

/// Whether an archive entry is a data file (not mimetype, not under META-INF/)
pub fn is_data_file(name: &str) -> bool {
    name != MIMETYPE_ENTRY && !name.starts_with(META_INF_PREFIX)
}

/// An original file to be placed into the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Entry name; must equal the name registered with the service
    pub name: String,
    /// Location of the original bytes
    pub path: PathBuf,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Source named after the file name of `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SigaError::Assembly(format!("path has no usable file name: {}", path.display()))
            })?
            .to_string();
        Ok(Self { name, path })
    }

    /// Digest the file for container registration
    pub fn digest(&self) -> Result<DigestFile> {
        let content = fs::read(&self.path)?;
        Ok(DigestFile::new(self.name.clone(), content.len() as u64, &content))
    }
}

/// Writes the final artifact from service bytes plus original files
#[derive(Debug, Clone)]
pub struct ContainerAssembler {
    extension: String,
}

impl Default for ContainerAssembler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXTENSION)
    }
}

impl ContainerAssembler {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `<directory of first source>/<container_id>.<extension>`
    pub fn artifact_path(&self, sources: &[SourceFile], container_id: &str) -> Result<PathBuf> {
        let first = sources
            .first()
            .ok_or_else(|| SigaError::Assembly("no source files supplied".to_string()))?;
        if container_id.is_empty()
            || container_id.contains(['/', '\\'])
            || container_id == "."
            || container_id == ".."
        {
            return Err(SigaError::Assembly(format!(
                "container id is not usable as a file name: {:?}",
                container_id
            )));
        }

        let dir = match first.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(dir.join(format!("{}.{}", container_id, self.extension)))
    }

    /// Write `base` to disk and append every source under its name
    ///
    /// `registered` are the data-file names the service knows about; the
    /// source names must match them exactly. Existing entries of `base` are
    /// copied untouched. An existing file at the artifact path is never
    /// overwritten; a partially written artifact is removed on error.
    pub fn assemble(
        &self,
        base: &[u8],
        sources: &[SourceFile],
        registered: &[String],
        container_id: &str,
    ) -> Result<PathBuf> {
        let path = self.artifact_path(sources, container_id)?;
        check_names(base, sources, registered)?;

        let file = match OpenOptions::new().read(true).write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SigaError::Assembly(format!(
                    "artifact already exists: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match write_artifact(file, base, sources) {
            Ok(()) => {
                info!(path = %path.display(), files = sources.len(), "Container artifact written");
                Ok(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Removing partial container artifact");
                if let Err(remove_err) = fs::remove_file(&path) {
                    if remove_err.kind() != io::ErrorKind::NotFound {
                        warn!(error = %remove_err, "Could not remove partial artifact");
                    }
                }
                Err(e)
            }
        }
    }
}

fn check_names(base: &[u8], sources: &[SourceFile], registered: &[String]) -> Result<()> {
    let mut source_names = BTreeSet::new();
    for source in sources {
        if !is_data_file(&source.name) {
            return Err(SigaError::Assembly(format!(
                "reserved entry name: {}",
                source.name
            )));
        }
        if !source_names.insert(source.name.as_str()) {
            return Err(SigaError::Assembly(format!(
                "duplicate source name: {}",
                source.name
            )));
        }
    }

    let registered_names: BTreeSet<&str> = registered.iter().map(String::as_str).collect();
    if source_names != registered_names {
        let missing: Vec<_> = registered_names.difference(&source_names).collect();
        let unexpected: Vec<_> = source_names.difference(&registered_names).collect();
        return Err(SigaError::Assembly(format!(
            "source names do not match registered data files (missing: {:?}, unexpected: {:?})",
            missing, unexpected
        )));
    }

    let archive = ZipArchive::new(Cursor::new(base))?;
    for name in archive.file_names() {
        if source_names.contains(name) {
            return Err(SigaError::Assembly(format!(
                "container already holds an entry named {}",
                name
            )));
        }
    }
    Ok(())
}

fn write_artifact(mut file: File, base: &[u8], sources: &[SourceFile]) -> Result<()> {
    file.write_all(base)?;

    let mut writer = ZipWriter::new_append(file)?;
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for source in sources {
        debug!(name = %source.name, "Appending data file");
        let mut input = File::open(&source.path)?;
        writer.start_file(source.name.as_str(), options)?;
        io::copy(&mut input, &mut writer)?;
    }

    let file = writer.finish()?;
    file.sync_all()?;
    Ok(())
}

/// Read-only view of a container archive
#[derive(Debug, Clone)]
pub struct ContainerArchive {
    bytes: Vec<u8>,
}

impl ContainerArchive {
    /// Wrap archive bytes, checking that they form a readable zip
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        Ok(Self { bytes })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<&[u8]>>> {
        Ok(ZipArchive::new(Cursor::new(self.bytes.as_slice()))?)
    }

    /// All entry names in archive order
    pub fn entry_names(&self) -> Result<Vec<String>> {
        let mut archive = self.archive()?;
        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            names.push(archive.by_index(i)?.name().to_string());
        }
        Ok(names)
    }

    /// Whether the archive carries a hashcode manifest
    pub fn is_hashcode_container(&self) -> Result<bool> {
        let archive = self.archive()?;
        let found = archive.index_for_name(HASHCODES_SHA256_ENTRY).is_some();
        Ok(found)
    }

    /// Digests of every data file in the archive
    pub fn data_files(&self) -> Result<Vec<DigestFile>> {
        let mut archive = self.archive()?;
        let mut files = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.is_file() || !is_data_file(entry.name()) {
                continue;
            }
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            files.push(DigestFile::new(entry.name(), content.len() as u64, &content));
        }
        Ok(files)
    }

    /// Write every data file below `output_dir`, returning the written paths
    pub fn extract_data_files(&self, output_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        if !output_dir.is_dir() {
            return Err(SigaError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("output directory does not exist: {}", output_dir.display()),
            )));
        }

        let mut archive = self.archive()?;
        let mut written = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.is_file() || !is_data_file(entry.name()) {
                continue;
            }
            let relative = entry.enclosed_name().ok_or_else(|| {
                SigaError::Assembly(format!("unsafe entry name: {}", entry.name()))
            })?;
            let target = output_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            written.push(target);
        }
        Ok(written)
    }

    /// Convert into a hashcode container ready for upload
    ///
    /// Data-file bodies are dropped and replaced by SHA-256 and SHA-512
    /// hashcode manifests. Mimetype and signature entries are copied raw.
    pub fn build_hashcode_container(&self) -> Result<Vec<u8>> {
        let files = self.data_files()?;
        if files.is_empty() {
            return Err(SigaError::Assembly("container holds no data files".to_string()));
        }

        let mut archive = self.archive()?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        match archive.index_for_name(MIMETYPE_ENTRY) {
            Some(index) => writer.raw_copy_file(archive.by_index(index)?)?,
            None => {
                writer.start_file(MIMETYPE_ENTRY, stored)?;
                writer.write_all(ASICE_MIMETYPE.as_bytes())?;
            }
        }

        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            if is_data_file(&name)
                || name == MIMETYPE_ENTRY
                || name == HASHCODES_SHA256_ENTRY
                || name == HASHCODES_SHA512_ENTRY
            {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }

        writer.start_file(HASHCODES_SHA256_ENTRY, deflated)?;
        writer.write_all(hashcodes_xml(&files, DigestAlgorithm::Sha256)?.as_bytes())?;
        writer.start_file(HASHCODES_SHA512_ENTRY, deflated)?;
        writer.write_all(hashcodes_xml(&files, DigestAlgorithm::Sha512)?.as_bytes())?;

        Ok(writer.finish()?.into_inner())
    }
}

/// Hashcode manifest for `files` using `algorithm`
///
/// ```xml
/// <hashcodes>
///   <file-entry full-path="a.txt" hash="..." size="5"/>
/// </hashcodes>
/// ```
pub fn hashcodes_xml(files: &[DigestFile], algorithm: DigestAlgorithm) -> Result<String> {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<hashcodes>\n");
    for file in files {
        let hash = file
            .digest_for(algorithm)
            .ok_or_else(|| SigaError::UnsupportedDigest(algorithm.to_string()))?;
        xml.push_str(&format!(
            "  <file-entry full-path=\"{}\" hash=\"{}\" size=\"{}\"/>\n",
            escape_attr(file.name()),
            escape_attr(hash),
            file.size()
        ));
    }
    xml.push_str("</hashcodes>\n");
    Ok(xml)
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
